use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::PendingHistoryEntry;
use super::history::HistoryWriter;
use super::timer::TimerHandle;

#[derive(Debug, Default)]
struct PendingSlot {
    /// Bumped by every arm/cancel/flush; a timer only commits if its
    /// generation is still current.
    generation: u64,
    entry: Option<PendingHistoryEntry>,
    timer: Option<TimerHandle>,
}

impl PendingSlot {
    fn invalidate(&mut self) -> Option<PendingHistoryEntry> {
        self.generation = self.generation.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.entry.take()
    }
}

struct Shared {
    slot: Mutex<PendingSlot>,
    writer: HistoryWriter,
    dwell: Duration,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, PendingSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self, generation: u64) {
        let entry = {
            let mut slot = self.slot();
            if slot.generation != generation {
                return;
            }
            slot.timer = None;
            slot.entry.take()
        };
        if let Some(entry) = entry {
            debug!(key = %entry.history_key(), "dwell elapsed");
            self.commit(&entry);
        }
    }

    fn commit(&self, entry: &PendingHistoryEntry) -> bool {
        self.writer.write(&entry.history_key(), &entry.to_record())
    }
}

/// Deferred "watched" commit with at most one pending entry and one timer.
///
/// Clones share the same slot, so a holder of any clone can flush the entry
/// armed through another.
#[derive(Clone)]
pub(crate) struct HistoryCommitter {
    shared: Arc<Shared>,
}

impl HistoryCommitter {
    pub(crate) fn new(writer: HistoryWriter, dwell: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(PendingSlot::default()),
                writer,
                dwell,
            }),
        }
    }

    /// Replaces any pending entry and restarts the dwell timer for `entry`.
    pub(crate) fn arm(&self, entry: PendingHistoryEntry) {
        let mut slot = self.shared.slot();
        if let Some(replaced) = slot.invalidate() {
            debug!(key = %replaced.history_key(), "pending history replaced");
        }
        let generation = slot.generation;
        debug!(
            key = %entry.history_key(),
            episode = entry.episode_index,
            "pending history armed"
        );
        slot.entry = Some(entry);

        let shared = Arc::clone(&self.shared);
        slot.timer = Some(TimerHandle::schedule(self.shared.dwell, move || {
            shared.fire(generation)
        }));
    }

    /// Drops the pending entry without committing it.
    pub(crate) fn cancel_pending(&self) -> Option<PendingHistoryEntry> {
        let cancelled = self.shared.slot().invalidate();
        if let Some(entry) = &cancelled {
            debug!(key = %entry.history_key(), "pending history cancelled");
        }
        cancelled
    }

    /// Commits the pending entry now. Returns whether anything was pending.
    pub(crate) fn flush_pending(&self) -> bool {
        let entry = self.shared.slot().invalidate();
        match entry {
            Some(entry) => {
                debug!(key = %entry.history_key(), "pending history flushed");
                self.shared.commit(&entry);
                true
            }
            None => false,
        }
    }

    pub(crate) fn pending(&self) -> Option<PendingHistoryEntry> {
        self.shared.slot().entry.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use anyhow::Result;
    use chrono::Utc;

    use super::*;
    use crate::app::tracking::{
        HistoryEntry, HistoryLog, HistoryRecord, LastWatched, LogReporter,
    };

    #[derive(Default)]
    struct CountingLog {
        writes: Mutex<Vec<Option<usize>>>,
    }

    impl CountingLog {
        fn episodes(&self) -> Vec<Option<usize>> {
            self.writes.lock().expect("lock writes").clone()
        }
    }

    impl HistoryLog for CountingLog {
        fn read_last_watched(&self, _: &str, _: &str) -> Result<Option<LastWatched>> {
            Ok(None)
        }

        fn write_history(&self, _: &str, _: &str, record: &HistoryRecord) -> Result<()> {
            self.writes
                .lock()
                .expect("lock writes")
                .push(record.last_episode);
            Ok(())
        }

        fn list_history(&self, _: &str) -> Result<Vec<HistoryEntry>> {
            Ok(Vec::new())
        }

        fn remove_history(&self, _: &str, _: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn committer_for(log: &Arc<CountingLog>, dwell: Duration) -> HistoryCommitter {
        let writer = HistoryWriter::new(
            Arc::clone(log) as Arc<dyn HistoryLog>,
            Arc::new(LogReporter),
            Some("uid".to_string()),
        );
        HistoryCommitter::new(writer, dwell)
    }

    fn entry(episode_index: usize) -> PendingHistoryEntry {
        PendingHistoryEntry {
            series_id: "show".to_string(),
            season: "T1".to_string(),
            episode_index,
            title: "Show: T1".to_string(),
            poster: None,
            armed_at: Utc::now(),
        }
    }

    #[test]
    fn flush_racing_the_timer_commits_once() {
        let dwell = Duration::from_millis(4);
        for round in 0..40 {
            let log = Arc::new(CountingLog::default());
            let committer = committer_for(&log, dwell);
            committer.arm(entry(round));

            // Land the flush on either side of the deadline across rounds.
            thread::sleep(dwell / 2 + Duration::from_micros((round as u64 % 8) * 500));
            committer.flush_pending();
            thread::sleep(dwell * 8);

            assert_eq!(log.episodes(), vec![Some(round)], "round {round}");
            assert!(committer.pending().is_none());
        }
    }

    #[test]
    fn superseded_timer_commits_nothing() {
        let log = Arc::new(CountingLog::default());
        let committer = committer_for(&log, Duration::from_secs(60));
        committer.arm(entry(1));
        let stale = committer.shared.slot().generation;
        committer.arm(entry(2));

        committer.shared.fire(stale);
        assert!(log.episodes().is_empty());
        assert_eq!(committer.pending().map(|entry| entry.episode_index), Some(2));

        let current = committer.shared.slot().generation;
        committer.shared.fire(current);
        assert_eq!(log.episodes(), vec![Some(2)]);
        assert!(!committer.flush_pending());
    }

    #[test]
    fn rearmed_entry_replaces_the_first_before_the_dwell() {
        let log = Arc::new(CountingLog::default());
        let committer = committer_for(&log, Duration::from_millis(20));
        committer.arm(entry(1));
        committer.arm(entry(2));

        thread::sleep(Duration::from_millis(150));
        assert_eq!(log.episodes(), vec![Some(2)]);
    }
}
