use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Handle to a one-shot deferred task running on its own thread.
///
/// `cancel` stops the task if it has not started yet. Dropping the handle
/// without cancelling detaches the timer: the task still runs when the delay
/// elapses.
#[derive(Debug)]
pub(crate) struct TimerHandle {
    cancel_tx: mpsc::Sender<()>,
}

impl TimerHandle {
    pub(crate) fn schedule<F>(delay: Duration, task: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let deadline = Instant::now() + delay;
        thread::spawn(move || {
            match cancel_rx.recv_timeout(delay) {
                Ok(()) => return,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                }
            }
            task();
        });
        Self { cancel_tx }
    }

    pub(crate) fn cancel(self) {
        let _ = self.cancel_tx.send(());
    }
}
