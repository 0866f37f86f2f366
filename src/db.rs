use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub entry_key: String,
    pub kind: String,
    pub content_id: String,
    pub title: String,
    pub poster: Option<String>,
    pub season: Option<String>,
    pub last_episode: Option<i64>,
    pub viewed_at: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS watch_history (
                user_id TEXT NOT NULL,
                entry_key TEXT NOT NULL,
                kind TEXT NOT NULL,
                content_id TEXT NOT NULL,
                title TEXT NOT NULL,
                poster TEXT,
                season TEXT,
                last_episode INTEGER,
                viewed_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, entry_key)
            );
            CREATE INDEX IF NOT EXISTS idx_watch_history_viewed_at
                ON watch_history(user_id, viewed_at DESC);
            "#,
        )?;
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO local_store (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Upserts one history entry. `viewed_at` is stamped here, not by the caller.
    pub fn upsert_history(&self, user_id: &str, row: &HistoryRow) -> Result<i64> {
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            r#"
            INSERT INTO watch_history
                (user_id, entry_key, kind, content_id, title, poster, season, last_episode, viewed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(user_id, entry_key) DO UPDATE SET
                kind = excluded.kind,
                content_id = excluded.content_id,
                title = excluded.title,
                poster = excluded.poster,
                season = excluded.season,
                last_episode = excluded.last_episode,
                viewed_at = excluded.viewed_at
            "#,
            params![
                user_id,
                row.entry_key,
                row.kind,
                row.content_id,
                row.title,
                row.poster,
                row.season,
                row.last_episode,
                now
            ],
        )?;
        Ok(now)
    }

    pub fn latest_history_for(
        &self,
        user_id: &str,
        kind: &str,
        content_id: &str,
    ) -> Result<Option<HistoryRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT entry_key, kind, content_id, title, poster, season, last_episode, viewed_at
            FROM watch_history
            WHERE user_id = ?1 AND kind = ?2 AND content_id = ?3
            ORDER BY viewed_at DESC, rowid DESC
            LIMIT 1
            "#,
        )?;
        let mut rows = stmt.query(params![user_id, kind, content_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(history_row(row)?));
        }
        Ok(None)
    }

    pub fn list_history(&self, user_id: &str) -> Result<Vec<HistoryRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT entry_key, kind, content_id, title, poster, season, last_episode, viewed_at
            FROM watch_history
            WHERE user_id = ?1
            ORDER BY viewed_at DESC, rowid DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], history_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn delete_history(&self, user_id: &str, entry_key: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM watch_history WHERE user_id = ?1 AND entry_key = ?2",
            params![user_id, entry_key],
        )?;
        Ok(deleted > 0)
    }
}

fn history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        entry_key: row.get(0)?,
        kind: row.get(1)?,
        content_id: row.get(2)?,
        title: row.get(3)?,
        poster: row.get(4)?,
        season: row.get(5)?,
        last_episode: row.get(6)?,
        viewed_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, season: &str, episode: i64) -> HistoryRow {
        HistoryRow {
            entry_key: key.to_string(),
            kind: "series".to_string(),
            content_id: "show".to_string(),
            title: "Show".to_string(),
            poster: None,
            season: Some(season.to_string()),
            last_episode: Some(episode),
            viewed_at: 0,
        }
    }

    #[test]
    fn local_store_upserts_values() {
        let db = Database::open_in_memory().expect("open db");
        assert_eq!(db.get_value("k").expect("read"), None);
        db.put_value("k", "one").expect("write");
        db.put_value("k", "two").expect("overwrite");
        assert_eq!(db.get_value("k").expect("read").as_deref(), Some("two"));
    }

    #[test]
    fn history_keeps_one_row_per_key() {
        let db = Database::open_in_memory().expect("open db");
        db.upsert_history("u", &row("show_T1", "T1", 0)).expect("first");
        db.upsert_history("u", &row("show_T1", "T1", 4)).expect("second");

        let rows = db.list_history("u").expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].last_episode, Some(4));
    }

    #[test]
    fn latest_history_prefers_most_recent_write() {
        let db = Database::open_in_memory().expect("open db");
        db.upsert_history("u", &row("show_T1", "T1", 2)).expect("t1");
        db.upsert_history("u", &row("show_T2", "T2", 3)).expect("t2");
        db.upsert_history("other", &row("show_T1", "T1", 9)).expect("other user");

        let latest = db
            .latest_history_for("u", "series", "show")
            .expect("query")
            .expect("row should exist");
        assert_eq!(latest.season.as_deref(), Some("T2"));
        assert_eq!(latest.last_episode, Some(3));
    }

    #[test]
    fn delete_history_reports_missing_rows() {
        let db = Database::open_in_memory().expect("open db");
        db.upsert_history("u", &row("show_T1", "T1", 0)).expect("write");
        assert!(db.delete_history("u", "show_T1").expect("delete"));
        assert!(!db.delete_history("u", "show_T1").expect("delete again"));
    }
}
