use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use super::history::{ContentKind, HistoryEntry, HistoryLog, HistoryRecord, LastWatched};
use crate::http::{Method, RetryPolicy, send_with_retries};

/// History log stored in a Firebase-style REST document tree under
/// `users/<uid>/history/<key>`.
#[derive(Debug, Clone)]
pub(crate) struct RemoteHistoryLog {
    base_url: String,
    auth_token: Option<String>,
    policy: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    record: HistoryRecord,
    #[serde(rename = "viewedAt", default)]
    viewed_at: i64,
}

impl RemoteHistoryLog {
    pub(crate) fn new(base_url: &str, auth_token: Option<String>) -> Self {
        Self::with_policy(base_url, auth_token, RetryPolicy::default())
    }

    pub(crate) fn with_policy(
        base_url: &str,
        auth_token: Option<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            policy,
        }
    }

    fn history_url(&self, user_id: &str, key: Option<&str>) -> String {
        match key {
            Some(key) => format!("{}/users/{user_id}/history/{key}.json", self.base_url),
            None => format!("{}/users/{user_id}/history.json", self.base_url),
        }
    }

    fn auth_query(&self) -> Vec<(String, String)> {
        self.auth_token
            .iter()
            .map(|token| ("auth".to_string(), token.clone()))
            .collect()
    }

    fn send(&self, method: Method, url: &str, body: Option<&str>) -> Result<String> {
        send_with_retries(method, url, &self.auth_query(), body, self.policy)
            .with_context(|| format!("history store {url}"))
    }

    fn fetch_entries(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        let raw = self.send(Method::Get, &self.history_url(user_id, None), None)?;
        parse_history_document(&raw)
    }
}

impl HistoryLog for RemoteHistoryLog {
    fn read_last_watched(&self, user_id: &str, series_id: &str) -> Result<Option<LastWatched>> {
        let entries = self.fetch_entries(user_id)?;
        Ok(latest_series_entry(&entries, series_id).and_then(|entry| {
            Some(LastWatched {
                season: entry.record.season.clone()?,
                last_episode: entry.record.last_episode?,
            })
        }))
    }

    fn write_history(&self, user_id: &str, key: &str, record: &HistoryRecord) -> Result<()> {
        let body = record_body(record)?;
        self.send(Method::Put, &self.history_url(user_id, Some(key)), Some(&body))?;
        Ok(())
    }

    fn list_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.fetch_entries(user_id)?;
        entries.sort_by(|left, right| right.viewed_at.cmp(&left.viewed_at));
        Ok(entries)
    }

    fn remove_history(&self, user_id: &str, key: &str) -> Result<bool> {
        let url = self.history_url(user_id, Some(key));
        let existing = self.send(Method::Get, &url, None)?;
        if existing.trim() == "null" {
            return Ok(false);
        }
        self.send(Method::Delete, &url, None)?;
        Ok(true)
    }
}

/// Record payload with a server-side timestamp placeholder for `viewedAt`.
fn record_body(record: &HistoryRecord) -> Result<String> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("viewedAt".to_string(), json!({ ".sv": "timestamp" }));
    }
    Ok(serde_json::to_string(&value)?)
}

pub(super) fn parse_history_document(raw: &str) -> Result<Vec<HistoryEntry>> {
    let document: Value = serde_json::from_str(raw)?;
    let fields = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Object(fields) => fields,
        other => return Err(anyhow!("unexpected history document: {other}")),
    };
    Ok(parse_history_entries(fields))
}

fn parse_history_entries(fields: Map<String, Value>) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    for (key, value) in fields {
        match serde_json::from_value::<StoredEntry>(value) {
            Ok(stored) => entries.push(HistoryEntry {
                key,
                record: stored.record,
                viewed_at: stored.viewed_at,
            }),
            Err(err) => warn!(key = %key, "skipping malformed history entry: {err}"),
        }
    }
    entries
}

pub(super) fn latest_series_entry<'a>(
    entries: &'a [HistoryEntry],
    series_id: &str,
) -> Option<&'a HistoryEntry> {
    entries
        .iter()
        .filter(|entry| {
            entry.record.kind == ContentKind::Series && entry.record.content_id == series_id
        })
        .max_by_key(|entry| entry.viewed_at)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::app::tracking::{ErrorKind, failure_kind};
    use crate::http::test_server::{Behavior, TestServer};

    fn fast_log(server: &TestServer, token: Option<&str>) -> RemoteHistoryLog {
        RemoteHistoryLog::with_policy(
            &server.base_url,
            token.map(str::to_string),
            RetryPolicy {
                connect_timeout: Duration::from_millis(200),
                read_timeout: Duration::from_millis(500),
                attempts: 2,
                retry_delay: Duration::from_millis(1),
            },
        )
    }

    const DOCUMENT: &str = r#"{
        "show_T1": { "type": "series", "contentId": "show", "title": "Show: T1",
                     "season": "T1", "lastEpisode": 4, "viewedAt": 1000 },
        "show_T2": { "type": "series", "contentId": "show", "title": "Show: T2",
                     "season": "T2", "lastEpisode": 3, "viewedAt": 3000 },
        "film":    { "type": "movie", "contentId": "film", "title": "Film",
                     "season": null, "lastEpisode": null, "viewedAt": 5000 },
        "broken":  { "contentId": 12 }
    }"#;

    #[test]
    fn parses_document_and_skips_malformed_entries() {
        let entries = parse_history_document(DOCUMENT).expect("document should parse");
        assert_eq!(entries.len(), 3);
        assert!(parse_history_document("null").expect("null").is_empty());
    }

    #[test]
    fn latest_series_entry_uses_viewed_at() {
        let entries = parse_history_document(DOCUMENT).expect("document should parse");
        let latest = latest_series_entry(&entries, "show").expect("entry should exist");
        assert_eq!(latest.key, "show_T2");
        assert!(latest_series_entry(&entries, "film").is_none());
    }

    #[test]
    fn reads_last_watched_from_remote_document() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, DOCUMENT.to_string())]);
        let log = fast_log(&server, Some("secret"));

        let last = log
            .read_last_watched("uid", "show")
            .expect("read should succeed")
            .expect("history exists");
        assert_eq!(
            last,
            LastWatched {
                season: "T2".to_string(),
                last_episode: 3
            }
        );
        let requests = server.requests();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].target, "/users/uid/history.json?auth=secret");
    }

    #[test]
    fn writes_record_with_server_timestamp() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "{}".to_string())]);
        let log = fast_log(&server, None);
        let record = HistoryRecord {
            kind: ContentKind::Series,
            content_id: "show".to_string(),
            title: "Show: T2".to_string(),
            poster: Some("t2.jpg".to_string()),
            season: Some("T2".to_string()),
            last_episode: Some(5),
        };

        log.write_history("uid", "show_T2", &record)
            .expect("write should succeed");

        let requests = server.requests();
        assert_eq!(requests[0].method, "PUT");
        assert_eq!(requests[0].target, "/users/uid/history/show_T2.json");
        let body: Value = serde_json::from_str(&requests[0].body).expect("json body");
        assert_eq!(body["type"], "series");
        assert_eq!(body["lastEpisode"], 5);
        assert_eq!(body["viewedAt"][".sv"], "timestamp");
    }

    #[test]
    fn remove_reports_missing_entry_without_deleting() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "null".to_string())]);
        let log = fast_log(&server, None);

        assert!(!log.remove_history("uid", "gone").expect("request should succeed"));
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn surfaces_read_failures() {
        let server = TestServer::spawn(vec![Behavior::Respond(401, "denied".to_string())]);
        let log = fast_log(&server, None);
        let err = log
            .read_last_watched("uid", "show")
            .expect_err("401 should fail");
        assert!(format!("{err:#}").contains("HTTP status 401"), "{err:#}");
        assert_eq!(failure_kind(&err), ErrorKind::Auth);
    }
}
