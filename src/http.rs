use std::thread;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(5),
            attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Why a request ultimately failed.
#[derive(Debug, Error)]
pub(crate) enum HttpError {
    #[error("request failed after {attempts} attempt(s): HTTP status {status}{detail}")]
    Status {
        status: u16,
        attempts: usize,
        /// Truncated response body in parentheses, or empty.
        detail: String,
    },
    #[error("request failed after {attempts} attempt(s): transport error: {message}")]
    Transport { attempts: usize, message: String },
    #[error("request failed: response decode failed: {0}")]
    Decode(String),
}

impl HttpError {
    /// 401 and 403 responses; the credentials were rejected.
    pub(crate) fn is_auth(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

/// Sends one request, retrying transport failures and retryable statuses.
/// A JSON body is attached when `body` is set.
pub(crate) fn send_with_retries(
    method: Method,
    url: &str,
    query: &[(String, String)],
    body: Option<&str>,
    policy: RetryPolicy,
) -> Result<String, HttpError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(policy.connect_timeout)
            .timeout_read(policy.read_timeout)
            .timeout_write(policy.read_timeout)
            .build();

        let mut request = agent.request(method.as_str(), url);
        for (key, value) in query {
            request = request.query(key, value);
        }

        let sent = match body {
            Some(payload) => request
                .set("Content-Type", "application/json")
                .send_string(payload),
            None => request.call(),
        };

        match sent {
            Ok(response) => {
                return response
                    .into_string()
                    .map_err(|err| HttpError::Decode(err.to_string()));
            }
            Err(ureq::Error::Status(status, response)) => {
                if should_retry_http_status(status) && attempt < attempts {
                    thread::sleep(policy.retry_delay);
                    continue;
                }

                let response_body = response.into_string().ok().unwrap_or_default();
                let text = response_body.trim();
                let detail = if text.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", text.chars().take(240).collect::<String>())
                };
                return Err(HttpError::Status {
                    status,
                    attempts: attempt,
                    detail,
                });
            }
            Err(ureq::Error::Transport(err)) => {
                if attempt < attempts {
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                return Err(HttpError::Transport {
                    attempts: attempt,
                    message: err.to_string(),
                });
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_server::{Behavior, TestServer};
    use super::*;

    fn fast_policy(attempts: usize) -> RetryPolicy {
        RetryPolicy {
            connect_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(200),
            attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn retries_retryable_statuses_until_success() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(500, "server-error".to_string()),
            Behavior::Respond(429, "throttled".to_string()),
            Behavior::Respond(200, "ok".to_string()),
        ]);
        let query = vec![("q".to_string(), "x".to_string())];

        let result = send_with_retries(Method::Get, &server.base_url, &query, None, fast_policy(3));

        assert_eq!(result.expect("should eventually succeed"), "ok");
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn does_not_retry_hard_client_errors() {
        let server = TestServer::spawn(vec![Behavior::Respond(404, "not-found".to_string())]);

        let result = send_with_retries(Method::Get, &server.base_url, &[], None, fast_policy(5));

        let err = result.expect_err("404 should not be retried");
        assert!(
            err.to_string().contains("HTTP status 404 (not-found)"),
            "unexpected error message: {err}"
        );
        assert!(!err.is_auth());
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn retries_transport_timeout_and_recovers() {
        let server = TestServer::spawn(vec![
            Behavior::DelayRespond(Duration::from_millis(120), 200, "slow".to_string()),
            Behavior::Respond(200, "ok".to_string()),
        ]);
        let policy = RetryPolicy {
            connect_timeout: Duration::from_millis(250),
            read_timeout: Duration::from_millis(20),
            attempts: 2,
            retry_delay: Duration::from_millis(1),
        };

        let result = send_with_retries(Method::Get, &server.base_url, &[], None, policy);

        assert_eq!(result.expect("timeout should be retried"), "ok");
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn returns_retry_exhausted_error_for_retryable_status() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(503, "down".to_string()),
            Behavior::Respond(503, "still-down".to_string()),
        ]);

        let result = send_with_retries(Method::Get, &server.base_url, &[], None, fast_policy(2));

        let err = result.expect_err("retryable failures should eventually error");
        let message = err.to_string();
        assert!(
            message.contains("after 2 attempt(s)") && message.contains("HTTP status 503"),
            "unexpected error message: {message}"
        );
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn put_sends_json_body() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "{}".to_string())]);
        let url = format!("{}/doc.json", server.base_url);

        send_with_retries(Method::Put, &url, &[], Some(r#"{"a":1}"#), fast_policy(1))
            .expect("put should succeed");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "PUT");
        assert_eq!(requests[0].target, "/doc.json");
        assert_eq!(requests[0].body, r#"{"a":1}"#);
    }

    #[test]
    fn rejected_credentials_are_auth_errors() {
        let server = TestServer::spawn(vec![Behavior::Respond(403, "denied".to_string())]);

        let err = send_with_retries(Method::Get, &server.base_url, &[], None, fast_policy(3))
            .expect_err("403 should fail");

        assert!(err.is_auth(), "{err}");
        assert_eq!(server.request_count(), 1);
    }
}
