use std::sync::mpsc;

use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    Network,
    Auth,
    Database,
    Content,
    Unknown,
}

impl ErrorKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Database => "database",
            Self::Content => "content",
            Self::Unknown => "unknown",
        }
    }

    pub(crate) fn default_message(self) -> &'static str {
        match self {
            Self::Network => "Could not reach the server. Check your connection.",
            Self::Auth => "Authentication failed. Try signing in again.",
            Self::Database => "Could not save data. Your changes may not have been saved.",
            Self::Content => "Could not load the content. Try reloading the catalog.",
            Self::Unknown => "Something unexpected happened. Try again.",
        }
    }
}

/// Fire-and-forget sink for faults the user may need to hear about.
pub(crate) trait ErrorReporter: Send + Sync {
    fn report(&self, kind: ErrorKind, message: &str);
}

fn resolve_message(kind: ErrorKind, message: &str) -> String {
    if message.trim().is_empty() {
        kind.default_message().to_string()
    } else {
        message.to_string()
    }
}

#[derive(Debug, Default)]
pub(crate) struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, kind: ErrorKind, message: &str) {
        error!(kind = kind.label(), "{}", resolve_message(kind, message));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Report {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
}

/// Forwards reports to a receiver drained by the TUI loop.
#[derive(Debug)]
pub(crate) struct ChannelReporter {
    tx: mpsc::Sender<Report>,
}

impl ChannelReporter {
    pub(crate) fn new(tx: mpsc::Sender<Report>) -> Self {
        Self { tx }
    }
}

impl ErrorReporter for ChannelReporter {
    fn report(&self, kind: ErrorKind, message: &str) {
        let message = resolve_message(kind, message);
        error!(kind = kind.label(), "{message}");
        let _ = self.tx.send(Report { kind, message });
    }
}
