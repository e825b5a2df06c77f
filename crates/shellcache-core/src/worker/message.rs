//! Control messages sent by the host page.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate a waiting worker version immediately.
    SkipWaiting,
    /// Fetch and cache every manifest resource not yet in the content cache.
    DownloadOffline,
}

impl ControlMessage {
    /// Parse a wire message. Unknown messages yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "skipWaiting" => Some(ControlMessage::SkipWaiting),
            "downloadOffline" => Some(ControlMessage::DownloadOffline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMessage::SkipWaiting => "skipWaiting",
            ControlMessage::DownloadOffline => "downloadOffline",
        }
    }
}

/// A resource the offline fill could not cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillFailure {
    pub key: String,
    pub reason: String,
}

/// Result of a best-effort offline fill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Keys fetched and stored by this fill.
    pub fetched: Vec<String>,
    /// Keys already cached before the fill started.
    pub already_cached: usize,
    pub failed: Vec<FillFailure>,
}

impl FillReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    SkippedWaiting,
    OfflineFill(FillReport),
    Ignored,
}
