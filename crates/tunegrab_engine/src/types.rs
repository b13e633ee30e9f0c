use std::fmt;
use std::path::PathBuf;

use tunegrab_core::TaskRecord;

/// Events delivered by [`crate::ChannelObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    TaskUpdated(TaskRecord),
    BatchCompleted(Vec<TaskRecord>),
}

/// Everything an adapter needs to convert one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub url: String,
    pub item_id: String,
    pub outdir: PathBuf,
    /// Output filename without extension.
    pub stem: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutput {
    pub path: Option<PathBuf>,
}

/// Progress reported by an adapter while it works on one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEvent {
    Downloading { downloaded: u64, total: Option<u64> },
    /// Fetch finished; transcoding starts.
    FetchFinished,
    /// The adapter is about to retry; `attempt` is the upcoming attempt number.
    Retrying { attempt: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    pub kind: FailureKind,
    pub message: String,
}

impl ConversionError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn interrupted() -> Self {
        Self::new(FailureKind::Interrupted, "cancelled")
    }

    pub fn is_interrupted(&self) -> bool {
        self.kind == FailureKind::Interrupted
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ConversionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Interrupted,
    ToolMissing,
    Network,
    Transcode,
    Io,
    Unexpected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Interrupted => write!(f, "interrupted"),
            FailureKind::ToolMissing => write!(f, "tool missing"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Transcode => write!(f, "transcode error"),
            FailureKind::Io => write!(f, "io error"),
            FailureKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}
