//! Core types for the log graph

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Stable identifier of an entry in the log graph.
///
/// Keys are arena slots: they are never reused while the graph is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(pub u64);

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Log severity levels, most severe first.
///
/// An entry is shown when `entry.level <= threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error messages
    Error,
    /// Warning messages
    Warn,
    /// Informational messages
    Info,
    /// General debugging information
    Debug,
    /// Detailed information for debugging
    Trace,
}

impl LogLevel {
    /// All levels in threshold order, indexed by their key digit.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Convert from tracing Level
    pub fn from_tracing(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }

    /// Threshold selected by the digit keys `0`..=`4`.
    pub fn from_digit(digit: u8) -> Option<Self> {
        Self::ALL.get(digit as usize).copied()
    }

    /// Whether an entry at this level passes `threshold`.
    pub fn is_visible_at(self, threshold: LogLevel) -> bool {
        self <= threshold
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// Lifecycle status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Work is in progress; rendered with a spinner.
    Active,
    /// Finished successfully.
    Done,
    /// Finished with a failure.
    Error,
    #[default]
    Unknown,
}

impl EntryStatus {
    pub fn is_active(self) -> bool {
        self == EntryStatus::Active
    }
}

/// Read-only view of one entry, as handed out by a graph snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntryView {
    pub key: EntryKey,
    pub parent_key: Option<EntryKey>,
    pub level: LogLevel,
    pub status: EntryStatus,
    /// True when the text is raw output of a subprocess.
    pub from_live_stream: bool,
    /// Bumped on every mutation of this entry.
    pub revision: u64,
    /// Distance from the root of the tree; roots are at depth 0.
    pub depth: usize,
    /// Short task name shown before the message (may be empty).
    pub label: String,
    pub message: String,
    /// Structured fields attached by the producer.
    pub metadata: BTreeMap<String, String>,
}

impl LogEntryView {
    /// Create a root view with the given key, mostly for tests and fixtures.
    pub fn new(key: EntryKey, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            key,
            parent_key: None,
            level,
            status: EntryStatus::Unknown,
            from_live_stream: false,
            revision: 0,
            depth: 0,
            label: String::new(),
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_parent(mut self, parent: EntryKey, depth: usize) -> Self {
        self.parent_key = Some(parent);
        self.depth = depth;
        self
    }

    pub fn live_stream(mut self) -> Self {
        self.from_live_stream = true;
        self
    }
}

/// Data needed to insert a new entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub level: LogLevel,
    pub status: EntryStatus,
    pub from_live_stream: bool,
    pub label: String,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl NewEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            status: EntryStatus::Unknown,
            from_live_stream: false,
            label: String::new(),
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// An in-progress task entry.
    pub fn task(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: EntryStatus::Active,
            label: label.into(),
            ..Self::new(LogLevel::Info, message)
        }
    }

    /// An entry that collects raw subprocess output.
    pub fn stream(level: LogLevel) -> Self {
        Self {
            from_live_stream: true,
            ..Self::new(level, String::new())
        }
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Notification fired for every insert or mutation in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphChange {
    pub key: EntryKey,
    pub from_live_stream: bool,
    pub revision: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_visibility_against_threshold() {
        assert!(LogLevel::Error.is_visible_at(LogLevel::Info));
        assert!(LogLevel::Info.is_visible_at(LogLevel::Info));
        assert!(!LogLevel::Debug.is_visible_at(LogLevel::Info));
    }

    #[test]
    fn test_digit_thresholds() {
        assert_eq!(LogLevel::from_digit(0), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_digit(4), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_digit(5), None);
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
