//! The hierarchical log graph consumed by the live writer.
//!
//! Entries form a tree: tasks contain child messages, subprocess output
//! streams, and nested tasks. The graph is the source of truth; renderers only
//! ever read snapshots of it.

pub mod store;
pub mod types;

pub use store::{GraphSource, GraphStats, LogGraph};
pub use types::{EntryKey, EntryStatus, GraphChange, LogEntryView, LogLevel, NewEntry};
