//! Live terminal view of a hierarchical log graph.
//!
//! The [`writer::LiveWriter`] keeps the terminal in sync with a
//! [`graph::LogGraph`]: only changed rows are repainted, active tasks get an
//! animated spinner, and floods of subprocess output are coalesced into one
//! render per burst window. Alongside, the [`batch::EventBatchBuffer`] ships
//! structured events and log records to an outbound sink in capped batches,
//! with a final full flush on shutdown.

pub mod batch;
pub mod config;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod logging;
pub mod render;
pub mod writer;

pub use batch::{BatchFlusher, EventBatchBuffer, JsonLinesSink, OutboundSink};
pub use config::LiveConfig;
pub use graph::{EntryKey, EntryStatus, LogGraph, LogLevel, NewEntry};
pub use lifecycle::ProcessContext;
pub use logging::{init_tracing, GraphTracingLayer};
pub use render::{PlainRenderer, TerminalCanvas};
pub use writer::{LiveWriter, WriterCommand};
