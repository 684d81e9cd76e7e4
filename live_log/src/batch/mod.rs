//! Batched delivery of structured events and log records.
//!
//! Records are queued in an [`EventBatchBuffer`] and handed to an
//! [`OutboundSink`] in batches, periodically by a [`BatchFlusher`] and once
//! more in full at shutdown.

pub mod buffer;
pub mod flusher;
pub mod sink;

pub use buffer::{
    BufferStats, EventBatchBuffer, FlushReport, LogRecordEvent, OutboundBatch, OutboundEvent,
    StructuredEvent, DEFAULT_BATCH_CAP,
};
pub use flusher::BatchFlusher;
pub use sink::{ChannelSink, JsonLinesSink, OutboundSink};
