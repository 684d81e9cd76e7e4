//! Two-queue buffer for outbound telemetry

use crate::batch::sink::OutboundSink;
use crate::graph::{EntryKey, EntryStatus, LogEntryView, LogLevel};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default maximum records per periodic batch
pub const DEFAULT_BATCH_CAP: usize = 200;

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// An application-level event, e.g. "command finished".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredEvent {
    pub name: String,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl StructuredEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            timestamp_ms: unix_millis(),
            payload,
        }
    }
}

/// The state of one log entry at the time it changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecordEvent {
    pub key: EntryKey,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_key: Option<EntryKey>,
    pub level: LogLevel,
    pub status: EntryStatus,
    pub revision: u64,
    pub timestamp_ms: u64,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metadata: BTreeMap<String, String>,
}

impl LogRecordEvent {
    pub fn from_view(view: &LogEntryView) -> Self {
        Self {
            key: view.key,
            parent_key: view.parent_key,
            level: view.level,
            status: view.status,
            revision: view.revision,
            timestamp_ms: unix_millis(),
            message: view.message.clone(),
            metadata: view.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Structured(StructuredEvent),
    LogRecord(LogRecordEvent),
}

impl From<StructuredEvent> for OutboundEvent {
    fn from(event: StructuredEvent) -> Self {
        OutboundEvent::Structured(event)
    }
}

impl From<LogRecordEvent> for OutboundEvent {
    fn from(record: LogRecordEvent) -> Self {
        OutboundEvent::LogRecord(record)
    }
}

/// One call to the outbound sink. Either list may be empty, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundBatch {
    pub session_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<StructuredEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub log_entries: Vec<LogRecordEvent>,
}

impl OutboundBatch {
    pub fn len(&self) -> usize {
        self.events.len() + self.log_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.log_entries.is_empty()
    }
}

/// Counts from one `flush` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub events: usize,
    pub log_entries: usize,
    /// False if the sink rejected the batch; the records are gone either way.
    pub delivered: bool,
}

impl FlushReport {
    pub fn removed(&self) -> usize {
        self.events + self.log_entries
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub queued_events: usize,
    pub queued_log_entries: usize,
    pub batches_sent: u64,
    pub failed_batches: u64,
    /// Records removed in batches the sink rejected
    pub records_lost: u64,
}

#[derive(Default)]
struct Queues {
    events: VecDeque<StructuredEvent>,
    log_entries: VecDeque<LogRecordEvent>,
}

/// Buffers structured events and log records between flushes.
///
/// Delivery is best-effort: a batch handed to the sink is removed from the
/// queues whether or not the sink accepts it, and failed batches are never
/// retried. Failures are logged and counted in [`BufferStats`].
pub struct EventBatchBuffer {
    session_id: String,
    cap: usize,
    queues: Mutex<Queues>,
    /// Held across drain and send so batches reach the sink in order.
    sending: Mutex<()>,
    sink: Box<dyn OutboundSink>,
    stats: Mutex<BufferStats>,
}

impl EventBatchBuffer {
    pub fn new(session_id: impl Into<String>, cap: usize, sink: impl OutboundSink + 'static) -> Self {
        Self {
            session_id: session_id.into(),
            cap: cap.max(1),
            queues: Mutex::new(Queues::default()),
            sending: Mutex::new(()),
            sink: Box::new(sink),
            stats: Mutex::new(BufferStats::default()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn enqueue(&self, event: impl Into<OutboundEvent>) {
        let mut queues = self.queues.lock();
        match event.into() {
            OutboundEvent::Structured(event) => queues.events.push_back(event),
            OutboundEvent::LogRecord(record) => queues.log_entries.push_back(record),
        }
    }

    /// Shorthand for enqueuing a [`StructuredEvent`].
    pub fn record(&self, name: impl Into<String>, payload: serde_json::Value) {
        self.enqueue(StructuredEvent::new(name, payload));
    }

    pub fn pending(&self) -> usize {
        let queues = self.queues.lock();
        queues.events.len() + queues.log_entries.len()
    }

    pub fn stats(&self) -> BufferStats {
        let queues = self.queues.lock();
        BufferStats {
            queued_events: queues.events.len(),
            queued_log_entries: queues.log_entries.len(),
            ..*self.stats.lock()
        }
    }

    /// Remove one batch and hand it to the sink.
    ///
    /// Takes up to the cap, structured events first. With `flush_all` both
    /// queues are drained completely into a single batch.
    pub fn flush(&self, flush_all: bool) -> FlushReport {
        let _sending = self.sending.lock();

        let batch = {
            let mut queues = self.queues.lock();
            let (events, log_entries) = if flush_all {
                (queues.events.len(), queues.log_entries.len())
            } else {
                let events = queues.events.len().min(self.cap);
                (events, queues.log_entries.len().min(self.cap - events))
            };
            OutboundBatch {
                session_id: self.session_id.clone(),
                events: queues.events.drain(..events).collect(),
                log_entries: queues.log_entries.drain(..log_entries).collect(),
            }
        };

        if batch.is_empty() {
            return FlushReport::default();
        }

        let mut report = FlushReport {
            events: batch.events.len(),
            log_entries: batch.log_entries.len(),
            delivered: true,
        };

        match self.sink.send(&batch) {
            Ok(()) => {
                self.stats.lock().batches_sent += 1;
                tracing::trace!(records = batch.len(), "flushed outbound batch");
            }
            Err(e) => {
                let mut stats = self.stats.lock();
                stats.failed_batches += 1;
                stats.records_lost += batch.len() as u64;
                report.delivered = false;
                tracing::warn!(records = batch.len(), "dropping outbound batch: {}", e);
            }
        }
        report
    }
}
