//! Outbound sinks for flushed batches

use crate::batch::buffer::OutboundBatch;
use crate::error::SinkError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use std::io::Write;

/// Receives flushed batches. Called outside of any buffer lock.
pub trait OutboundSink: Send + Sync {
    fn send(&self, batch: &OutboundBatch) -> Result<(), SinkError>;
}

/// Writes each batch as one JSON document per line.
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn writer(&self) -> MutexGuard<'_, W> {
        self.out.lock()
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> OutboundSink for JsonLinesSink<W> {
    fn send(&self, batch: &OutboundBatch) -> Result<(), SinkError> {
        let line = serde_json::to_string(batch)?;
        let mut out = self.out.lock();
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

/// Forwards batches over a channel, for in-process consumers and tests.
pub struct ChannelSink {
    sender: Sender<OutboundBatch>,
}

impl ChannelSink {
    pub fn new(sender: Sender<OutboundBatch>) -> Self {
        Self { sender }
    }

    pub fn unbounded() -> (Self, Receiver<OutboundBatch>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl OutboundSink for ChannelSink {
    fn send(&self, batch: &OutboundBatch) -> Result<(), SinkError> {
        self.sender
            .send(batch.clone())
            .map_err(|_| SinkError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::buffer::StructuredEvent;
    use serde_json::json;

    fn batch(name: &str) -> OutboundBatch {
        OutboundBatch {
            session_id: "s".to_string(),
            events: vec![StructuredEvent {
                name: name.to_string(),
                timestamp_ms: 1,
                payload: json!(null),
            }],
            log_entries: Vec::new(),
        }
    }

    #[test]
    fn test_json_lines_sink_writes_one_line_per_batch() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.send(&batch("a")).unwrap();
        sink.send(&batch("b")).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let decoded: OutboundBatch = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(decoded.events[0].name, "b");
        assert!(decoded.log_entries.is_empty());
    }

    #[test]
    fn test_channel_sink_reports_disconnect() {
        let (sink, rx) = ChannelSink::unbounded();
        sink.send(&batch("a")).unwrap();
        assert_eq!(rx.recv().unwrap().events[0].name, "a");

        drop(rx);
        assert!(matches!(sink.send(&batch("b")), Err(SinkError::Disconnected)));
    }
}
