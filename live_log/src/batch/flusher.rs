//! Background thread that flushes an [`EventBatchBuffer`] on a fixed period

use crate::batch::buffer::{EventBatchBuffer, FlushReport};
use crate::lifecycle::ProcessContext;
use crossbeam_channel::{select, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Running {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct BatchFlusher {
    buffer: Arc<EventBatchBuffer>,
    running: Mutex<Option<Running>>,
}

impl BatchFlusher {
    /// Start flushing `buffer` every `interval`.
    pub fn spawn(buffer: Arc<EventBatchBuffer>, interval: Duration) -> Arc<Self> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let ticker = crossbeam_channel::tick(interval);
        let thread_buffer = Arc::clone(&buffer);

        let handle = thread::spawn(move || loop {
            select! {
                recv(ticker) -> _ => {
                    thread_buffer.flush(false);
                }
                recv(stop_rx) -> _ => break,
            }
        });

        Arc::new(Self {
            buffer,
            running: Mutex::new(Some(Running {
                stop: stop_tx,
                handle,
            })),
        })
    }

    /// Like [`BatchFlusher::spawn`], and stop when `ctx` shuts down.
    pub fn spawn_in(ctx: &ProcessContext, buffer: Arc<EventBatchBuffer>, interval: Duration) -> Arc<Self> {
        let flusher = Self::spawn(buffer, interval);
        let hook = Arc::clone(&flusher);
        ctx.register_shutdown_hook("event flusher", move || {
            hook.stop();
        });
        flusher
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Cancel the periodic flush and drain everything with one final flush.
    ///
    /// Only the first call flushes; later calls return `None`.
    pub fn stop(&self) -> Option<FlushReport> {
        let running = self.running.lock().take()?;
        let _ = running.stop.send(());
        if running.handle.join().is_err() {
            tracing::error!("event flusher thread panicked");
        }
        let report = self.buffer.flush(true);
        tracing::debug!(records = report.removed(), "final event flush");
        Some(report)
    }
}
