//! The live writer: one thread that owns the terminal update loop.
//!
//! Graph changes, key presses, spinner ticks and the burst catch-up deadline
//! all arrive on channels and are handled in order by a single thread, so the
//! render state needs no locking.

use crate::batch::{EventBatchBuffer, LogRecordEvent};
use crate::config::LiveConfig;
use crate::error::WriterError;
use crate::graph::{GraphChange, LogGraph, LogLevel};
use crate::lifecycle::{ProcessContext, ShutdownTrigger};
use crate::render::canvas::Canvas;
use crate::render::format::EntryRenderer;
use crate::render::keys::{KeyAction, KeyDispatcher, TerminalSize};
use crate::render::update_loop::TerminalUpdateLoop;
use crossbeam_channel::{select, Receiver, Sender};
use crossterm::event::KeyEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Messages the writer thread accepts besides graph changes.
#[derive(Debug, Clone)]
pub enum WriterCommand {
    Key(KeyEvent),
    Resize(TerminalSize),
    SetThreshold(LogLevel),
    Stop,
}

impl From<KeyEvent> for WriterCommand {
    fn from(key: KeyEvent) -> Self {
        WriterCommand::Key(key)
    }
}

impl From<TerminalSize> for WriterCommand {
    fn from(size: TerminalSize) -> Self {
        WriterCommand::Resize(size)
    }
}

/// Handle to a running writer thread.
pub struct LiveWriter {
    commands: Sender<WriterCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LiveWriter {
    /// Start rendering `graph` onto `canvas`.
    ///
    /// When `batch` is given, every change is queued there as a log record
    /// straight from the graph, carrying the entry as that change left it.
    /// Records keep flowing after the writer stops, until the final flush.
    /// The writer stops itself when `ctx` shuts down.
    pub fn spawn<C, R>(
        graph: Arc<LogGraph>,
        canvas: C,
        renderer: R,
        config: &LiveConfig,
        batch: Option<Arc<EventBatchBuffer>>,
        ctx: &ProcessContext,
    ) -> Result<Arc<Self>, WriterError>
    where
        C: Canvas + Send + 'static,
        R: EntryRenderer + Send + 'static,
    {
        config.validate()?;
        let keys = config.key_dispatcher()?;
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let changes = graph.subscribe();
        if let Some(batch) = batch {
            graph.observe(move |view| batch.enqueue(LogRecordEvent::from_view(view)));
        }

        let state = WriterThread {
            ui: TerminalUpdateLoop::new(canvas, renderer, &config.terminal),
            graph,
            keys,
            ticker: SpinnerTicker::new(config.terminal.spinner_interval()),
            shutdown: ctx.trigger(),
        };
        let handle = thread::Builder::new()
            .name("live-writer".to_string())
            .spawn(move || state.run(changes, command_rx))
            .map_err(WriterError::Spawn)?;

        let writer = Arc::new(Self {
            commands,
            handle: Mutex::new(Some(handle)),
        });
        let hook = Arc::clone(&writer);
        ctx.register_shutdown_hook("live writer", move || hook.stop());
        Ok(writer)
    }

    /// Sender for key events and other commands, e.g. for
    /// [`spawn_key_reader`](crate::render::keys::spawn_key_reader).
    pub fn commands(&self) -> Sender<WriterCommand> {
        self.commands.clone()
    }

    pub fn set_threshold(&self, level: LogLevel) {
        let _ = self.commands.send(WriterCommand::SetThreshold(level));
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Stop the writer and wait for it.
    ///
    /// Renders a still-deferred update, stops the spinners and releases the
    /// canvas before returning. Stopping twice is a no-op.
    pub fn stop(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let _ = self.commands.send(WriterCommand::Stop);
        if handle.join().is_err() {
            tracing::error!("live writer thread panicked");
        }
    }
}

/// Spinner clock that only exists while spinners are running.
struct SpinnerTicker {
    interval: Duration,
    ticks: Option<Receiver<Instant>>,
}

impl SpinnerTicker {
    fn new(interval: Duration) -> Self {
        Self { interval, ticks: None }
    }

    /// Arm or drop the clock to match `running`; an idle ticker never fires.
    fn sync(&mut self, running: bool) -> Receiver<Instant> {
        match (running, self.ticks.is_some()) {
            (true, false) => self.ticks = Some(crossbeam_channel::tick(self.interval)),
            (false, true) => self.ticks = None,
            _ => {}
        }
        self.ticks.clone().unwrap_or_else(crossbeam_channel::never)
    }

    fn is_armed(&self) -> bool {
        self.ticks.is_some()
    }
}

struct WriterThread<C, R> {
    ui: TerminalUpdateLoop<C, R>,
    graph: Arc<LogGraph>,
    keys: KeyDispatcher,
    ticker: SpinnerTicker,
    shutdown: ShutdownTrigger,
}

impl<C: Canvas, R: EntryRenderer> WriterThread<C, R> {
    fn run(mut self, changes: Receiver<GraphChange>, commands: Receiver<WriterCommand>) {
        tracing::debug!("live writer started");
        let threshold = self.ui.threshold();
        self.ui.set_threshold(&*self.graph, threshold, Instant::now());

        loop {
            let spinner_tick = self.ticker.sync(self.ui.spinners_running());
            let catch_up = self
                .ui
                .next_deadline()
                .map(crossbeam_channel::at)
                .unwrap_or_else(crossbeam_channel::never);

            select! {
                recv(changes) -> change => match change {
                    Ok(change) => {
                        self.ui.on_change(&*self.graph, &change, Instant::now());
                    }
                    Err(_) => break,
                },
                recv(commands) -> command => match command {
                    Ok(WriterCommand::Key(key)) => self.on_key(&key),
                    Ok(WriterCommand::Resize(size)) => {
                        self.ui.resize(&*self.graph, size.width, size.height, Instant::now());
                    }
                    Ok(WriterCommand::SetThreshold(level)) => {
                        self.ui.set_threshold(&*self.graph, level, Instant::now());
                    }
                    Ok(WriterCommand::Stop) | Err(_) => break,
                },
                recv(spinner_tick) -> _ => self.ui.tick_spinners(),
                recv(catch_up) -> _ => {
                    self.ui.poll(&*self.graph, Instant::now());
                }
            }
        }

        if let Err(e) = self.ui.finish(&*self.graph, Instant::now()) {
            tracing::warn!("failed to release canvas: {}", e);
        }
        tracing::debug!("live writer stopped");
    }

    fn on_key(&mut self, key: &KeyEvent) {
        match self.keys.dispatch(key) {
            Some(KeyAction::PageUp) => self.ui.page_up(),
            Some(KeyAction::PageDown) => self.ui.page_down(),
            Some(KeyAction::SetThreshold(level)) => {
                self.ui.set_threshold(&*self.graph, level, Instant::now());
            }
            Some(KeyAction::Quit) => self.shutdown.fire(),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchFlusher, ChannelSink};
    use crate::error::CanvasError;
    use crate::graph::{EntryStatus, NewEntry};
    use crate::render::canvas::MemoryCanvas;
    use crate::render::format::PlainRenderer;
    use crossterm::event::{KeyCode, KeyModifiers};

    /// Lets the test look at a canvas owned by the writer thread.
    #[derive(Clone)]
    struct SharedCanvas(Arc<Mutex<MemoryCanvas>>);

    impl Canvas for SharedCanvas {
        fn set_line(&mut self, row: usize, text: &str) {
            self.0.lock().set_line(row, text)
        }
        fn line(&self, row: usize) -> Option<String> {
            self.0.lock().line(row)
        }
        fn line_count(&self) -> usize {
            self.0.lock().line_count()
        }
        fn set_scroll_percent(&mut self, percent: u8) {
            self.0.lock().set_scroll_percent(percent)
        }
        fn scroll_percent(&self) -> u8 {
            self.0.lock().scroll_percent()
        }
        fn scroll(&self) -> usize {
            self.0.lock().scroll()
        }
        fn scroll_by(&mut self, delta: isize) {
            self.0.lock().scroll_by(delta)
        }
        fn width(&self) -> u16 {
            self.0.lock().width()
        }
        fn height(&self) -> u16 {
            self.0.lock().height()
        }
        fn resize(&mut self, width: u16, height: u16) {
            self.0.lock().resize(width, height)
        }
        fn render(&mut self) -> Result<(), CanvasError> {
            self.0.lock().render()
        }
        fn destroy(&mut self) -> Result<(), CanvasError> {
            self.0.lock().destroy()
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_writer_renders_and_forwards_changes() {
        let ctx = ProcessContext::new();
        let graph = Arc::new(LogGraph::new());
        let canvas = SharedCanvas(Arc::new(Mutex::new(MemoryCanvas::new(60, 10))));
        let (sink, _batches) = ChannelSink::unbounded();
        let buffer = Arc::new(EventBatchBuffer::new("s", 200, sink));

        let writer = LiveWriter::spawn(
            Arc::clone(&graph),
            canvas.clone(),
            PlainRenderer::default(),
            &LiveConfig::default(),
            Some(Arc::clone(&buffer)),
            &ctx,
        )
        .unwrap();

        let task = graph.insert(None, NewEntry::task("build", "compiling")).unwrap();
        assert!(wait_for(|| canvas.line(0).is_some_and(|l| l.starts_with("[build] "))));

        graph.set_status(task, EntryStatus::Done).unwrap();
        assert!(wait_for(|| canvas.line(0).as_deref() == Some("[build] compiling")));
        assert!(wait_for(|| buffer.stats().queued_log_entries == 2));

        writer.stop();
        assert!(!writer.is_running());
        assert!(canvas.0.lock().destroyed);
        writer.stop();
    }

    #[test]
    fn test_quit_key_requests_shutdown() {
        let ctx = ProcessContext::new();
        let graph = Arc::new(LogGraph::new());
        let canvas = SharedCanvas(Arc::new(Mutex::new(MemoryCanvas::new(60, 10))));
        let writer = LiveWriter::spawn(
            graph,
            canvas.clone(),
            PlainRenderer::default(),
            &LiveConfig::default(),
            None,
            &ctx,
        )
        .unwrap();

        let requested = ctx.shutdown_requested();
        writer
            .commands()
            .send(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE).into())
            .unwrap();
        assert!(requested.recv_timeout(Duration::from_secs(5)).is_err());
        assert!(ctx.is_shutdown_requested());

        ctx.shutdown();
        assert!(!writer.is_running());
        assert!(canvas.0.lock().destroyed);
    }

    #[test]
    fn test_threshold_command_redraws() {
        let ctx = ProcessContext::new();
        let graph = Arc::new(LogGraph::new());
        graph.insert(None, NewEntry::new(LogLevel::Info, "shown")).unwrap();
        graph.insert(None, NewEntry::new(LogLevel::Debug, "detail")).unwrap();
        let canvas = SharedCanvas(Arc::new(Mutex::new(MemoryCanvas::new(60, 10))));
        let writer = LiveWriter::spawn(
            graph,
            canvas.clone(),
            PlainRenderer::default(),
            &LiveConfig::default(),
            None,
            &ctx,
        )
        .unwrap();

        assert!(wait_for(|| canvas.line(0).as_deref() == Some("shown")));
        writer.set_threshold(LogLevel::Debug);
        assert!(wait_for(|| canvas.line(1).as_deref() == Some("detail")));
        writer.stop();
    }

    #[test]
    fn test_shutdown_ships_every_revision() {
        let ctx = ProcessContext::new();
        let graph = Arc::new(LogGraph::new());
        let (sink, batches) = ChannelSink::unbounded();
        let buffer = Arc::new(EventBatchBuffer::new("s", 200, sink));
        BatchFlusher::spawn_in(&ctx, Arc::clone(&buffer), Duration::from_secs(60));
        let _writer = LiveWriter::spawn(
            Arc::clone(&graph),
            MemoryCanvas::new(60, 10),
            PlainRenderer::default(),
            &LiveConfig::default(),
            Some(Arc::clone(&buffer)),
            &ctx,
        )
        .unwrap();

        let output = graph.insert(None, NewEntry::stream(LogLevel::Info)).unwrap();
        for i in 0..200 {
            graph.append_output(output, &format!("line {i}")).unwrap();
        }
        ctx.shutdown();

        let records: Vec<LogRecordEvent> = batches.try_iter().flat_map(|batch| batch.log_entries).collect();
        let revisions: Vec<u64> = records.iter().map(|record| record.revision).collect();
        assert_eq!(revisions, (0..=200).collect::<Vec<u64>>());
        assert_eq!(records[1].message, "line 0");
        assert_eq!(records[200].message.lines().last(), Some("line 199"));
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_spinner_ticker_only_runs_with_spinners() {
        let mut ticker = SpinnerTicker::new(Duration::from_millis(5));
        let idle = ticker.sync(false);
        assert!(!ticker.is_armed());
        assert!(idle.recv_timeout(Duration::from_millis(50)).is_err());

        let ticks = ticker.sync(true);
        assert!(ticker.is_armed());
        assert!(ticks.recv_timeout(Duration::from_secs(1)).is_ok());

        ticker.sync(false);
        assert!(!ticker.is_armed());
    }

    #[test]
    fn test_spinner_animates_until_done() {
        let ctx = ProcessContext::new();
        let graph = Arc::new(LogGraph::new());
        let canvas = SharedCanvas(Arc::new(Mutex::new(MemoryCanvas::new(60, 10))));
        let writer = LiveWriter::spawn(
            Arc::clone(&graph),
            canvas.clone(),
            PlainRenderer::default(),
            &LiveConfig::default(),
            None,
            &ctx,
        )
        .unwrap();

        let task = graph.insert(None, NewEntry::task("build", "compiling")).unwrap();
        assert!(wait_for(|| canvas.line(0).is_some_and(|l| l.starts_with("[build] "))));
        let first = canvas.line(0);
        assert!(wait_for(|| canvas.line(0) != first));

        graph.set_status(task, EntryStatus::Done).unwrap();
        assert!(wait_for(|| canvas.line(0).as_deref() == Some("[build] compiling")));
        let renders = canvas.0.lock().renders;
        thread::sleep(Duration::from_millis(200));
        assert_eq!(canvas.0.lock().renders, renders);
        assert_eq!(canvas.line(0).as_deref(), Some("[build] compiling"));
        writer.stop();
    }

    #[test]
    fn test_resize_command_rewraps() {
        let ctx = ProcessContext::new();
        let graph = Arc::new(LogGraph::new());
        graph.insert(None, NewEntry::new(LogLevel::Info, "x".repeat(40))).unwrap();
        let canvas = SharedCanvas(Arc::new(Mutex::new(MemoryCanvas::new(60, 10))));
        let writer = LiveWriter::spawn(
            graph,
            canvas.clone(),
            PlainRenderer::default(),
            &LiveConfig::default(),
            None,
            &ctx,
        )
        .unwrap();

        assert!(wait_for(|| canvas.line(0).is_some_and(|l| l.len() == 40)));
        writer
            .commands()
            .send(TerminalSize { width: 22, height: 10 }.into())
            .unwrap();
        assert!(wait_for(|| canvas.line(1).is_some_and(|l| l.len() == 20)));
        assert_eq!(canvas.width(), 22);
        writer.stop();
    }
}
