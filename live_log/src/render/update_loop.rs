//! The synchronous core of the live writer.
//!
//! [`TerminalUpdateLoop`] ties the throttle, the snapshot builder, the diff
//! writer and the spinner scheduler together. It never reads the clock or
//! spawns anything itself: callers pass `now` in and drive the spinner ticks
//! and catch-up polls, so the whole render policy can be exercised with plain
//! `Instant` arithmetic.

use crate::config::TerminalConfig;
use crate::error::CanvasError;
use crate::graph::{EntryKey, GraphChange, GraphSource, LogLevel};
use crate::render::canvas::Canvas;
use crate::render::diff::DiffWriter;
use crate::render::format::EntryRenderer;
use crate::render::snapshot::SnapshotBuilder;
use crate::render::spinner::SpinnerScheduler;
use crate::render::throttle::{Decision, ThrottleController};
use std::time::Instant;

/// What happened in response to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A snapshot was diffed onto the canvas; `rows` lines were rewritten.
    Rendered { rows: usize },
    /// Part of a burst; a catch-up render is pending.
    Deferred,
    /// Nothing to show: the trigger is filtered out, rendering failed, or
    /// the loop is stopped.
    Skipped,
}

pub struct TerminalUpdateLoop<C, R> {
    builder: SnapshotBuilder<R>,
    spinners: SpinnerScheduler,
    diff: DiffWriter<C>,
    throttle: ThrottleController,
    threshold: LogLevel,
    stopped: bool,
}

impl<C: Canvas, R: EntryRenderer> TerminalUpdateLoop<C, R> {
    pub fn new(canvas: C, renderer: R, config: &TerminalConfig) -> Self {
        Self {
            builder: SnapshotBuilder::new(renderer, config.wrap_margin),
            spinners: SpinnerScheduler::new(),
            diff: DiffWriter::new(canvas),
            throttle: ThrottleController::new(config.burst_window())
                .with_structured_throttling(config.throttle_structured),
            threshold: config.severity_threshold,
            stopped: false,
        }
    }

    pub fn threshold(&self) -> LogLevel {
        self.threshold
    }

    pub fn canvas(&self) -> &C {
        self.diff.canvas()
    }

    pub fn spinners(&self) -> &SpinnerScheduler {
        &self.spinners
    }

    pub fn spinners_running(&self) -> bool {
        self.spinners.is_running()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// When the pending catch-up render is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.throttle.next_deadline()
    }

    /// React to a change of one graph entry.
    pub fn on_change<G: GraphSource + ?Sized>(
        &mut self,
        graph: &G,
        change: &GraphChange,
        now: Instant,
    ) -> RenderOutcome {
        if self.stopped {
            return RenderOutcome::Skipped;
        }
        match self.throttle.on_notification(change.from_live_stream, false, now) {
            Decision::Deferred => {
                self.spinners.stop();
                RenderOutcome::Deferred
            }
            Decision::RenderNow => self.render(graph, Some(change.key), now, false),
        }
    }

    /// Fire the catch-up render once its deadline has passed.
    pub fn poll<G: GraphSource + ?Sized>(&mut self, graph: &G, now: Instant) -> Option<RenderOutcome> {
        if self.stopped || !self.throttle.due(now) {
            return None;
        }
        Some(self.render(graph, None, now, true))
    }

    /// Advance every running spinner in place.
    pub fn tick_spinners(&mut self) {
        if self.stopped {
            return;
        }
        if let Err(e) = self.spinners.tick_all(self.diff.canvas_mut()) {
            tracing::warn!("spinner repaint failed: {}", e);
        }
    }

    /// Change the severity threshold and redraw everything.
    pub fn set_threshold<G: GraphSource + ?Sized>(
        &mut self,
        graph: &G,
        threshold: LogLevel,
        now: Instant,
    ) -> RenderOutcome {
        self.threshold = threshold;
        if self.stopped {
            return RenderOutcome::Skipped;
        }
        tracing::debug!(%threshold, "severity threshold changed");
        self.diff.force_full_redraw();
        self.render(graph, None, now, false)
    }

    /// Adopt new canvas dimensions and redraw everything at the new width.
    pub fn resize<G: GraphSource + ?Sized>(
        &mut self,
        graph: &G,
        width: u16,
        height: u16,
        now: Instant,
    ) -> RenderOutcome {
        if self.stopped {
            return RenderOutcome::Skipped;
        }
        tracing::debug!(width, height, "canvas resized");
        self.diff.canvas_mut().resize(width, height);
        self.diff.force_full_redraw();
        self.render(graph, None, now, false)
    }

    /// Scroll back one page. The view stays put until scrolled to the bottom.
    pub fn page_up(&mut self) {
        self.scroll_page(-1);
    }

    /// Scroll forward one page; reaching the bottom follows new output again.
    pub fn page_down(&mut self) {
        self.scroll_page(1);
    }

    fn scroll_page(&mut self, direction: isize) {
        if self.stopped {
            return;
        }
        let canvas = self.diff.canvas_mut();
        let page = canvas.height().max(1) as isize;
        canvas.scroll_by(direction * page);
        let at_bottom = canvas.scroll_percent() == 100;
        if let Err(e) = canvas.render() {
            tracing::warn!("scroll repaint failed: {}", e);
        }
        self.diff.set_follow_tail(at_bottom);
    }

    /// Stop spinners and ignore further notifications. Idempotent.
    pub fn stop(&mut self) {
        self.spinners.stop();
        self.stopped = true;
    }

    /// Render a still-pending deferred update, stop, and release the canvas.
    ///
    /// Returns the outcome of the final render if one was pending. Calling
    /// this on a stopped loop only makes sure the canvas is released.
    pub fn finish<G: GraphSource + ?Sized>(
        &mut self,
        graph: &G,
        now: Instant,
    ) -> Result<Option<RenderOutcome>, CanvasError> {
        let mut outcome = None;
        if !self.stopped && self.throttle.is_pending() {
            outcome = Some(self.render(graph, None, now, true));
        }
        self.stop();
        self.diff.canvas_mut().destroy()?;
        Ok(outcome)
    }

    pub fn into_canvas(self) -> C {
        self.diff.into_canvas()
    }

    fn render<G: GraphSource + ?Sized>(
        &mut self,
        graph: &G,
        trigger: Option<EntryKey>,
        now: Instant,
        catch_up: bool,
    ) -> RenderOutcome {
        let width = self.diff.canvas().width();
        let snapshot = match self.builder.build(graph, self.threshold, width, &mut self.spinners) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("skipping render: {}", e);
                if catch_up {
                    self.throttle.mark_rendered(now, true);
                }
                return RenderOutcome::Skipped;
            }
        };

        if let Some(key) = trigger {
            if snapshot.find(key).is_none() {
                return RenderOutcome::Skipped;
            }
        }

        let rows = match self.diff.apply(&snapshot) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("canvas repaint failed: {}", e);
                0
            }
        };

        let slots = snapshot.spinner_slots();
        if slots.is_empty() {
            self.spinners.stop();
        } else {
            self.spinners.start(slots);
        }
        self.throttle.mark_rendered(now, catch_up);

        RenderOutcome::Rendered { rows }
    }
}
