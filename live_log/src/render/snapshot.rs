//! Builds the line layout of the current graph

use crate::error::RenderError;
use crate::graph::{EntryKey, GraphSource, LogLevel};
use crate::render::format::{splice_at_column, wrap_hard, EntryRenderer};
use crate::render::spinner::{SpinnerScheduler, SpinnerSlot};

/// One visible entry laid out on the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRecord {
    pub key: EntryKey,
    /// Already wrapped; may span several lines.
    pub text: String,
    /// Canvas row of the first line.
    pub line_number: usize,
    /// `(column, row)` of the spinner glyph for active entries.
    pub spinner_coords: Option<(usize, usize)>,
}

impl RenderRecord {
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }
}

/// Ordered render records, one per visible entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub records: Vec<RenderRecord>,
}

impl Snapshot {
    pub fn find(&self, key: EntryKey) -> Option<&RenderRecord> {
        self.records.iter().find(|record| record.key == key)
    }

    /// Every physical line, in canvas order.
    pub fn lines(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|record| record.text.split('\n'))
            .map(str::to_string)
            .collect()
    }

    /// Spinner positions of every active entry.
    pub fn spinner_slots(&self) -> Vec<SpinnerSlot> {
        self.records
            .iter()
            .filter_map(|record| {
                record.spinner_coords.map(|(column, row)| SpinnerSlot {
                    key: record.key,
                    column,
                    row,
                })
            })
            .collect()
    }
}

/// Walks a graph snapshot and lays out the visible entries.
pub struct SnapshotBuilder<R> {
    renderer: R,
    /// Columns kept free on the right edge
    wrap_margin: u16,
}

impl<R: EntryRenderer> SnapshotBuilder<R> {
    pub fn new(renderer: R, wrap_margin: u16) -> Self {
        Self {
            renderer,
            wrap_margin,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Lay out every entry at or above `threshold`.
    ///
    /// Active entries get a freshly ticked spinner glyph spliced in; every
    /// other entry has its spinner state released, including entries hidden
    /// by the threshold.
    pub fn build<G: GraphSource + ?Sized>(
        &self,
        graph: &G,
        threshold: LogLevel,
        canvas_width: u16,
        spinners: &mut SpinnerScheduler,
    ) -> Result<Snapshot, RenderError> {
        let wrap_width = canvas_width.saturating_sub(self.wrap_margin).max(1) as usize;
        let mut records = Vec::new();
        let mut line_number = 0;

        for entry in graph.snapshot() {
            if !entry.status.is_active() {
                spinners.forget(entry.key);
            }
            if !entry.level.is_visible_at(threshold) {
                continue;
            }

            let mut text = if entry.from_live_stream {
                self.renderer.render_raw(&entry)?
            } else {
                self.renderer.render(&entry)?
            };

            let mut spinner_coords = None;
            if entry.status.is_active() {
                // The glyph and its space must stay on the first wrapped line.
                let column = self
                    .renderer
                    .spinner_column(&entry)
                    .min(wrap_width.saturating_sub(2));
                let (spliced, landed) = splice_at_column(&text, column, spinners.tick(entry.key));
                text = spliced;
                spinner_coords = Some((landed, line_number));
            }

            let text = wrap_hard(&text, wrap_width);
            if text.is_empty() {
                continue;
            }

            let record = RenderRecord {
                key: entry.key,
                text,
                line_number,
                spinner_coords,
            };
            line_number += record.line_count();
            records.push(record);
        }

        Ok(Snapshot { records })
    }
}
