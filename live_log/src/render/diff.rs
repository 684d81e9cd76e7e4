//! Row-level diffing between consecutive snapshots

use crate::error::CanvasError;
use crate::render::canvas::Canvas;
use crate::render::snapshot::Snapshot;

/// Writes only the canvas rows whose content changed since the last apply.
pub struct DiffWriter<C> {
    canvas: C,
    previous: Vec<String>,
    /// Snap to the bottom after writing; off while the user is scrolled back.
    follow_tail: bool,
    full_redraw: bool,
}

impl<C: Canvas> DiffWriter<C> {
    pub fn new(canvas: C) -> Self {
        Self {
            canvas,
            previous: Vec::new(),
            follow_tail: true,
            full_redraw: false,
        }
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }

    /// What the canvas is believed to show.
    pub fn previous_output(&self) -> &[String] {
        &self.previous
    }

    pub fn set_follow_tail(&mut self, follow: bool) {
        self.follow_tail = follow;
    }

    pub fn follows_tail(&self) -> bool {
        self.follow_tail
    }

    /// Write the rows of `snapshot` that differ from the previous output.
    ///
    /// Rows that no longer exist are blanked. Returns the number of rows
    /// written. The previous output is replaced even when nothing changed.
    pub fn apply(&mut self, snapshot: &Snapshot) -> Result<usize, CanvasError> {
        let lines = snapshot.lines();
        let full = std::mem::take(&mut self.full_redraw);
        let mut written = 0;

        for (row, line) in lines.iter().enumerate() {
            if full || self.previous.get(row) != Some(line) {
                self.canvas.set_line(row, line);
                written += 1;
            }
        }
        for row in lines.len()..self.previous.len() {
            if full || !self.previous[row].is_empty() {
                self.canvas.set_line(row, "");
                written += 1;
            }
        }

        self.previous = lines;

        if written > 0 {
            if self.follow_tail {
                self.canvas.set_scroll_percent(100);
            }
            self.canvas.render()?;
        }
        Ok(written)
    }

    /// Make the next `apply` rewrite every row, blanking any left over.
    pub fn force_full_redraw(&mut self) {
        self.full_redraw = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntryKey;
    use crate::render::canvas::MemoryCanvas;
    use crate::render::snapshot::RenderRecord;

    fn snapshot(texts: &[&str]) -> Snapshot {
        let mut line_number = 0;
        let records = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let record = RenderRecord {
                    key: EntryKey(i as u64),
                    text: text.to_string(),
                    line_number,
                    spinner_coords: None,
                };
                line_number += record.line_count();
                record
            })
            .collect();
        Snapshot { records }
    }

    #[test]
    fn test_only_changed_rows_are_written() {
        let mut writer = DiffWriter::new(MemoryCanvas::new(40, 10));
        writer.apply(&snapshot(&["a", "b\nc", "d"])).unwrap();
        writer.canvas_mut().clear_log();

        let written = writer.apply(&snapshot(&["a", "b\nC", "D"])).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            writer.canvas().writes,
            vec![(2, "C".to_string()), (3, "D".to_string())]
        );
        assert_eq!(writer.canvas().renders, 1);
    }

    #[test]
    fn test_identical_snapshot_writes_nothing() {
        let mut writer = DiffWriter::new(MemoryCanvas::new(40, 10));
        writer.apply(&snapshot(&["a", "b"])).unwrap();
        writer.canvas_mut().clear_log();

        assert_eq!(writer.apply(&snapshot(&["a", "b"])).unwrap(), 0);
        assert!(writer.canvas().writes.is_empty());
        assert_eq!(writer.canvas().renders, 0);
    }

    #[test]
    fn test_full_redraw_rewrites_everything() {
        let mut writer = DiffWriter::new(MemoryCanvas::new(40, 10));
        writer.apply(&snapshot(&["a", "b"])).unwrap();
        writer.force_full_redraw();
        assert_eq!(writer.apply(&snapshot(&["a", "b"])).unwrap(), 2);
        assert_eq!(writer.apply(&snapshot(&["a", "b"])).unwrap(), 0);

        writer.force_full_redraw();
        assert_eq!(writer.apply(&snapshot(&["a"])).unwrap(), 2);
        assert_eq!(writer.previous_output(), &["a"]);
    }

    #[test]
    fn test_shrinking_output_blanks_stale_rows() {
        let mut writer = DiffWriter::new(MemoryCanvas::new(40, 10));
        writer.apply(&snapshot(&["a", "b", "c"])).unwrap();
        writer.canvas_mut().clear_log();

        assert_eq!(writer.apply(&snapshot(&["a"])).unwrap(), 2);
        assert_eq!(writer.canvas().lines(), &["a", "", ""]);
    }

    #[test]
    fn test_scrolled_back_view_is_left_alone() {
        let mut writer = DiffWriter::new(MemoryCanvas::new(40, 2));
        writer.apply(&snapshot(&["1", "2", "3", "4"])).unwrap();
        assert_eq!(writer.canvas().scroll(), 2);

        writer.canvas_mut().scroll_by(-2);
        writer.set_follow_tail(false);
        writer.apply(&snapshot(&["1", "2", "3", "4", "5"])).unwrap();
        assert_eq!(writer.canvas().scroll(), 0);

        writer.set_follow_tail(true);
        writer.apply(&snapshot(&["1", "2", "3", "4", "5", "6"])).unwrap();
        assert_eq!(writer.canvas().scroll(), 4);
    }
}
