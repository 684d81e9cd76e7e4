//! Canvas abstraction the live writer paints into

use crate::error::CanvasError;

/// A scrollable, line-addressed drawing surface.
///
/// Rows are absolute positions in the canvas content, not screen rows; the
/// canvas decides which rows are visible from its scroll offset.
pub trait Canvas {
    /// Set the content of `row`, growing the canvas if needed.
    fn set_line(&mut self, row: usize, text: &str);

    /// Current content of `row`.
    fn line(&self, row: usize) -> Option<String>;

    /// Number of content rows.
    fn line_count(&self) -> usize;

    /// Scroll so that `percent` (0..=100) of the scrollable range is above the view.
    fn set_scroll_percent(&mut self, percent: u8);

    fn scroll_percent(&self) -> u8;

    /// Offset of the first visible row.
    fn scroll(&self) -> usize;

    /// Move the view by `delta` rows.
    fn scroll_by(&mut self, delta: isize);

    fn width(&self) -> u16;

    fn height(&self) -> u16;

    /// Adopt new dimensions; the next `render` repaints the whole view.
    fn resize(&mut self, width: u16, height: u16);

    /// Paint pending changes.
    fn render(&mut self) -> Result<(), CanvasError>;

    /// Release the surface. Further calls are no-ops.
    fn destroy(&mut self) -> Result<(), CanvasError>;
}

/// Scroll bookkeeping shared by canvas implementations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub offset: usize,
}

impl ScrollState {
    pub fn max_offset(lines: usize, height: u16) -> usize {
        lines.saturating_sub(height as usize)
    }

    pub fn percent(&self, lines: usize, height: u16) -> u8 {
        let max = Self::max_offset(lines, height);
        if max == 0 {
            100
        } else {
            ((self.offset.min(max) * 100) / max) as u8
        }
    }

    pub fn set_percent(&mut self, percent: u8, lines: usize, height: u16) {
        let max = Self::max_offset(lines, height);
        self.offset = (max * percent.min(100) as usize) / 100;
    }

    pub fn scroll_by(&mut self, delta: isize, lines: usize, height: u16) {
        let max = Self::max_offset(lines, height) as isize;
        self.offset = (self.offset as isize + delta).clamp(0, max) as usize;
    }
}

/// In-memory canvas that records every write, used in tests and headless runs.
#[derive(Debug, Clone)]
pub struct MemoryCanvas {
    lines: Vec<String>,
    width: u16,
    height: u16,
    scroll: ScrollState,
    /// Every `set_line` call in order
    pub writes: Vec<(usize, String)>,
    /// Number of `render` calls
    pub renders: usize,
    pub destroyed: bool,
}

impl MemoryCanvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            lines: Vec::new(),
            width,
            height,
            scroll: ScrollState::default(),
            writes: Vec::new(),
            renders: 0,
            destroyed: false,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Forget recorded writes and renders, keeping content.
    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.renders = 0;
    }
}

impl Canvas for MemoryCanvas {
    fn set_line(&mut self, row: usize, text: &str) {
        if row >= self.lines.len() {
            self.lines.resize(row + 1, String::new());
        }
        self.lines[row] = text.to_string();
        self.writes.push((row, text.to_string()));
    }

    fn line(&self, row: usize) -> Option<String> {
        self.lines.get(row).cloned()
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn set_scroll_percent(&mut self, percent: u8) {
        self.scroll.set_percent(percent, self.lines.len(), self.height);
    }

    fn scroll_percent(&self) -> u8 {
        self.scroll.percent(self.lines.len(), self.height)
    }

    fn scroll(&self) -> usize {
        self.scroll.offset
    }

    fn scroll_by(&mut self, delta: isize) {
        self.scroll.scroll_by(delta, self.lines.len(), self.height);
    }

    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.scroll.scroll_by(0, self.lines.len(), height);
    }

    fn render(&mut self) -> Result<(), CanvasError> {
        self.renders += 1;
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), CanvasError> {
        self.destroyed = true;
        Ok(())
    }
}
