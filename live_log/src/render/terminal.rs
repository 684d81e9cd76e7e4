//! Crossterm-backed canvas and terminal session management

use crate::error::CanvasError;
use crate::render::canvas::{Canvas, ScrollState};
use crate::render::format::clip_to_width;
use crossterm::{
    cursor::{self, MoveTo},
    style::Print,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand, QueueableCommand,
};
use std::collections::BTreeSet;
use std::io::{self, stdout, Stdout, Write};
use std::panic;

/// RAII guard for terminal session
/// Ensures terminal is restored to usable state on drop
pub struct TerminalSession {
    /// Whether we successfully initialized
    initialized: bool,
}

impl TerminalSession {
    /// Enter raw mode and the alternate screen.
    pub fn new() -> io::Result<Self> {
        // Restore the terminal before the panic message is printed
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            let _ = Self::cleanup();
            original_hook(panic_info);
        }));

        terminal::enable_raw_mode()?;
        stdout()
            .execute(EnterAlternateScreen)?
            .execute(cursor::Hide)?;

        Ok(Self { initialized: true })
    }

    fn cleanup() -> io::Result<()> {
        stdout()
            .execute(cursor::Show)?
            .execute(LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if self.initialized {
            let _ = Self::cleanup();
        }
    }
}

/// Canvas that paints into a terminal through crossterm.
///
/// Content is kept in a scrollback buffer; `render` repaints only the visible
/// rows touched since the last paint, or the whole view after scrolling.
pub struct TerminalCanvas<W: Write = Stdout> {
    out: W,
    lines: Vec<String>,
    dirty: BTreeSet<usize>,
    full_repaint: bool,
    scroll: ScrollState,
    size: (u16, u16),
    session: Option<TerminalSession>,
    destroyed: bool,
}

impl TerminalCanvas<Stdout> {
    /// Take over the controlling terminal.
    pub fn stdout() -> io::Result<Self> {
        let session = TerminalSession::new()?;
        let size = terminal::size().unwrap_or((80, 24));
        let mut canvas = Self::with_writer(stdout(), size.0, size.1);
        canvas.session = Some(session);
        Ok(canvas)
    }
}

impl<W: Write> TerminalCanvas<W> {
    /// Canvas over an arbitrary writer, without touching terminal modes.
    pub fn with_writer(out: W, width: u16, height: u16) -> Self {
        Self {
            out,
            lines: Vec::new(),
            dirty: BTreeSet::new(),
            full_repaint: true,
            scroll: ScrollState::default(),
            size: (width, height),
            session: None,
            destroyed: false,
        }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn visible_rows(&self) -> std::ops::Range<usize> {
        let start = self.scroll.offset;
        start..start + self.size.1 as usize
    }

    fn paint_row(&mut self, row: usize) -> io::Result<()> {
        let screen_row = (row - self.scroll.offset) as u16;
        let width = self.size.0 as usize;
        let text = self.lines.get(row).map(String::as_str).unwrap_or("");
        self.out.queue(MoveTo(0, screen_row))?;
        // Rows are pre-wrapped; clip anything that still overflows.
        self.out.queue(Print(clip_to_width(text, width)))?;
        self.out.queue(Clear(ClearType::UntilNewLine))?;
        Ok(())
    }
}

impl<W: Write> Canvas for TerminalCanvas<W> {
    fn set_line(&mut self, row: usize, text: &str) {
        if row >= self.lines.len() {
            self.lines.resize(row + 1, String::new());
        }
        self.lines[row] = text.to_string();
        self.dirty.insert(row);
    }

    fn line(&self, row: usize) -> Option<String> {
        self.lines.get(row).cloned()
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn set_scroll_percent(&mut self, percent: u8) {
        let before = self.scroll;
        self.scroll.set_percent(percent, self.lines.len(), self.size.1);
        self.full_repaint |= before != self.scroll;
    }

    fn scroll_percent(&self) -> u8 {
        self.scroll.percent(self.lines.len(), self.size.1)
    }

    fn scroll(&self) -> usize {
        self.scroll.offset
    }

    fn scroll_by(&mut self, delta: isize) {
        let before = self.scroll;
        self.scroll.scroll_by(delta, self.lines.len(), self.size.1);
        self.full_repaint |= before != self.scroll;
    }

    fn width(&self) -> u16 {
        self.size.0
    }

    fn height(&self) -> u16 {
        self.size.1
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.size = (width, height);
        self.scroll.scroll_by(0, self.lines.len(), height);
        self.full_repaint = true;
    }

    fn render(&mut self) -> Result<(), CanvasError> {
        if self.destroyed {
            return Ok(());
        }
        let visible = self.visible_rows();
        let rows: Vec<usize> = if self.full_repaint {
            visible.collect()
        } else {
            self.dirty.range(visible).copied().collect()
        };
        for row in rows {
            self.paint_row(row)?;
        }
        self.out.flush()?;
        self.dirty.clear();
        self.full_repaint = false;
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), CanvasError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        if self.session.is_some() {
            self.out.execute(Clear(ClearType::All))?;
        }
        // Dropping the session restores the terminal.
        self.session.take();
        Ok(())
    }
}
