//! Entry-to-text rendering and width-aware line editing

use crate::error::RenderError;
use crate::graph::{LogEntryView, LogLevel};
use unicode_width::UnicodeWidthChar;

/// Turns an entry into plain text.
///
/// Implementations must be pure: the same view always yields the same text.
pub trait EntryRenderer {
    /// Decorated form used for structured entries.
    fn render(&self, entry: &LogEntryView) -> Result<String, RenderError>;

    /// Pass-through form used for subprocess output.
    fn render_raw(&self, entry: &LogEntryView) -> Result<String, RenderError>;

    /// Display column at which a spinner glyph is inserted.
    fn spinner_column(&self, entry: &LogEntryView) -> usize;
}

/// Default renderer: indentation, optional `[label]`, level tag, message.
#[derive(Debug, Clone)]
pub struct PlainRenderer {
    /// Columns of indentation per tree level
    pub indent: usize,
}

impl Default for PlainRenderer {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl PlainRenderer {
    fn prefix(&self, entry: &LogEntryView) -> String {
        let mut prefix = " ".repeat(entry.depth * self.indent);
        if !entry.label.is_empty() {
            prefix.push('[');
            prefix.push_str(&entry.label);
            prefix.push_str("] ");
        }
        prefix
    }

    fn level_tag(level: LogLevel) -> &'static str {
        match level {
            LogLevel::Error => "ERROR ",
            LogLevel::Warn => "WARN ",
            _ => "",
        }
    }
}

impl EntryRenderer for PlainRenderer {
    fn render(&self, entry: &LogEntryView) -> Result<String, RenderError> {
        let prefix = self.prefix(entry);
        let pad = " ".repeat(entry.depth * self.indent);
        let mut out = String::with_capacity(prefix.len() + entry.message.len());
        out.push_str(&prefix);
        out.push_str(Self::level_tag(entry.level));
        // Continuation lines line up with the entry's indentation.
        for (i, line) in entry.message.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
                out.push_str(&pad);
            }
            out.push_str(line);
        }
        if out.trim().is_empty() {
            return Ok(String::new());
        }
        Ok(out)
    }

    fn render_raw(&self, entry: &LogEntryView) -> Result<String, RenderError> {
        Ok(entry.message.clone())
    }

    fn spinner_column(&self, entry: &LogEntryView) -> usize {
        if entry.from_live_stream {
            0
        } else {
            text_width(&self.prefix(entry))
        }
    }
}

/// Splits a line into `(byte offset, piece, columns)`.
///
/// A piece is one character, or a whole CSI escape sequence (colors and
/// cursor codes in raw subprocess output), which takes no columns.
fn pieces(line: &str) -> impl Iterator<Item = (usize, &str, usize)> + '_ {
    let mut chars = line.char_indices().peekable();
    std::iter::from_fn(move || {
        let (start, c) = chars.next()?;
        if c == '\x1b' && chars.peek().map(|&(_, next)| next) == Some('[') {
            chars.next();
            let mut end = line.len();
            for (i, c) in chars.by_ref() {
                if ('\x40'..='\x7e').contains(&c) {
                    end = i + c.len_utf8();
                    break;
                }
            }
            return Some((start, &line[start..end], 0));
        }
        let end = start + c.len_utf8();
        Some((start, &line[start..end], c.width().unwrap_or(0)))
    })
}

/// Display width of `text`, ignoring zero-width characters and escape sequences.
pub fn text_width(text: &str) -> usize {
    pieces(text).map(|(_, _, width)| width).sum()
}

/// Longest prefix of `line` that fits in `width` columns.
pub fn clip_to_width(line: &str, width: usize) -> &str {
    let mut used = 0;
    for (offset, _, w) in pieces(line) {
        if used + w > width {
            return &line[..offset];
        }
        used += w;
    }
    line
}

/// Byte offset in `line` where display column `column` starts.
///
/// Lines shorter than `column` return `line.len()`.
fn byte_offset_at_column(line: &str, column: usize) -> usize {
    let mut width = 0;
    for (offset, _, w) in pieces(line) {
        if width >= column {
            return offset;
        }
        width += w;
    }
    line.len()
}

/// Hard-wrap `text` to `width` display columns.
///
/// Existing newlines are kept, words are broken wherever the limit falls and
/// nothing is reflowed. Escape sequences are never split.
pub fn wrap_hard(text: &str, width: usize) -> String {
    let width = width.max(1);
    let mut out = String::with_capacity(text.len() + text.len() / width);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut used = 0;
        for (_, piece, w) in pieces(line) {
            if used + w > width && used > 0 {
                out.push('\n');
                used = 0;
            }
            out.push_str(piece);
            used += w;
        }
    }
    out
}

/// Insert `glyph` followed by one space at display `column` of the first line.
///
/// Returns the text and the column the glyph actually landed on, which is
/// past `column` when a wide character straddles it.
pub fn splice_at_column(text: &str, column: usize, glyph: &str) -> (String, usize) {
    let first_end = text.find('\n').unwrap_or(text.len());
    let first = &text[..first_end];
    let offset = byte_offset_at_column(first, column);
    let mut out = String::with_capacity(text.len() + glyph.len() + 1);
    out.push_str(&first[..offset]);
    // Pad short lines so the glyph still lands on its column.
    let before = text_width(&first[..offset]);
    let missing = column.saturating_sub(before);
    out.extend(std::iter::repeat(' ').take(missing));
    out.push_str(glyph);
    out.push(' ');
    out.push_str(&text[offset..]);
    (out, before + missing)
}

/// Replace the single character at display `column` of `line` with `glyph`.
pub fn replace_at_column(line: &str, column: usize, glyph: &str) -> String {
    let start = byte_offset_at_column(line, column);
    if start >= line.len() {
        let mut out = line.to_string();
        let missing = column.saturating_sub(text_width(line));
        out.extend(std::iter::repeat(' ').take(missing));
        out.push_str(glyph);
        return out;
    }
    let end = pieces(&line[start..])
        .next()
        .map_or(start, |(_, piece, _)| start + piece.len());
    format!("{}{}{}", &line[..start], glyph, &line[end..])
}
