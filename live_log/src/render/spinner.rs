//! Per-entry spinner animation

use crate::error::CanvasError;
use crate::graph::EntryKey;
use crate::render::canvas::Canvas;
use crate::render::format::replace_at_column;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Braille dot spinner animation frames.
pub const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Animation state of one spinner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpinnerPhase {
    pub phase: usize,
}

impl SpinnerPhase {
    /// Starting phase derived from the key, so neighbouring spinners are out of step.
    pub fn seeded(key: EntryKey) -> Self {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        Self {
            phase: (hasher.finish() % FRAMES.len() as u64) as usize,
        }
    }
}

/// Current glyph for `phase`, advancing it by one frame.
pub fn next_glyph(phase: &mut SpinnerPhase) -> &'static str {
    let glyph = FRAMES[phase.phase % FRAMES.len()];
    phase.phase = (phase.phase + 1) % FRAMES.len();
    glyph
}

/// Where a spinner glyph sits on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinnerSlot {
    pub key: EntryKey,
    pub column: usize,
    pub row: usize,
}

/// Owns the animation state of every active entry and the set of glyph
/// positions the tick loop repaints.
#[derive(Debug, Default)]
pub struct SpinnerScheduler {
    phases: HashMap<EntryKey, SpinnerPhase>,
    slots: Vec<SpinnerSlot>,
}

impl SpinnerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next glyph for `key`, creating its animation state on first use.
    pub fn tick(&mut self, key: EntryKey) -> &'static str {
        let phase = self
            .phases
            .entry(key)
            .or_insert_with(|| SpinnerPhase::seeded(key));
        next_glyph(phase)
    }

    /// Drop the animation state of an entry that is no longer active.
    pub fn forget(&mut self, key: EntryKey) {
        self.phases.remove(&key);
    }

    pub fn contains(&self, key: EntryKey) -> bool {
        self.phases.contains_key(&key)
    }

    /// Number of entries with animation state.
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// (Re)start the tick loop on exactly `slots`. An empty set stops it.
    pub fn start(&mut self, slots: Vec<SpinnerSlot>) {
        self.slots = slots;
    }

    /// Stop the tick loop. Stopping a stopped loop is a no-op.
    pub fn stop(&mut self) {
        self.slots.clear();
    }

    /// Whether the tick loop has anything to animate.
    pub fn is_running(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn slots(&self) -> &[SpinnerSlot] {
        &self.slots
    }

    /// Advance every running spinner and paint it in place.
    pub fn tick_all<C: Canvas + ?Sized>(&mut self, canvas: &mut C) -> Result<(), CanvasError> {
        if self.slots.is_empty() {
            return Ok(());
        }
        let slots = self.slots.clone();
        for slot in slots {
            let glyph = self.tick(slot.key);
            let Some(line) = canvas.line(slot.row) else {
                continue;
            };
            canvas.set_line(slot.row, &replace_at_column(&line, slot.column, glyph));
        }
        canvas.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::canvas::MemoryCanvas;

    #[test]
    fn test_glyphs_cycle() {
        let mut phase = SpinnerPhase::default();
        let first: Vec<&str> = (0..FRAMES.len()).map(|_| next_glyph(&mut phase)).collect();
        assert_eq!(first, FRAMES);
        assert_eq!(next_glyph(&mut phase), FRAMES[0]);
    }

    #[test]
    fn test_tick_allocates_and_forget_releases() {
        let mut spinners = SpinnerScheduler::new();
        let key = EntryKey(4);
        let a = spinners.tick(key);
        let b = spinners.tick(key);
        assert_ne!(a, b);
        assert!(spinners.contains(key));

        spinners.forget(key);
        assert!(!spinners.contains(key));
        assert!(spinners.is_empty());
    }

    #[test]
    fn test_seed_is_stable_per_key() {
        assert_eq!(SpinnerPhase::seeded(EntryKey(9)), SpinnerPhase::seeded(EntryKey(9)));
    }

    #[test]
    fn test_tick_all_repaints_slots() {
        let mut canvas = MemoryCanvas::new(40, 10);
        canvas.set_line(0, "[a] ⠋ working");
        canvas.set_line(1, "plain line");
        canvas.clear_log();

        let mut spinners = SpinnerScheduler::new();
        spinners.start(vec![SpinnerSlot { key: EntryKey(0), column: 4, row: 0 }]);
        spinners.tick_all(&mut canvas).unwrap();

        assert_eq!(canvas.writes.len(), 1);
        assert_eq!(canvas.renders, 1);
        let line = canvas.line(0).unwrap();
        assert!(line.starts_with("[a] "));
        assert!(line.ends_with(" working"));
        assert_eq!(canvas.line(1).as_deref(), Some("plain line"));
    }

    #[test]
    fn test_stopped_loop_does_not_touch_canvas() {
        let mut canvas = MemoryCanvas::new(40, 10);
        let mut spinners = SpinnerScheduler::new();
        spinners.stop();
        spinners.stop();
        spinners.tick_all(&mut canvas).unwrap();
        assert!(!spinners.is_running());
        assert_eq!(canvas.renders, 0);
    }
}
