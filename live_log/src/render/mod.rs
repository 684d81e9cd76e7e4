//! Terminal rendering of the log graph.
//!
//! A graph change flows through the [`throttle::ThrottleController`], then
//! the [`snapshot::SnapshotBuilder`] lays out every visible entry, and the
//! [`diff::DiffWriter`] rewrites only the canvas rows that changed. Active
//! entries get a spinner animated in place by the
//! [`spinner::SpinnerScheduler`]. [`update_loop::TerminalUpdateLoop`] wires
//! these together.

pub mod canvas;
pub mod diff;
pub mod format;
pub mod keys;
pub mod snapshot;
pub mod spinner;
pub mod terminal;
pub mod throttle;
pub mod update_loop;

pub use canvas::{Canvas, MemoryCanvas};
pub use diff::DiffWriter;
pub use format::{EntryRenderer, PlainRenderer};
pub use keys::{KeyAction, KeyBinding, KeyDispatcher, TerminalSize};
pub use snapshot::{RenderRecord, Snapshot, SnapshotBuilder};
pub use spinner::{SpinnerScheduler, SpinnerSlot};
pub use terminal::{TerminalCanvas, TerminalSession};
pub use throttle::{Decision, ThrottleController, ThrottleState};
pub use update_loop::{RenderOutcome, TerminalUpdateLoop};
