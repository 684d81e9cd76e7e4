//! Burst coalescing for live-stream notifications.
//!
//! A subprocess can print far faster than anyone can read. Rendering every
//! line of such a burst only causes flicker, so notifications that arrive
//! within one burst window of the last rendered live-stream notification are
//! deferred and collapsed into a single catch-up render at the end of the
//! window.
//!
//! The controller is a two-state machine:
//!
//! ```text
//!            deferred notification
//!   Idle  ───────────────────────────▶  Pending { deadline }
//!    ▲                                       │
//!    └──── any render (immediate or catch-up) ┘
//! ```
//!
//! Further deferrals while `Pending` keep the original deadline, so a burst
//! produces at most one trailing render per window and never zero.

use std::time::{Duration, Instant};

/// Result of feeding a notification to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    RenderNow,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThrottleState {
    #[default]
    Idle,
    Pending { deadline: Instant },
}

#[derive(Debug, Clone)]
pub struct ThrottleController {
    window: Duration,
    /// Also throttle notifications that are not from a live stream.
    throttle_structured: bool,
    last_intercept_at: Option<Instant>,
    state: ThrottleState,
}

impl ThrottleController {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            throttle_structured: false,
            last_intercept_at: None,
            state: ThrottleState::Idle,
        }
    }

    pub fn with_structured_throttling(mut self, enabled: bool) -> Self {
        self.throttle_structured = enabled;
        self
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ThrottleState::Pending { .. })
    }

    /// When the pending catch-up render is due, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            ThrottleState::Idle => None,
            ThrottleState::Pending { deadline } => Some(deadline),
        }
    }

    /// Decide whether a notification renders now or waits for the catch-up.
    ///
    /// `catch_up` marks the render fired by the pending deadline itself; it
    /// always renders.
    pub fn on_notification(&mut self, live_stream: bool, catch_up: bool, now: Instant) -> Decision {
        if catch_up || !(live_stream || self.throttle_structured) {
            return Decision::RenderNow;
        }

        let in_burst = self
            .last_intercept_at
            .is_some_and(|last| now.saturating_duration_since(last) < self.window);
        if in_burst {
            if self.state == ThrottleState::Idle {
                self.state = ThrottleState::Pending {
                    deadline: now + self.window,
                };
            }
            return Decision::Deferred;
        }

        self.last_intercept_at = Some(now);
        Decision::RenderNow
    }

    /// True once the pending deadline has passed.
    pub fn due(&self, now: Instant) -> bool {
        matches!(self.state, ThrottleState::Pending { deadline } if now >= deadline)
    }

    /// Record that a render happened, superseding any pending catch-up.
    ///
    /// A catch-up render opens a new burst window so the next notification of
    /// a continuing burst is deferred again.
    pub fn mark_rendered(&mut self, now: Instant, catch_up: bool) {
        self.state = ThrottleState::Idle;
        if catch_up {
            self.last_intercept_at = Some(now);
        }
    }
}
