// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Double-tap interrupt handling.
//!
//! The first Ctrl-C cancels any in-flight work and shows a transient notice;
//! a second tap within the window terminates the process (exit 130 by
//! convention).  The decision logic is a plain value so it can be tested
//! without signals; `main` wires it to `tokio::signal::ctrl_c`.

use std::time::{Duration, Instant};

/// What a tap of Ctrl-C should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapAction {
    /// Cancel in-flight work and warn that another tap exits.
    CancelInFlight,
    /// Terminate the process.
    Exit,
}

#[derive(Debug)]
pub struct InterruptController {
    window: Duration,
    last_tap: Option<Instant>,
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl InterruptController {
    pub fn new(window: Duration) -> Self {
        Self { window, last_tap: None }
    }

    /// Record a tap at `now` and return what it should do.
    pub fn tap_at(&mut self, now: Instant) -> TapAction {
        let action = match self.last_tap {
            Some(prev) if now.duration_since(prev) <= self.window => TapAction::Exit,
            _ => TapAction::CancelInFlight,
        };
        self.last_tap = Some(now);
        action
    }

    pub fn tap(&mut self) -> TapAction {
        self.tap_at(Instant::now())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tap_cancels() {
        let mut c = InterruptController::default();
        assert_eq!(c.tap(), TapAction::CancelInFlight);
    }

    #[test]
    fn second_tap_within_window_exits() {
        let mut c = InterruptController::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert_eq!(c.tap_at(t0), TapAction::CancelInFlight);
        assert_eq!(c.tap_at(t0 + Duration::from_millis(500)), TapAction::Exit);
    }

    #[test]
    fn second_tap_after_window_cancels_again() {
        let mut c = InterruptController::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert_eq!(c.tap_at(t0), TapAction::CancelInFlight);
        assert_eq!(
            c.tap_at(t0 + Duration::from_secs(3)),
            TapAction::CancelInFlight,
            "a tap after the window starts a fresh double-tap sequence"
        );
    }

    #[test]
    fn third_tap_shortly_after_exit_still_exits() {
        let mut c = InterruptController::new(Duration::from_secs(2));
        let t0 = Instant::now();
        c.tap_at(t0);
        c.tap_at(t0 + Duration::from_millis(100));
        assert_eq!(c.tap_at(t0 + Duration::from_millis(200)), TapAction::Exit);
    }
}
