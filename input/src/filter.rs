// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debouncing.
//!
//! A [`Debounce`] sits between a raw input and whatever reads it. It reports
//! an *accepted* level, which changes only after the raw input has disagreed
//! with it continuously for a threshold number of ticks. Separate thresholds
//! apply to rising and falling changes, since mechanical contacts often
//! bounce much more on one edge than the other.
//!
//! Any sample that agrees with the accepted level restarts the window, so a
//! glitch shorter than the threshold never gets through, however often it
//! repeats.

use core::cell::Cell;

use cadence::service::{Context, Phase, Service};
use cadence::time::{Tick, TickCounter};

use crate::logic::{Logic, LogicInput};

/// A debounced view of another [`LogicInput`].
pub struct Debounce<'a> {
    raw: &'a dyn LogicInput,
    rising: u32,
    falling: u32,
    level: Cell<Logic>,
    stamp: Cell<Tick>,
}

impl<'a> Debounce<'a> {
    /// Filters `raw`, requiring a change to `High` to persist for `rising`
    /// ticks and a change to `Low` to persist for `falling` ticks.
    ///
    /// The accepted level starts out `Low`.
    pub const fn new(raw: &'a dyn LogicInput, rising: u32, falling: u32) -> Self {
        Self {
            raw,
            rising,
            falling,
            level: Cell::new(Logic::Low),
            stamp: Cell::new(Tick::from_raw(0)),
        }
    }

    /// Samples the raw input once and updates the accepted level.
    pub fn scan(&self, clock: &TickCounter) {
        let cur = self.raw.read();
        if cur == self.level.get() {
            self.stamp.set(clock.now());
            return;
        }

        let threshold = match cur {
            Logic::High => self.rising,
            Logic::Low => self.falling,
        };
        if clock.is_up(self.stamp.get(), threshold) {
            self.level.set(cur);
            self.stamp.set(clock.now());
        }
    }

    /// Forces the accepted level, e.g. to match the raw input at boot.
    pub fn preset(&self, level: Logic, clock: &TickCounter) {
        self.level.set(level);
        self.stamp.set(clock.now());
    }
}

impl LogicInput for Debounce<'_> {
    fn read(&self) -> Logic {
        self.level.get()
    }
}

impl Service for Debounce<'_> {
    fn on_phase(&self, phase: Phase, cx: &Context<'_>) {
        if phase == Phase::Routine {
            self.scan(cx.clock());
        }
    }
}

impl core::fmt::Debug for Debounce<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Debounce")
            .field("rising", &self.rising)
            .field("falling", &self.falling)
            .field("level", &self.level.get())
            .finish_non_exhaustive()
    }
}

/// Scans a group of filters, for applications that would rather drive them
/// from one place than list each in the service table.
pub fn scan_all(filters: &[&Debounce<'_>], clock: &TickCounter) {
    for f in filters {
        f.scan(clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::hold;

    #[test]
    fn test_change_needs_threshold() {
        let clock = TickCounter::new();
        let raw = Cell::new(Logic::Low);
        let f = Debounce::new(&raw, 3, 5);
        f.scan(&clock);

        raw.set(Logic::High);
        f.scan(&clock);
        assert_eq!(f.read(), Logic::Low);

        hold(&clock, &raw, Logic::High, 2, || f.scan(&clock));
        assert_eq!(f.read(), Logic::Low);
        hold(&clock, &raw, Logic::High, 1, || f.scan(&clock));
        assert_eq!(f.read(), Logic::High);

        // Falling side uses its own threshold.
        hold(&clock, &raw, Logic::Low, 4, || f.scan(&clock));
        assert_eq!(f.read(), Logic::High);
        hold(&clock, &raw, Logic::Low, 1, || f.scan(&clock));
        assert_eq!(f.read(), Logic::Low);
    }

    #[test]
    fn test_glitches_restart_window() {
        let clock = TickCounter::new();
        let raw = Cell::new(Logic::Low);
        let f = Debounce::new(&raw, 3, 3);
        f.scan(&clock);

        for _ in 0..10 {
            hold(&clock, &raw, Logic::High, 2, || f.scan(&clock));
            hold(&clock, &raw, Logic::Low, 1, || f.scan(&clock));
        }
        assert_eq!(f.read(), Logic::Low);
    }

    #[test]
    fn test_scan_all_and_preset() {
        let clock = TickCounter::new();
        let a_raw = Cell::new(Logic::High);
        let b_raw = Cell::new(Logic::High);
        let a = Debounce::new(&a_raw, 1, 1);
        let b = Debounce::new(&b_raw, 1, 1);
        b.preset(Logic::High, &clock);

        scan_all(&[&a, &b], &clock);
        clock.increment();
        scan_all(&[&a, &b], &clock);
        assert_eq!(a.read(), Logic::High);
        assert_eq!(b.read(), Logic::High);
    }
}
