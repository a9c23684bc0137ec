// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-shot tick timers.
//!
//! A [`Countdown`] is a timestamp plus an "armed" flag. You arm it with
//! [`recount`][Countdown::recount], and then poll
//! [`is_up`][Countdown::is_up] with the interval you care about. The first
//! poll at or after the deadline returns `true` and disarms the countdown, so
//! it fires exactly once per `recount`.
//!
//! [`stop`][Countdown::stop] disarms without firing. That's the difference
//! between a countdown that was cancelled and one that completed: a stopped
//! countdown never reports `true`.
//!
//! Countdowns are plain values. Keep them wherever the rest of your state
//! lives -- on the stack if you don't need them across a suspension point, in
//! a service's state if you do.

use crate::event::{self, Component, Kind};
use crate::time::{Tick, TickCounter};

/// A reusable one-shot timer. See the module docs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Countdown {
    timestamp: Tick,
    counting: bool,
}

impl Countdown {
    /// Creates a countdown that is not counting.
    pub const fn new() -> Self {
        Self {
            timestamp: Tick::from_raw(0),
            counting: false,
        }
    }

    /// Arms the countdown, starting from the current time on `clock`. Calling
    /// this on a countdown that is already counting restarts it.
    pub fn recount(&mut self, clock: &TickCounter) {
        self.timestamp = clock.now();
        self.counting = true;
        event::emit(Component::COUNTDOWN, Kind::START);
    }

    /// Checks whether `ticks` have elapsed since the last `recount`.
    ///
    /// Returns `true` at most once per `recount`: when it does, the countdown
    /// is disarmed. Returns `false` if the countdown isn't counting, or hasn't
    /// expired yet; neither of those changes its state.
    pub fn is_up(&mut self, clock: &TickCounter, ticks: u32) -> bool {
        if !self.counting || !clock.is_up(self.timestamp, ticks) {
            return false;
        }
        event::emit(Component::COUNTDOWN, Kind::DONE);
        self.counting = false;
        true
    }

    /// Disarms the countdown without firing it.
    pub fn stop(&mut self) {
        self.counting = false;
        event::emit(Component::COUNTDOWN, Kind::STOP);
    }

    /// Checks whether the countdown is armed.
    pub fn is_counting(&self) -> bool {
        self.counting
    }
}
