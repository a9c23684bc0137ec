// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Push buttons, multi-click counting, and auto-repeat.
//!
//! # Buttons
//!
//! A [`Button`] watches a [`LogicInput`] (usually a [`Debounce`]) and turns
//! its level into edges. Each time it's updated:
//!
//! - If the input has just become active, the button becomes *pressed* and
//!   remembers when.
//! - If the input has just become inactive after a press, the button becomes
//!   *released* for exactly one update, and remembers how long it was held.
//!
//! So `is_released` is an event, not a level: it's true during the one pass
//! through the service table after the release, and consumers listed after
//! the button in the table get to see it.
//!
//! When the button service starts, it *locks*. A locked button ignores its
//! input until the input is seen inactive, at which point it unlocks. This
//! keeps a key that was held down at power-on (or when the service was
//! started) from registering as a press.
//!
//! [`Debounce`]: crate::filter::Debounce
//!
//! # Clicks
//!
//! [`Clicks`] counts releases that follow one another closely. Each release
//! within `timeout` ticks of the previous one adds one; once the button has
//! been left alone for `timeout`, the total is published through
//! [`Clicks::count`] for one pass and then cleared.
//!
//! # Repeat
//!
//! [`Repeat`] implements the usual "hold to scroll faster" behavior. It's
//! configured with a table of [`Threshold`]s, each saying "until the repeat
//! count reaches `until`, repeat every `interval` ticks." The last entry
//! (conventionally with `until` of zero) applies forever after.

use core::cell::Cell;

use cadence::event;
use cadence::service::{Context, Phase, Service};
use cadence::time::{Tick, TickCounter};

use crate::logic::{Logic, LogicInput};
use crate::tags;

/// Edge detection for a push button. See the module docs.
pub struct Button<'a> {
    input: &'a dyn LogicInput,
    active: Logic,
    locked: Cell<bool>,
    pressed: Cell<bool>,
    released: Cell<bool>,
    /// Time of the most recent press or release.
    stamp: Cell<Tick>,
    /// Length of the most recent completed press.
    held: Cell<u32>,
}

impl<'a> Button<'a> {
    /// Watches `input`, treating `active` as the pressed level.
    pub const fn new(input: &'a dyn LogicInput, active: Logic) -> Self {
        Self {
            input,
            active,
            locked: Cell::new(false),
            pressed: Cell::new(false),
            released: Cell::new(false),
            stamp: Cell::new(Tick::from_raw(0)),
            held: Cell::new(0),
        }
    }

    /// Samples the input and updates the button's state. This is the
    /// `Routine` body of the button service.
    pub fn update(&self, clock: &TickCounter) {
        let active = self.input.read() == self.active;

        if self.locked.get() {
            if active {
                return;
            }
            self.reset();
        }

        if active {
            if !self.pressed.get() {
                self.pressed.set(true);
                self.released.set(false);
                self.stamp.set(clock.now());
                event::emit(tags::BUTTON, tags::PRESSED);
            }
        } else if self.released.get() {
            self.reset();
        } else if self.pressed.get() {
            self.pressed.set(false);
            self.released.set(true);
            self.held.set(clock.elapsed(self.stamp.get()));
            self.stamp.set(clock.now());
            event::emit_with(tags::BUTTON, tags::RELEASED, Some(self.held.get()));
        }
    }

    /// Forgets any press, release, or lock.
    pub fn reset(&self) {
        self.locked.set(false);
        self.pressed.set(false);
        self.released.set(false);
        event::emit(tags::BUTTON, event::Kind::RESET);
    }

    /// Ignores the input until it's next seen inactive.
    pub fn lock(&self) {
        self.locked.set(true);
        event::emit(tags::BUTTON, tags::LOCK);
    }

    /// Lifts a lock immediately.
    pub fn unlock(&self) {
        self.locked.set(false);
        event::emit(tags::BUTTON, tags::UNLOCK);
    }

    /// Checks whether the button is locked.
    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// Checks whether the button is down.
    pub fn is_pressed(&self) -> bool {
        self.pressed.get()
    }

    /// Checks whether the button came up on the latest update.
    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    /// Checks whether the button is down and has been for at least `ticks`.
    pub fn hold_for(&self, clock: &TickCounter, ticks: u32) -> bool {
        self.pressed.get() && clock.is_up(self.stamp.get(), ticks)
    }

    /// Checks whether the button came up on the latest update after being
    /// held for at least `ticks`. Use this to tell long presses from short
    /// ones.
    pub fn released_after(&self, ticks: u32) -> bool {
        self.released.get() && self.held.get() >= ticks
    }

    /// Time of the most recent press (while pressed) or release.
    pub fn timestamp(&self) -> Tick {
        self.stamp.get()
    }
}

impl Service for Button<'_> {
    fn on_phase(&self, phase: Phase, cx: &Context<'_>) {
        match phase {
            Phase::Start => self.lock(),
            Phase::Routine => self.update(cx.clock()),
            _ => (),
        }
    }
}

impl core::fmt::Debug for Button<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Button")
            .field("active", &self.active)
            .field("locked", &self.locked.get())
            .field("pressed", &self.pressed.get())
            .field("released", &self.released.get())
            .field("stamp", &self.stamp.get())
            .field("held", &self.held.get())
            .finish_non_exhaustive()
    }
}

/// Multi-click counter. See the module docs.
#[derive(Debug)]
pub struct Clicks<'a> {
    button: &'a Button<'a>,
    timeout: u32,
    counting: Cell<bool>,
    counted: Cell<bool>,
    count: Cell<u32>,
}

impl<'a> Clicks<'a> {
    /// Counts clicks of `button` that come within `timeout` ticks of each
    /// other.
    pub const fn new(button: &'a Button<'a>, timeout: u32) -> Self {
        Self {
            button,
            timeout,
            counting: Cell::new(false),
            counted: Cell::new(false),
            count: Cell::new(0),
        }
    }

    /// Advances the counter. This is the `Routine` body of the service, and
    /// must run after the button has been updated in the same pass.
    pub fn update(&self, clock: &TickCounter) {
        if self.counted.get() {
            self.counted.set(false);
            self.counting.set(false);
            event::emit(tags::CLICKS, event::Kind::RESET);
        } else if self.button.is_released() {
            if self.counting.get() {
                self.count.set(self.count.get() + 1);
                event::emit_with(tags::CLICKS, event::Kind::COUNT, Some(self.count.get()));
            } else {
                self.counting.set(true);
                self.count.set(1);
                event::emit(tags::CLICKS, event::Kind::START);
            }
        } else if self.counting.get()
            && !self.button.is_pressed()
            && clock.is_up(self.button.timestamp(), self.timeout)
        {
            self.counted.set(true);
            event::emit_with(tags::CLICKS, event::Kind::DONE, Some(self.count.get()));
        }
    }

    /// The number of clicks in the sequence that just finished, or zero if
    /// one didn't just finish.
    pub fn count(&self) -> u32 {
        if self.counted.get() {
            self.count.get()
        } else {
            0
        }
    }

    /// Checks whether a sequence is in progress.
    pub fn is_counting(&self) -> bool {
        self.counting.get() && !self.counted.get()
    }
}

impl Service for Clicks<'_> {
    fn on_phase(&self, phase: Phase, cx: &Context<'_>) {
        if phase == Phase::Routine {
            self.update(cx.clock());
        }
    }
}

/// One step of a [`Repeat`] schedule.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Threshold {
    /// This entry applies while the repeat count is below `until`. Zero
    /// means "forever".
    pub until: u32,
    /// Ticks between repeats (or, for the first repeat, between the press
    /// and the repeat).
    pub interval: u32,
}

/// Accelerating key repeat. See the module docs.
///
/// Unlike the other types here, this isn't a service: call
/// [`try_count`](Self::try_count) from the code that consumes the repeats.
#[derive(Debug)]
pub struct Repeat<'a> {
    button: &'a Button<'a>,
    table: &'a [Threshold],
    count: Cell<u32>,
    last: Cell<Tick>,
}

impl<'a> Repeat<'a> {
    /// Repeats presses of `button` on the schedule in `table`. An empty table
    /// never repeats.
    pub const fn new(button: &'a Button<'a>, table: &'a [Threshold]) -> Self {
        Self {
            button,
            table,
            count: Cell::new(0),
            last: Cell::new(Tick::from_raw(0)),
        }
    }

    /// Checks whether a repeat is due. If so, counts it and returns the new
    /// repeat count; otherwise returns `None`.
    ///
    /// The count goes back to zero whenever this is called with the button
    /// up.
    pub fn try_count(&self, clock: &TickCounter) -> Option<u32> {
        if !self.button.is_pressed() {
            self.count.set(0);
            return None;
        }

        let count = self.count.get();
        let threshold = self
            .table
            .iter()
            .find(|t| t.until == 0 || count < t.until)
            .or(self.table.last())?;
        let since = if count == 0 {
            self.button.timestamp()
        } else {
            self.last.get()
        };

        if !clock.is_up(since, threshold.interval) {
            return None;
        }
        self.count.set(count + 1);
        self.last.set(clock.now());
        event::emit_with(tags::REPEAT, event::Kind::COUNT, Some(count + 1));
        Some(count + 1)
    }

    /// The number of repeats so far in the current press.
    pub fn count(&self) -> u32 {
        self.count.get()
    }
}
