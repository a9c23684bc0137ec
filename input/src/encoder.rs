// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Quadrature rotary encoders.
//!
//! This handles the common mechanical detent encoder, whose two contacts
//! both rest inactive between detents. Turning one click goes through
//! inactive/inactive, then one contact active, then both active. Which
//! contact closes first gives the direction; the count changes when both are
//! active, and only if the sequence started from rest. Partial turns that
//! back out, and bounces, are ignored.
//!
//! Contacts should be sampled much faster than they can change, so the
//! encoder service generally wants to be polled every pass of the main loop.

use core::cell::Cell;

use cadence::service::{Context, Phase, Service};

use crate::logic::{Logic, LogicInput};

/// A two-contact rotary encoder.
pub struct Encoder<'a> {
    cw: &'a dyn LogicInput,
    ccw: &'a dyn LogicInput,
    active: Logic,
    /// Both contacts seen at rest since the last count.
    rest: Cell<bool>,
    /// `ccw` seen closing alone, meaning clockwise rotation.
    turning_cw: Cell<bool>,
    /// `cw` seen closing alone, meaning counter-clockwise rotation.
    turning_ccw: Cell<bool>,
    value: Cell<i32>,
}

impl<'a> Encoder<'a> {
    /// Decodes the contacts `cw` and `ccw`, which read `active` when closed.
    pub const fn new(cw: &'a dyn LogicInput, ccw: &'a dyn LogicInput, active: Logic) -> Self {
        Self {
            cw,
            ccw,
            active,
            rest: Cell::new(false),
            turning_cw: Cell::new(false),
            turning_ccw: Cell::new(false),
            value: Cell::new(0),
        }
    }

    /// Samples both contacts once.
    pub fn update(&self) {
        let cw = self.cw.read() == self.active;
        let ccw = self.ccw.read() == self.active;

        match (cw, ccw) {
            (false, false) => self.rest.set(true),
            (true, false) => self.turning_ccw.set(true),
            (false, true) => self.turning_cw.set(true),
            (true, true) => {
                if self.rest.get() && self.turning_cw.get() {
                    self.value.set(self.value.get().wrapping_add(1));
                } else if self.rest.get() && self.turning_ccw.get() {
                    self.value.set(self.value.get().wrapping_sub(1));
                }
                self.rest.set(false);
                self.turning_cw.set(false);
                self.turning_ccw.set(false);
            }
        }
    }

    /// Returns the net number of clicks (positive for clockwise) since the
    /// last `read`, and resets it to zero.
    pub fn read(&self) -> i32 {
        self.value.replace(0)
    }

    /// Returns the net number of clicks since the last `read` without
    /// resetting it.
    pub fn peek(&self) -> i32 {
        self.value.get()
    }
}

impl Service for Encoder<'_> {
    fn on_phase(&self, phase: Phase, _cx: &Context<'_>) {
        if phase == Phase::Routine {
            self.update();
        }
    }
}

impl core::fmt::Debug for Encoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Encoder")
            .field("active", &self.active)
            .field("value", &self.value.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Knob {
        cw: Cell<Logic>,
        ccw: Cell<Logic>,
    }

    impl Knob {
        fn new() -> Self {
            Self {
                cw: Cell::new(Logic::High),
                ccw: Cell::new(Logic::High),
            }
        }

        /// Sets the contacts (`true` = closed) and samples.
        fn step(&self, enc: &Encoder<'_>, cw: bool, ccw: bool) {
            self.cw.set(Logic::from(!cw));
            self.ccw.set(Logic::from(!ccw));
            enc.update();
        }
    }

    #[test]
    fn test_clockwise_clicks() {
        let k = Knob::new();
        let e = Encoder::new(&k.cw, &k.ccw, Logic::Low);
        for _ in 0..3 {
            k.step(&e, false, false);
            k.step(&e, false, true);
            k.step(&e, true, true);
        }
        assert_eq!(e.peek(), 3);
        assert_eq!(e.read(), 3);
        assert_eq!(e.read(), 0);
    }

    #[test]
    fn test_counter_clockwise_clicks() {
        let k = Knob::new();
        let e = Encoder::new(&k.cw, &k.ccw, Logic::Low);
        for _ in 0..2 {
            k.step(&e, false, false);
            k.step(&e, true, false);
            k.step(&e, true, true);
        }
        assert_eq!(e.read(), -2);
    }

    #[test]
    fn test_needs_rest_first() {
        let k = Knob::new();
        let e = Encoder::new(&k.cw, &k.ccw, Logic::Low);
        // Both closed at boot, then a half turn back: no rest seen before the
        // first full closure.
        k.step(&e, true, true);
        k.step(&e, false, true);
        k.step(&e, true, true);
        assert_eq!(e.read(), 0);

        k.step(&e, false, false);
        k.step(&e, true, true);
        assert_eq!(e.read(), 0);
    }
}
