// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-level logic signals.

use core::cell::Cell;
use core::ops::Not;

/// A digital level.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Logic {
    /// Low.
    #[default]
    Low,
    /// High.
    High,
}

impl Logic {
    /// Checks for `High`.
    pub fn is_high(self) -> bool {
        self == Logic::High
    }

    /// Checks for `Low`.
    pub fn is_low(self) -> bool {
        self == Logic::Low
    }
}

impl Not for Logic {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Logic::Low => Logic::High,
            Logic::High => Logic::Low,
        }
    }
}

impl From<bool> for Logic {
    fn from(high: bool) -> Self {
        if high {
            Logic::High
        } else {
            Logic::Low
        }
    }
}

/// Something that can be sampled for a logic level: a GPIO input, a filter,
/// a bit in a shift register.
///
/// Implementations are polled from the main loop and should return quickly.
pub trait LogicInput {
    /// Samples the current level.
    fn read(&self) -> Logic;
}

/// Something that can be driven to a logic level.
pub trait LogicOutput {
    /// Drives the given level.
    fn write(&self, level: Logic);
}

/// A plain cell is both an input and an output, which is handy for levels
/// computed in software (and for tests).
impl LogicInput for Cell<Logic> {
    fn read(&self) -> Logic {
        self.get()
    }
}

impl LogicOutput for Cell<Logic> {
    fn write(&self, level: Logic) {
        self.set(level)
    }
}

impl<T: LogicInput + ?Sized> LogicInput for &T {
    fn read(&self) -> Logic {
        (**self).read()
    }
}
