// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coroutines you can switch on and off, without a scheduler.
//!
//! A [`Routine`] wraps a coroutine [`Body`] with two flags: *enabled*
//! (controlled by [`start`] and [`stop`]) and *running* (controlled by
//! [`pause`] and [`resume`]). [`run`] advances the body only when both are
//! set. This is handy for sequences that are kicked off by some other piece of
//! code -- a service that starts an animation in response to a button, say --
//! and that the owner drives from its own callback.
//!
//! Starting a routine always begins its body from the top, even if it was
//! stopped halfway through. Pausing and resuming do not move the resume
//! point.
//!
//! [`start`]: Routine::start
//! [`stop`]: Routine::stop
//! [`pause`]: Routine::pause
//! [`resume`]: Routine::resume
//! [`run`]: Routine::run

use crate::coroutine::{Coroutine, Step};
use crate::event::{self, Component, Kind};
use crate::time::TickCounter;

/// The code of a [`Routine`].
///
/// `step` is called with the resume point and behaves exactly like the body
/// closure given to [`Coroutine::run`]. State that must survive a suspension
/// belongs in `self`.
pub trait Body {
    /// The resume point type.
    type Step: Copy;

    /// Called from [`Routine::start`], before the first step. The default
    /// does nothing.
    fn on_start(&mut self) {}

    /// Runs one arm of the body.
    fn step(&mut self, at: Option<Self::Step>) -> Step<Self::Step>;
}

/// A [`Body`] plus its resume state and enable flags.
pub struct Routine<B: Body> {
    body: B,
    co: Coroutine<B::Step>,
    enabled: bool,
    running: bool,
}

impl<B: Body> Routine<B> {
    /// Wraps `body` in a routine that is initially stopped.
    pub const fn new(body: B) -> Self {
        Self {
            body,
            co: Coroutine::new(),
            enabled: false,
            running: false,
        }
    }

    /// Enables the routine and rewinds it to the top. Returns `false` if it
    /// was already enabled, in which case nothing happens.
    pub fn start(&mut self) -> bool {
        if self.enabled {
            return false;
        }
        self.enabled = true;
        self.running = true;
        self.co.restart();
        self.body.on_start();
        event::emit(Component::ROUTINE, Kind::START);
        true
    }

    /// Disables the routine. Returns `false` if it wasn't enabled.
    pub fn stop(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        self.enabled = false;
        self.running = false;
        event::emit(Component::ROUTINE, Kind::STOP);
        true
    }

    /// Suspends an enabled routine in place. Returns `false` if it wasn't
    /// running.
    pub fn pause(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        true
    }

    /// Continues a paused routine from where it was. Returns `false` if the
    /// routine is stopped or isn't paused.
    pub fn resume(&mut self) -> bool {
        if !self.enabled || self.running {
            return false;
        }
        self.running = true;
        true
    }

    /// Advances the body if the routine is enabled and not paused. Returns
    /// whether the body was given a chance to run (a sleeping body counts).
    pub fn run(&mut self, clock: &TickCounter) -> bool {
        if !(self.enabled && self.running) {
            return false;
        }
        let body = &mut self.body;
        self.co.run(clock, |at| body.step(at));
        true
    }

    /// Checks whether the routine has been started and not stopped.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Checks whether the routine would run right now.
    pub fn is_running(&self) -> bool {
        self.enabled && self.running
    }

    /// Borrows the body.
    pub fn body(&self) -> &B {
        &self.body
    }

    /// Borrows the body mutably.
    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }
}

impl<B> core::fmt::Debug for Routine<B>
where
    B: Body + core::fmt::Debug,
    B::Step: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Routine")
            .field("body", &self.body)
            .field("co", &self.co)
            .field("enabled", &self.enabled)
            .field("running", &self.running)
            .finish()
    }
}
