// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stackless coroutines by explicit resume point.
//!
//! A service callback returns completely every time it gives up the CPU, so
//! it can't keep anything on the stack between one invocation and the next.
//! To still write "do A, wait a bit, do B, wait for X, do C" as one piece of
//! code, we store *where we were* in a [`Coroutine`] and jump back there on
//! the next call.
//!
//! The "where we were" is a value of a step type `S` that you define --
//! usually a small fieldless `enum` naming the points after each suspension.
//! The body of the coroutine is a closure that receives the stored resume
//! point (`None` meaning "from the top") and `match`es on it. Each arm does
//! some work and then says what happens next by returning a [`Step`]:
//!
//! - [`Step::Next`] continues immediately into another arm, without
//!   returning to the caller. This is the equivalent of simply falling
//!   through to the code after a label.
//! - [`Step::Yield`] records the resume point and returns to the caller. The
//!   next [`run`][Coroutine::run] will enter the body at that point.
//! - [`Step::Sleep`] does the same, and additionally records the time. Later
//!   calls to `run` return [`Resume::Blocked`] without entering the body at
//!   all until the requested number of ticks has passed.
//! - [`Step::Restart`] clears the resume point, so the next `run` starts from
//!   the top.
//!
//! ```ignore
//! #[derive(Copy, Clone)]
//! enum Handshake { Sent, Acked }
//!
//! self.co.run(clock, |at| match at {
//!     None => {
//!         bus.send_hello();
//!         Step::Sleep(Handshake::Sent, 10)
//!     }
//!     Some(Handshake::Sent) => {
//!         if !bus.ack_pending() {
//!             return Step::Yield(Handshake::Sent);
//!         }
//!         Step::Next(Handshake::Acked)
//!     }
//!     Some(Handshake::Acked) => {
//!         self.retries.set(0);
//!         Step::Restart
//!     }
//! });
//! ```
//!
//! # The one rule
//!
//! Local variables do not survive a `Yield` or `Sleep`. Anything the body
//! needs on the far side of a suspension point must be stored somewhere that
//! outlives the call -- in practice, next to the `Coroutine` in your service
//! state. The closure captures that state by reference, so this is usually
//! natural, but it's worth keeping in mind when porting code that was written
//! for a thread.
//!
//! # Cancellation
//!
//! There's no way to abort a suspended coroutine from the middle. What you
//! can do is [`restart`][Coroutine::restart] it, which takes effect the next
//! time it runs. A pending sleep is discarded by `restart`.

use crate::time::{Tick, TickCounter};

/// What a coroutine body wants to happen after the arm that just ran.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step<S> {
    /// Continue at the given point without returning.
    Next(S),
    /// Suspend, and resume at the given point on the next run.
    Yield(S),
    /// Suspend for at least the given number of ticks, then resume at the
    /// given point. Always suspends at least once, even for zero ticks.
    Sleep(S, u32),
    /// Suspend, and start from the top on the next run.
    Restart,
}

/// Result of one [`Coroutine::run`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resume {
    /// The coroutine is sleeping and the body was not entered.
    Blocked,
    /// The body ran and suspended with a resume point (`Yield` or `Sleep`).
    Suspended,
    /// The body ran and asked to start over next time.
    Restarted,
}

/// Resume state for a stackless coroutine with resume points of type `S`.
///
/// This is small and `Copy` when `S` is, so it's happy living in a `Cell`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Coroutine<S> {
    /// Where to resume; `None` is the top.
    cursor: Option<S>,
    /// When the pending sleep started. Meaningless if `sleep` is `None`.
    slept_at: Tick,
    /// Length of the pending sleep, if any.
    sleep: Option<u32>,
}

impl<S> Coroutine<S> {
    /// Creates a coroutine that will start from the top.
    pub const fn new() -> Self {
        Self {
            cursor: None,
            slept_at: Tick::from_raw(0),
            sleep: None,
        }
    }

    /// Checks whether the coroutine has a pending sleep.
    pub fn is_sleeping(&self) -> bool {
        self.sleep.is_some()
    }

    /// Clears the resume point (and any pending sleep), so that the next run
    /// starts from the top.
    pub fn restart(&mut self) {
        self.cursor = None;
        self.sleep = None;
    }
}

impl<S: Copy> Coroutine<S> {
    /// Returns the stored resume point, or `None` if the next run starts from
    /// the top.
    pub fn cursor(&self) -> Option<S> {
        self.cursor
    }

    /// Enters `body` at the stored resume point and keeps running it until it
    /// suspends.
    ///
    /// If a sleep is pending and hasn't elapsed on `clock`, returns
    /// [`Resume::Blocked`] without calling `body`; the resume point stays put
    /// and the sleep will be rechecked next time.
    ///
    /// `body` is called once per arm. It's fine for it to be called several
    /// times in one `run` if arms chain together with [`Step::Next`]; it's up
    /// to you to make sure such chains end.
    pub fn run(
        &mut self,
        clock: &TickCounter,
        mut body: impl FnMut(Option<S>) -> Step<S>,
    ) -> Resume {
        if let Some(ticks) = self.sleep {
            if !clock.is_up(self.slept_at, ticks) {
                return Resume::Blocked;
            }
            self.sleep = None;
        }

        let mut at = self.cursor;
        loop {
            match body(at) {
                Step::Next(s) => at = Some(s),
                Step::Yield(s) => {
                    self.cursor = Some(s);
                    return Resume::Suspended;
                }
                Step::Sleep(s, ticks) => {
                    self.cursor = Some(s);
                    self.slept_at = clock.now();
                    self.sleep = Some(ticks);
                    return Resume::Suspended;
                }
                Step::Restart => {
                    self.cursor = None;
                    return Resume::Restarted;
                }
            }
        }
    }
}

impl<S> Default for Coroutine<S> {
    fn default() -> Self {
        Self::new()
    }
}
