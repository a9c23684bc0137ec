// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Explicit finite state machines with enter/run/leave hooks.
//!
//! A [`StateMachine`] holds a current [`State`] and a payload of type `T`.
//! Each state is a plain function that is called with a [`Phase`]:
//!
//! - `Enter` when the machine switches into it,
//! - `Run` every time [`StateMachine::run`] is called while it is current,
//! - `Leave` when the machine switches away from it.
//!
//! During `Enter` and `Leave`, the state function also gets a [`Change`]
//! saying where the machine is coming from and where it's going. During `Run`
//! both halves of the `Change` are `None`.
//!
//! A state requests a transition by returning `Some(next)` from its `Run`
//! phase. The transition is carried out by `run` once the state function has
//! returned, so a state never sees its own `Leave` while it's still running.
//! Whatever a state returns from `Enter` or `Leave` is ignored.
//!
//! States are compared by function address, so switching to the state you're
//! already in does nothing -- no `Leave`, no `Enter`.
//!
//! The `Run` body of a state can itself drive a
//! [`Coroutine`][crate::coroutine::Coroutine] kept in the payload, which is a
//! convenient way to write a state that does something multi-step.

use core::fmt;

use crate::event::{self, Component, Kind};

/// Why a state function is being called.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// The machine is switching into this state.
    Enter,
    /// The machine is being run in this state.
    Run,
    /// The machine is switching out of this state.
    Leave,
}

/// A state, represented by its function.
pub struct State<T>(pub fn(Phase, Change<T>, &mut T) -> Option<State<T>>);

impl<T> State<T> {
    /// Wraps a state function.
    pub const fn new(f: fn(Phase, Change<T>, &mut T) -> Option<State<T>>) -> Self {
        Self(f)
    }

    fn call(self, phase: Phase, change: Change<T>, payload: &mut T) -> Option<State<T>> {
        (self.0)(phase, change, payload)
    }

    fn addr(self) -> usize {
        self.0 as usize
    }
}

impl<T> Copy for State<T> {}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for State<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<T> Eq for State<T> {}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State({:#x})", self.addr())
    }
}

/// The transition in progress, as seen by the states involved.
pub struct Change<T> {
    /// The state being left, if any.
    pub prev: Option<State<T>>,
    /// The state being entered, if any.
    pub next: Option<State<T>>,
}

impl<T> Change<T> {
    /// The empty change passed along with [`Phase::Run`].
    pub const NONE: Self = Self {
        prev: None,
        next: None,
    };
}

impl<T> Copy for Change<T> {}

impl<T> Clone for Change<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> fmt::Debug for Change<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Change")
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// A current state plus the data the states operate on.
#[derive(Debug)]
pub struct StateMachine<T> {
    state: Option<State<T>>,
    payload: T,
}

impl<T> StateMachine<T> {
    /// Creates a machine in `initial` with the given payload.
    ///
    /// The initial state does *not* receive `Enter`. If you want it to, start
    /// from `None` and use [`change_state`](Self::change_state).
    pub const fn new(initial: Option<State<T>>, payload: T) -> Self {
        Self {
            state: initial,
            payload,
        }
    }

    /// The current state.
    pub fn state(&self) -> Option<State<T>> {
        self.state
    }

    /// Checks whether the machine is currently in `state`.
    pub fn is_in(&self, state: State<T>) -> bool {
        self.state == Some(state)
    }

    /// Borrows the payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Borrows the payload mutably.
    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    /// Switches to `next`.
    ///
    /// If `next` is the current state, this does nothing and returns `false`.
    /// Otherwise the current state (if any) gets `Leave`, then `next` (if
    /// any) gets `Enter`, and only then does `next` become current. Returns
    /// `true`.
    pub fn change_state(&mut self, next: Option<State<T>>) -> bool {
        if next == self.state {
            return false;
        }
        let change = Change {
            prev: self.state,
            next,
        };
        event::emit(Component::STATE_MACHINE, Kind::CHANGE);

        if let Some(old) = self.state {
            event::emit(Component::STATE_MACHINE, Kind::LEAVE);
            old.call(Phase::Leave, change, &mut self.payload);
        }
        if let Some(new) = next {
            event::emit(Component::STATE_MACHINE, Kind::ENTER);
            new.call(Phase::Enter, change, &mut self.payload);
        }

        self.state = next;
        true
    }

    /// Runs the current state, if there is one, and carries out the
    /// transition it asks for. Returns `false` if there was no current state.
    pub fn run(&mut self) -> bool {
        let Some(state) = self.state else {
            return false;
        };
        if let Some(next) = state.call(Phase::Run, Change::NONE, &mut self.payload) {
            self.change_state(Some(next));
        }
        true
    }
}
