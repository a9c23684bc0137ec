// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Advisory event reporting.
//!
//! Components in this crate (and in the companion crates) report interesting
//! transitions -- a service starting, a countdown firing, a state machine
//! changing state -- as [`Event`]s. By default nobody is listening and
//! reporting an event costs one atomic load and a branch.
//!
//! To listen, install a sink with [`set_sink`]. The sink is a plain function
//! called synchronously from wherever the event happened, which might be a
//! service callback; it must not try to call back into the scheduler. Events
//! are advisory: nothing about control flow depends on whether a sink is
//! installed.
//!
//! With the `defmt` feature enabled, every event is also logged at `trace`
//! level, whether or not a sink is installed.
//!
//! Components and event kinds are identified by interned string tags, so that
//! a sink can print them without a lookup table. Companion crates define
//! their own [`Component`] constants.

use core::ptr;

use portable_atomic::{AtomicPtr, Ordering};

use crate::time::{self, Tick};

/// Tag naming the thing that emitted an event.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Component(pub &'static str);

impl Component {
    /// The tick source.
    pub const TICK: Self = Self("Tick");
    /// Countdown timers.
    pub const COUNTDOWN: Self = Self("Countdown");
    /// The service scheduler.
    pub const SERVICE: Self = Self("Service");
    /// Stand-alone routines.
    pub const ROUTINE: Self = Self("Routine");
    /// State machines.
    pub const STATE_MACHINE: Self = Self("StateMachine");

    /// Returns the tag text.
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

/// Tag naming what happened.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Kind(pub &'static str);

impl Kind {
    /// Something started (a countdown was armed, a service started).
    pub const START: Self = Self("Start");
    /// Something was stopped by request.
    pub const STOP: Self = Self("Stop");
    /// Something ran to completion on its own.
    pub const DONE: Self = Self("Done");
    /// A state machine is about to change state.
    pub const CHANGE: Self = Self("Change");
    /// A state is being entered.
    pub const ENTER: Self = Self("Enter");
    /// A state is being left.
    pub const LEAVE: Self = Self("Leave");
    /// Something was reset to its initial condition.
    pub const RESET: Self = Self("Reset");
    /// Something counted.
    pub const COUNT: Self = Self("Count");
    /// A service was handed a phase. The argument is the service id.
    pub const DISPATCH: Self = Self("Dispatch");
    /// Something failed, but was handled locally.
    pub const ERROR: Self = Self("Error");

    /// Returns the tag text.
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

/// A single reported event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event {
    /// Who reported it.
    pub component: Component,
    /// What happened.
    pub kind: Kind,
    /// When, according to the process-wide tick counter.
    pub timestamp: Tick,
    /// Optional detail. For services this is the service id; for counters,
    /// the count.
    pub arg: Option<u32>,
}

/// Signature of an event sink.
pub type Sink = fn(&Event);

/// Current sink, stored as an erased function pointer. Null means no sink.
static SINK: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

/// Installs an event sink, replacing any previous one. Passing `None`
/// disables event delivery.
pub fn set_sink(sink: Option<Sink>) {
    let p = match sink {
        Some(f) => f as *mut (),
        None => ptr::null_mut(),
    };
    SINK.store(p, Ordering::Release);
}

/// Checks whether a sink is currently installed.
pub fn has_sink() -> bool {
    !SINK.load(Ordering::Relaxed).is_null()
}

/// Reports an event with no detail.
#[inline]
pub fn emit(component: Component, kind: Kind) {
    emit_with(component, kind, None)
}

/// Reports an event.
pub fn emit_with(component: Component, kind: Kind, arg: Option<u32>) {
    let p = SINK.load(Ordering::Acquire);

    #[cfg(feature = "defmt")]
    defmt::trace!("{=str} {=str} {}", component.0, kind.0, arg);

    if p.is_null() {
        return;
    }

    // Safety: the only non-null values ever stored in SINK come from casting
    // a `Sink` in `set_sink`, so transmuting it back yields the same function
    // pointer.
    let sink = unsafe { core::mem::transmute::<*mut (), Sink>(p) };
    sink(&Event {
        component,
        kind,
        timestamp: time::now(),
        arg,
    });
}

/// Test support: a sink that records events per thread, so that tests running
/// in parallel don't see each other's events.
#[cfg(test)]
pub(crate) mod capture {
    use std::cell::RefCell;
    use std::vec::Vec;

    use super::{Component, Event, Kind};

    std::thread_local! {
        static EVENTS: RefCell<Vec<Event>> = RefCell::new(Vec::new());
    }

    fn record(e: &Event) {
        EVENTS.with(|v| v.borrow_mut().push(*e));
    }

    /// Installs the recording sink and clears this thread's record.
    pub(crate) fn start() {
        super::set_sink(Some(record));
        EVENTS.with(|v| v.borrow_mut().clear());
    }

    /// Returns this thread's events from `component`, as (kind, arg) pairs.
    pub(crate) fn take(component: Component) -> Vec<(Kind, Option<u32>)> {
        EVENTS.with(|v| {
            v.borrow_mut()
                .drain(..)
                .filter(|e| e.component == component)
                .map(|e| (e.kind, e.arg))
                .collect()
        })
    }
}
