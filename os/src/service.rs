// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The service table and the dispatcher that walks it.
//!
//! # Services
//!
//! A *service* is a statically declared unit of recurring work: something
//! that implements [`Service`]. The scheduler calls
//! [`Service::on_phase`] once per *phase* -- the reason it's being called --
//! and the service does whatever it does and returns. Services that need to
//! spread work across several calls keep a
//! [`Coroutine`][crate::coroutine::Coroutine] in their state.
//!
//! `on_phase` takes `&self`. Services keep their mutable state in `Cell` or
//! `RefCell`, which lets them hold shared references to one another: a click
//! counter can refer to the button it watches while both are in the table.
//! Since everything runs on one thread, in order, this needs no locking.
//!
//! # The table
//!
//! Each service is listed in a [`Descriptor`], which pairs it with a small
//! integer id and two configuration switches:
//!
//! - `tick_enable` opts the service in to the [`Phase::Tick`] phase. Ticks
//!   happen much more often than anything else, so services don't get them
//!   unless they ask.
//! - `default_start` makes the service start itself the first time the
//!   [`Phase::Routine`] phase reaches it.
//!
//! The table is just a slice of descriptors, typically a `static mut` or a
//! local array in `main`:
//!
//! ```ignore
//! let mut table = [
//!     Descriptor::new(0, &keys).default_start(),
//!     Descriptor::new(1, &beeper).tick_enable(),
//!     Descriptor::new(2, &shell).default_start(),
//! ];
//! let mut sched = Scheduler::new(&mut table, &SYSTEM_TICKS);
//! sched.run_forever(|| cortex_m::asm::wfi());
//! ```
//!
//! The set of services is fixed once the `Scheduler` exists. Ids must be
//! unique; this is checked when the scheduler is created.
//!
//! # Dispatch
//!
//! [`Scheduler::run`] calls every service in table order, one after another,
//! with no interleaving. The only filtering it does is:
//!
//! - For `Tick`, services without `tick_enable` are skipped.
//! - For `Routine`, a `default_start` service that hasn't been auto-started
//!   yet is started (receiving [`Phase::Start`]) just before its first
//!   `Routine` call.
//!
//! In particular, the scheduler does *not* skip stopped services. Whether a
//! stopped service should do anything is up to the service, which can check
//! [`Context::is_started`].
//!
//! [`Scheduler::start`] and [`Scheduler::stop`] move a service between its
//! stopped and started states, delivering `Start` or `Stop`. Both are
//! idempotent: starting a started service, or stopping a stopped one, does
//! nothing at all.

use core::fmt;

use crate::event::{self, Component, Kind};
use crate::time::{Tick, TickCounter};

/// Reason a service is being called.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// The service is being started.
    Start,
    /// The service is being stopped.
    Stop,
    /// A timer tick has elapsed. Only delivered to services with
    /// `tick_enable`.
    Tick,
    /// Once per pass through the main loop.
    Routine,
    /// Application-defined phase, broadcast with [`Scheduler::run`].
    User(u8),
}

/// Something that can be listed in the service table.
pub trait Service {
    /// Handles one phase. See the module docs for when each phase arrives.
    fn on_phase(&self, phase: Phase, cx: &Context<'_>);
}

/// Information handed to a service along with each phase.
#[derive(Copy, Clone, Debug)]
pub struct Context<'a> {
    id: u8,
    started: bool,
    clock: &'a TickCounter,
}

impl<'a> Context<'a> {
    /// The id of the service being called.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Checks whether the service being called is started. During
    /// [`Phase::Start`] this is still `false`; during [`Phase::Stop`] it's
    /// still `true`.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The tick counter the scheduler is driven from.
    pub fn clock(&self) -> &'a TickCounter {
        self.clock
    }

    /// Shorthand for `self.clock().now()`.
    pub fn now(&self) -> Tick {
        self.clock.now()
    }
}

/// Static scheduling switches for a service.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Deliver [`Phase::Tick`] to this service.
    pub tick_enable: bool,
    /// Start this service on its first [`Phase::Routine`].
    pub default_start: bool,
}

/// Dynamic state the scheduler keeps for each service.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    /// The `default_start` auto-start has happened.
    pub default_start_triggered: bool,
    /// The service is started.
    pub started: bool,
}

/// An entry in the service table.
pub struct Descriptor<'a> {
    service: &'a dyn Service,
    id: u8,
    config: Config,
    status: Status,
}

impl<'a> Descriptor<'a> {
    /// Lists `service` under `id`, with both switches off.
    pub const fn new(id: u8, service: &'a dyn Service) -> Self {
        Self {
            service,
            id,
            config: Config {
                tick_enable: false,
                default_start: false,
            },
            status: Status {
                default_start_triggered: false,
                started: false,
            },
        }
    }

    /// Turns on `tick_enable`.
    pub const fn tick_enable(mut self) -> Self {
        self.config.tick_enable = true;
        self
    }

    /// Turns on `default_start`.
    pub const fn default_start(mut self) -> Self {
        self.config.default_start = true;
        self
    }

    /// The service's id.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// The service's switches.
    pub fn config(&self) -> Config {
        self.config
    }

    /// Changes the service's switches. Turning `default_start` on after the
    /// scheduler has already been through a `Routine` pass still works, as
    /// long as the auto-start hasn't happened.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// The scheduler's bookkeeping for this service.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Checks whether the service is started.
    pub fn is_started(&self) -> bool {
        self.status.started
    }

    /// The service itself.
    pub fn service(&self) -> &'a dyn Service {
        self.service
    }
}

impl fmt::Debug for Descriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// The dispatcher. Owns (a borrow of) the service table for as long as it
/// exists.
#[derive(Debug)]
pub struct Scheduler<'t, 'a> {
    table: &'t mut [Descriptor<'a>],
    clock: &'t TickCounter,
    /// Tick up to which `Tick` phases have been delivered by `poll`.
    last_tick: Tick,
}

impl<'t, 'a> Scheduler<'t, 'a> {
    /// Takes charge of `table`, driven by `clock`.
    ///
    /// # Panics
    ///
    /// If two descriptors share an id.
    pub fn new(table: &'t mut [Descriptor<'a>], clock: &'t TickCounter) -> Self {
        for (i, d) in table.iter().enumerate() {
            for other in &table[i + 1..] {
                cheap_assert!(d.id != other.id);
            }
        }
        Self {
            table,
            clock,
            last_tick: clock.now(),
        }
    }

    /// Number of services in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Checks whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The tick counter this scheduler is driven from.
    pub fn clock(&self) -> &'t TickCounter {
        self.clock
    }

    /// Finds the table index of the service with `id`.
    pub fn find(&self, id: u8) -> Option<usize> {
        self.table.iter().position(|d| d.id == id)
    }

    /// Borrows the descriptor at `index`.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn descriptor(&self, index: usize) -> &Descriptor<'a> {
        &self.table[index]
    }

    /// Borrows the descriptor at `index` mutably.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn descriptor_mut(&mut self, index: usize) -> &mut Descriptor<'a> {
        &mut self.table[index]
    }

    /// Starts the service at `index`, delivering [`Phase::Start`]. Returns
    /// `false` and does nothing if it was already started.
    ///
    /// An explicit start does not use up the service's auto-start, but the
    /// auto-start won't do anything while the service is already started.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn start(&mut self, index: usize) -> bool {
        if self.table[index].status.started {
            return false;
        }
        self.invoke(index, Phase::Start);
        self.table[index].status.started = true;
        event::emit_with(
            Component::SERVICE,
            Kind::START,
            Some(u32::from(self.table[index].id)),
        );
        true
    }

    /// Stops the service at `index`, delivering [`Phase::Stop`]. Returns
    /// `false` and does nothing if it wasn't started.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn stop(&mut self, index: usize) -> bool {
        if !self.table[index].status.started {
            return false;
        }
        self.invoke(index, Phase::Stop);
        self.table[index].status.started = false;
        event::emit_with(
            Component::SERVICE,
            Kind::STOP,
            Some(u32::from(self.table[index].id)),
        );
        true
    }

    /// Delivers `phase` to every service in table order, with the filtering
    /// described in the module docs.
    ///
    /// Passing `Start` or `Stop` here broadcasts them without touching the
    /// started flags; use [`start`](Self::start) and [`stop`](Self::stop) to
    /// change a service's state.
    pub fn run(&mut self, phase: Phase) {
        for i in 0..self.table.len() {
            let Descriptor { config, status, .. } = self.table[i];
            match phase {
                Phase::Tick if !config.tick_enable => continue,
                Phase::Routine
                    if config.default_start && !status.default_start_triggered =>
                {
                    self.table[i].status.default_start_triggered = true;
                    self.start(i);
                }
                _ => (),
            }
            self.invoke(i, phase);
        }
    }

    /// Delivers one [`Phase::Tick`] for every tick that has elapsed on the
    /// clock since the last `poll`, and then one [`Phase::Routine`].
    ///
    /// This is the main-loop way of getting tick-driven behavior without
    /// running services from the timer interrupt.
    pub fn poll(&mut self) {
        let now = self.clock.now();
        while self.last_tick != now {
            self.last_tick = self.last_tick.wrapping_add(1);
            self.run(Phase::Tick);
        }
        self.run(Phase::Routine);
    }

    /// Runs the scheduler forever, calling `idle_hook` after every
    /// [`poll`](Self::poll). A typical idle hook waits for an interrupt.
    pub fn run_forever(mut self, mut idle_hook: impl FnMut()) -> ! {
        loop {
            self.poll();
            idle_hook();
        }
    }

    fn invoke(&self, index: usize, phase: Phase) {
        let d = &self.table[index];
        let cx = Context {
            id: d.id,
            started: d.status.started,
            clock: self.clock,
        };
        event::emit_with(Component::SERVICE, Kind::DISPATCH, Some(u32::from(d.id)));
        d.service.on_phase(phase, &cx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::{Coroutine, Step};
    use crate::event::capture;

    use std::cell::{Cell, RefCell};
    use std::vec::Vec;

    type Log = RefCell<Vec<(u8, Phase)>>;

    /// Service that records every call in a shared log.
    struct Recorder<'a> {
        log: &'a Log,
    }

    impl Service for Recorder<'_> {
        fn on_phase(&self, phase: Phase, cx: &Context<'_>) {
            self.log.borrow_mut().push((cx.id(), phase));
        }
    }

    /// Service that counts each kind of phase.
    #[derive(Default)]
    struct Counter {
        starts: Cell<u32>,
        stops: Cell<u32>,
        ticks: Cell<u32>,
        routines: Cell<u32>,
        started_routines: Cell<u32>,
    }

    impl Service for Counter {
        fn on_phase(&self, phase: Phase, cx: &Context<'_>) {
            let c = match phase {
                Phase::Start => &self.starts,
                Phase::Stop => &self.stops,
                Phase::Tick => &self.ticks,
                Phase::Routine => {
                    if cx.is_started() {
                        self.started_routines
                            .set(self.started_routines.get() + 1);
                    }
                    &self.routines
                }
                Phase::User(_) => return,
            };
            c.set(c.get() + 1);
        }
    }

    #[test]
    fn test_auto_start_fires_once() {
        let clock = TickCounter::new();
        let svc = Counter::default();
        let mut table = [Descriptor::new(1, &svc).default_start().tick_enable()];
        let mut sched = Scheduler::new(&mut table, &clock);

        for _ in 0..100 {
            sched.run(Phase::Routine);
        }
        assert_eq!(svc.starts.get(), 1);
        assert_eq!(svc.routines.get(), 100);
        assert_eq!(svc.started_routines.get(), 100);
        assert_eq!(svc.ticks.get(), 0);

        for _ in 0..7 {
            sched.run(Phase::Tick);
        }
        assert_eq!(svc.ticks.get(), 7);
        assert_eq!(svc.routines.get(), 100);
        assert_eq!(svc.starts.get(), 1);
        assert!(sched.descriptor(0).is_started());
    }

    #[test]
    fn test_tick_needs_opt_in() {
        let clock = TickCounter::new();
        let quiet = Counter::default();
        let loud = Counter::default();
        let mut table = [
            Descriptor::new(1, &quiet),
            Descriptor::new(2, &loud).tick_enable(),
        ];
        let mut sched = Scheduler::new(&mut table, &clock);

        sched.run(Phase::Tick);
        sched.run(Phase::Tick);
        assert_eq!(quiet.ticks.get(), 0);
        assert_eq!(loud.ticks.get(), 2);
    }

    #[test]
    fn test_routine_reaches_stopped_services() {
        let clock = TickCounter::new();
        let svc = Counter::default();
        let mut table = [Descriptor::new(1, &svc)];
        let mut sched = Scheduler::new(&mut table, &clock);

        sched.run(Phase::Routine);
        sched.run(Phase::Routine);
        assert_eq!(svc.routines.get(), 2);
        assert_eq!(svc.started_routines.get(), 0);
        assert_eq!(svc.starts.get(), 0);
    }

    #[test]
    fn test_dispatch_order() {
        let clock = TickCounter::new();
        let log = Log::default();
        let (a, b, c) = (
            Recorder { log: &log },
            Recorder { log: &log },
            Recorder { log: &log },
        );
        let mut table = [
            Descriptor::new(10, &a),
            Descriptor::new(20, &b).default_start(),
            Descriptor::new(30, &c),
        ];
        let mut sched = Scheduler::new(&mut table, &clock);

        sched.run(Phase::Routine);
        sched.run(Phase::User(4));
        sched.run(Phase::Routine);

        assert_eq!(
            *log.borrow(),
            [
                (10, Phase::Routine),
                (20, Phase::Start),
                (20, Phase::Routine),
                (30, Phase::Routine),
                (10, Phase::User(4)),
                (20, Phase::User(4)),
                (30, Phase::User(4)),
                (10, Phase::Routine),
                (20, Phase::Routine),
                (30, Phase::Routine),
            ],
        );
    }

    #[test]
    fn test_start_stop_idempotent() {
        let clock = TickCounter::new();
        let svc = Counter::default();
        let mut table = [Descriptor::new(1, &svc)];
        let mut sched = Scheduler::new(&mut table, &clock);

        assert!(!sched.stop(0));
        assert_eq!(svc.stops.get(), 0);
        assert_eq!(svc.starts.get(), 0);

        assert!(sched.start(0));
        assert!(!sched.start(0));
        assert_eq!(svc.starts.get(), 1);

        assert!(sched.stop(0));
        assert!(!sched.stop(0));
        assert_eq!(svc.stops.get(), 1);
        assert!(!sched.descriptor(0).is_started());
    }

    #[test]
    fn test_stop_before_auto_start_leaves_it_armed() {
        let clock = TickCounter::new();
        let svc = Counter::default();
        let mut table = [Descriptor::new(1, &svc).default_start()];
        let mut sched = Scheduler::new(&mut table, &clock);

        assert!(!sched.stop(0));
        assert!(!sched.descriptor(0).status().default_start_triggered);

        sched.run(Phase::Routine);
        assert_eq!(svc.starts.get(), 1);
        assert_eq!(svc.stops.get(), 0);
        assert!(sched.descriptor(0).is_started());
        assert!(sched.descriptor(0).status().default_start_triggered);
    }

    #[test]
    fn test_explicit_start_then_auto_start_starts_once() {
        let clock = TickCounter::new();
        let svc = Counter::default();
        let mut table = [Descriptor::new(1, &svc).default_start()];
        let mut sched = Scheduler::new(&mut table, &clock);

        assert!(sched.start(0));
        sched.run(Phase::Routine);
        sched.run(Phase::Routine);
        assert_eq!(svc.starts.get(), 1);
        assert_eq!(svc.started_routines.get(), 2);

        // Auto-start only ever fires once.
        sched.stop(0);
        sched.run(Phase::Routine);
        assert_eq!(svc.starts.get(), 1);
        assert!(!sched.descriptor(0).is_started());
    }

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum Nap {
        Awake,
        Done,
    }

    /// Service that sleeps through a coroutine kept in its own state.
    struct Sleeper {
        co: Cell<Coroutine<Nap>>,
        field: Cell<u32>,
        woke: Cell<u32>,
    }

    impl Service for Sleeper {
        fn on_phase(&self, phase: Phase, cx: &Context<'_>) {
            if phase != Phase::Routine {
                return;
            }
            let mut co = self.co.get();
            co.run(cx.clock(), |at| match at {
                None => {
                    self.field.set(1);
                    Step::Sleep(Nap::Awake, 5)
                }
                Some(Nap::Awake) => {
                    assert_eq!(self.field.get(), 1);
                    self.field.set(2);
                    self.woke.set(self.woke.get() + 1);
                    Step::Yield(Nap::Done)
                }
                Some(Nap::Done) => Step::Yield(Nap::Done),
            });
            self.co.set(co);
        }
    }

    #[test]
    fn test_service_coroutine_sleeps_across_polls() {
        let clock = TickCounter::new();
        let svc = Sleeper {
            co: Cell::new(Coroutine::new()),
            field: Cell::new(0),
            woke: Cell::new(0),
        };
        let mut table = [Descriptor::new(1, &svc).default_start()];
        let mut sched = Scheduler::new(&mut table, &clock);

        sched.poll();
        assert_eq!(svc.field.get(), 1);

        for _ in 1..=4 {
            clock.increment();
            sched.poll();
            assert_eq!(svc.woke.get(), 0);
            assert_eq!(svc.field.get(), 1);
        }

        clock.increment();
        sched.poll();
        assert_eq!(svc.woke.get(), 1);
        assert_eq!(svc.field.get(), 2);

        for _ in 0..10 {
            clock.increment();
            sched.poll();
        }
        assert_eq!(svc.woke.get(), 1);
        assert_eq!(svc.field.get(), 2);
    }

    #[test]
    fn test_poll_delivers_elapsed_ticks() {
        let clock = TickCounter::starting_at(u32::MAX - 1);
        let svc = Counter::default();
        let mut table = [Descriptor::new(1, &svc).tick_enable()];
        let mut sched = Scheduler::new(&mut table, &clock);

        sched.poll();
        assert_eq!(svc.ticks.get(), 0);
        assert_eq!(svc.routines.get(), 1);

        clock.advance(3);
        sched.poll();
        assert_eq!(svc.ticks.get(), 3);
        assert_eq!(svc.routines.get(), 2);

        sched.poll();
        assert_eq!(svc.ticks.get(), 3);
        assert_eq!(svc.routines.get(), 3);
    }

    #[test]
    fn test_find() {
        let clock = TickCounter::new();
        let a = Counter::default();
        let b = Counter::default();
        let mut table = [Descriptor::new(7, &a), Descriptor::new(3, &b)];
        let mut sched = Scheduler::new(&mut table, &clock);

        assert_eq!(sched.len(), 2);
        assert_eq!(sched.find(3), Some(1));
        assert_eq!(sched.find(7), Some(0));
        assert_eq!(sched.find(5), None);

        let i = sched.find(3).unwrap();
        sched.start(i);
        assert_eq!(b.starts.get(), 1);
        assert_eq!(a.starts.get(), 0);
        assert_eq!(sched.descriptor(i).id(), 3);
    }

    #[test]
    fn test_reconfigure() {
        let clock = TickCounter::new();
        let svc = Counter::default();
        let mut table = [Descriptor::new(1, &svc)];
        let mut sched = Scheduler::new(&mut table, &clock);

        sched.run(Phase::Routine);
        sched.descriptor_mut(0).set_config(Config {
            tick_enable: true,
            default_start: true,
        });
        sched.run(Phase::Tick);
        sched.run(Phase::Routine);
        assert_eq!(svc.ticks.get(), 1);
        assert_eq!(svc.starts.get(), 1);
    }

    #[test]
    #[should_panic]
    fn test_duplicate_ids_rejected() {
        let clock = TickCounter::new();
        let a = Counter::default();
        let b = Counter::default();
        let mut table = [Descriptor::new(1, &a), Descriptor::new(1, &b)];
        let _ = Scheduler::new(&mut table, &clock);
    }

    #[test]
    fn test_events() {
        capture::start();
        let clock = TickCounter::new();
        let svc = Counter::default();
        let mut table = [Descriptor::new(9, &svc).default_start()];
        let mut sched = Scheduler::new(&mut table, &clock);

        sched.run(Phase::Routine);
        sched.stop(0);
        assert!(!sched.stop(0));

        assert_eq!(
            capture::take(Component::SERVICE),
            [
                (Kind::DISPATCH, Some(9)),
                (Kind::START, Some(9)),
                (Kind::DISPATCH, Some(9)),
                (Kind::DISPATCH, Some(9)),
                (Kind::STOP, Some(9)),
            ],
        );
    }
}
