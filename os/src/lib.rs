// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A tiny cooperative service scheduler with stackless coroutines.
//!
//! This provides a minimal operating environment for small microcontrollers
//! that don't have the RAM to give every activity its own stack, plus a few
//! timekeeping doodads that make that environment pleasant to program.
//!
//! # `cadence` design principles
//!
//! 1. Be compact. The whole thing is a handful of flags per service and one
//!    counter. Avoid APIs that need internal asserts/panics, because those
//!    are quite costly in text size.
//!
//! 2. No magic. There are no proc macros, and the coroutine mechanism is an
//!    ordinary `match` over a step enum that you write yourself. You can see
//!    exactly where your code suspends and where it resumes.
//!
//! 3. Be portable. The core doesn't depend on any vendor-specific hardware.
//!    The only platform glue is a tick interrupt that calls
//!    [`time::on_tick`]; a SysTick implementation is provided for Cortex-M.
//!
//! 4. Be predictable. No dynamic memory allocation, no priorities, no
//!    preemption. Services run in the order you declared them, once per
//!    dispatch, every time.
//!
//! # About the scheduler
//!
//! An application declares a fixed set of *services* up front -- there is no
//! way to add one later. Each service is something implementing
//! [`service::Service`], wrapped in a [`service::Descriptor`] that carries its
//! id and scheduling flags. The table of descriptors is handed to a
//! [`service::Scheduler`], which walks it in order for each *phase*:
//!
//! - `Start` and `Stop` are delivered when a service is started or stopped,
//!   either explicitly or (for `Start`) lazily on the first `Routine` pass if
//!   the service is marked `default_start`.
//! - `Tick` is delivered once per timer tick, only to services that opted in
//!   with `tick_enable`, because it happens far more often than anything else.
//! - `Routine` is delivered every time through the application's main loop.
//!
//! # Coroutines without stacks
//!
//! Services don't have their own stacks. Every time a service callback
//! returns, everything on its stack is gone. To write multi-step sequential
//! logic anyway, a service keeps a [`coroutine::Coroutine`] in its state and
//! structures its body as a `match` on the stored resume point:
//!
//! ```ignore
//! #[derive(Copy, Clone)]
//! enum Blink { Off, Wait }
//!
//! co.run(clock, |at| match at {
//!     None => {
//!         led.write(Logic::High);
//!         Step::Sleep(Blink::Off, 500)
//!     }
//!     Some(Blink::Off) => {
//!         led.write(Logic::Low);
//!         Step::Sleep(Blink::Wait, 500)
//!     }
//!     Some(Blink::Wait) => Step::Restart,
//! });
//! ```
//!
//! The important rule: anything the body needs after a suspension point has
//! to live in the service's own state (usually a `Cell`), never in a local
//! variable, because the function really does return at every `Yield` or
//! `Sleep`.
//!
//! # Concurrency and interrupts
//!
//! The only thing shared with interrupt context is the tick counter in
//! [`time`]. It is a single 32-bit word that the tick ISR increments and
//! everyone else reads; on targets where a 32-bit load is atomic (which is
//! all the ones we care about) this needs no lock. Everything else assumes
//! it is only touched from the main loop.
//!
//! If you want `Tick`-phase services to run in the tick interrupt itself,
//! you can install a hook with [`time::set_tick_hook`] -- but then you're
//! responsible for getting at the scheduler from the ISR, which generally
//! means putting it in a critical-section mutex. The simpler arrangement is
//! [`service::Scheduler::poll`], which delivers any ticks that elapsed since
//! the last pass from the main loop.
//!
//! # Diagnostics
//!
//! Interesting transitions (services starting and stopping, countdowns
//! firing, state changes) and every phase dispatched to a service are
//! reported to an optional event sink; see
//! [`event`]. With the `defmt` feature they are also logged through `defmt`.

#![cfg_attr(not(test), no_std)]
#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    missing_debug_implementations,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_op_in_unsafe_fn,
    unused_qualifications
)]
#![warn(clippy::undocumented_unsafe_blocks)]

/// Internal assert macro that doesn't stringify its expression or generate any
/// fancy messages. This means failures must be diagnosed by file:line only, so,
/// don't use this more than once on the same line. In exchange, this makes
/// asserts significantly smaller in terms of text size.
///
/// We use this for configuration errors only -- things like a malformed
/// service table -- where stopping dead is the right answer.
macro_rules! cheap_assert {
    ($x:expr) => {
        if !$x { panic!(); };
    }
}
pub(crate) use cheap_assert;

pub mod time;
pub mod event;
pub mod countdown;
pub mod coroutine;
pub mod routine;
pub mod service;
pub mod state;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "systick", target_arch = "arm"))] {
        pub mod systick;
    }
}
