// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Digital inputs for `cadence` applications.
//!
//! This crate provides the usual front-panel plumbing as services that plug
//! into a [`cadence::service::Scheduler`]:
//!
//! - [`logic`] defines the two-level signal type and the traits that pin
//!   drivers implement to provide or accept it.
//! - [`filter::Debounce`] turns a noisy input into a clean one by requiring a
//!   new level to hold for a while before believing it.
//! - [`button::Button`] tracks press and release edges and how long the
//!   button has been held; [`button::Clicks`] counts multi-clicks on top of
//!   that, and [`button::Repeat`] produces accelerating auto-repeat.
//! - [`encoder::Encoder`] decodes a two-phase rotary encoder.
//!
//! All of these poll their inputs during the `Routine` phase, so how quickly
//! they respond depends on how often your main loop comes around. Timing
//! parameters are in ticks; use [`cadence::time::TickRate`] to write them in
//! milliseconds.
//!
//! Everything keeps its state in `Cell`s so that it can sit in the service
//! table while other services hold references to it. The intended pattern is
//!
//! ```ignore
//! let raw = Pin(...);                      // something implementing LogicInput
//! let key = Debounce::new(&raw, 5, 5);
//! let button = Button::new(&key, Logic::Low);
//! let clicks = Clicks::new(&button, 300);
//!
//! let mut table = [
//!     Descriptor::new(0, &key).default_start(),
//!     Descriptor::new(1, &button).default_start(),
//!     Descriptor::new(2, &clicks).default_start(),
//! ];
//! ```
//!
//! with each stage listed after the stage it reads from, so that a change
//! ripples all the way through in one pass.

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

pub mod logic;
pub mod filter;
pub mod button;
pub mod encoder;

/// Event tags reported by this crate, in addition to the ones in
/// [`cadence::event`].
pub mod tags {
    use cadence::event::{Component, Kind};

    /// [`Button`][crate::button::Button].
    pub const BUTTON: Component = Component("Button");
    /// [`Clicks`][crate::button::Clicks].
    pub const CLICKS: Component = Component("BtnClick");
    /// [`Repeat`][crate::button::Repeat].
    pub const REPEAT: Component = Component("BtnRepeat");

    /// A button was locked out.
    pub const LOCK: Kind = Kind("Lock");
    /// A button lockout was lifted.
    pub const UNLOCK: Kind = Kind("Unlock");
    /// A button went down.
    pub const PRESSED: Kind = Kind("Pressed");
    /// A button came back up.
    pub const RELEASED: Kind = Kind("Released");
}
