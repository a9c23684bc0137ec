// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timekeeping using a wrapping tick counter.
//!
//! The scheduler's notion of time is a single monotonically increasing 32-bit
//! counter, incremented once per period by a platform timer interrupt. This
//! module provides ways to read that counter, and to compare timestamps taken
//! from it.
//!
//! To use the process-wide counter, arrange for your tick interrupt to call
//! [`on_tick`]. On Cortex-M, the `systick` feature provides a handler that
//! does this for you (see [`crate::systick`]). You can get the value of the
//! counter using [`now`].
//!
//! # Types for describing time
//!
//! [`Tick`] represents a specific point in time, measured as a number of ticks
//! since boot. It's only 32 bits, so on a 1 kHz tick it wraps about every 49
//! days. Rather than pretend that doesn't happen, all comparisons are done by
//! _unsigned wrapping subtraction_: "has `delta` passed since `stamp`" is
//! `now - stamp >= delta`, computed mod 2^32. This is correct across the wrap
//! as long as the intervals you care about are shorter than the wrap period.
//! For the same reason, `Tick` deliberately does not implement `Ord`.
//!
//! Intervals are plain `u32` tick counts. [`TickRate`] converts human units
//! into ticks for a given tick frequency.
//!
//! # Platform assumption
//!
//! The counter is written from interrupt context and read from the main loop
//! without a lock. This relies on a 32-bit aligned load being atomic on the
//! target, which holds for all 32-bit ARM and RISC-V parts. The increment
//! itself is an atomic read-modify-write via `portable-atomic`, which needs
//! its single-core option on ARMv6-M.
//!
//! # Private counters
//!
//! [`TickCounter`] is an ordinary type, and everything in this crate that
//! needs the time takes a `&TickCounter` rather than reaching for the global
//! one. That lets tests (and simulators) drive time by hand.

use core::ptr;

use portable_atomic::{AtomicPtr, AtomicU32, Ordering};

/// Represents a moment in time by the value of a tick counter.
///
/// Timestamps can only be meaningfully compared by asking how many ticks
/// have elapsed between them; see [`Tick::wrapping_since`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tick(u32);

impl Tick {
    /// Constructs a `Tick` from a raw counter value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Computes the number of ticks from `earlier` to `self`, using wrapping
    /// arithmetic.
    ///
    /// If `earlier` is actually later than `self`, you get a very large
    /// number, which is what you want when the counter has wrapped.
    pub const fn wrapping_since(self, earlier: Tick) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Produces the timestamp `ticks` after `self`, wrapping.
    pub const fn wrapping_add(self, ticks: u32) -> Tick {
        Tick(self.0.wrapping_add(ticks))
    }
}

impl From<Tick> for u32 {
    fn from(t: Tick) -> Self {
        t.0
    }
}

/// A monotonically increasing, wrapping tick counter.
///
/// This is a single 32-bit atomic word. It's safe to [`increment`] from an
/// interrupt handler while other code calls [`now`].
///
/// [`increment`]: TickCounter::increment
/// [`now`]: TickCounter::now
#[derive(Debug, Default)]
pub struct TickCounter {
    count: AtomicU32,
}

impl TickCounter {
    /// Creates a counter starting at zero.
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter starting at an arbitrary raw value. Mostly useful
    /// for checking behavior around the wrap.
    pub const fn starting_at(raw: u32) -> Self {
        Self {
            count: AtomicU32::new(raw),
        }
    }

    /// Reads the current value of the counter.
    #[inline]
    pub fn now(&self) -> Tick {
        Tick(self.count.load(Ordering::Acquire))
    }

    /// Advances the counter by one tick, wrapping at 2^32. This is intended to
    /// be called exactly once per timer period.
    #[inline]
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Advances the counter by `ticks`, wrapping.
    pub fn advance(&self, ticks: u32) {
        self.count.fetch_add(ticks, Ordering::Release);
    }

    /// Returns the number of ticks elapsed since `stamp`.
    #[inline]
    pub fn elapsed(&self, stamp: Tick) -> u32 {
        self.now().wrapping_since(stamp)
    }

    /// Checks whether at least `delta` ticks have elapsed since `stamp`.
    ///
    /// This is wraparound-safe: a `stamp` taken just before the counter
    /// wrapped compares correctly against a `now` taken just after.
    #[inline]
    pub fn is_up(&self, stamp: Tick, delta: u32) -> bool {
        self.elapsed(stamp) >= delta
    }
}

/// The process-wide tick counter, advanced by [`on_tick`].
pub static SYSTEM_TICKS: TickCounter = TickCounter::new();

/// Reads the process-wide tick counter.
#[inline]
pub fn now() -> Tick {
    SYSTEM_TICKS.now()
}

/// Checks whether at least `delta` ticks have passed on the process-wide
/// counter since `stamp`.
#[inline]
pub fn is_up(stamp: Tick, delta: u32) -> bool {
    SYSTEM_TICKS.is_up(stamp, delta)
}

/// Hook called from [`on_tick`], stored as an erased function pointer. Null
/// means no hook.
static TICK_HOOK: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

/// Installs (or, with `None`, removes) a function to be called from interrupt
/// context after each tick.
///
/// The hook runs inside your tick ISR, so keep it short. A typical use is to
/// dispatch the `Tick` phase of a scheduler that lives in a critical-section
/// mutex.
pub fn set_tick_hook(hook: Option<fn()>) {
    let p = match hook {
        Some(f) => f as *mut (),
        None => ptr::null_mut(),
    };
    TICK_HOOK.store(p, Ordering::Release);
}

/// Platform tick entry point. Call this exactly once per timer period from
/// your tick interrupt handler.
///
/// This advances [`SYSTEM_TICKS`] and then calls the hook installed by
/// [`set_tick_hook`], if any.
pub fn on_tick() {
    SYSTEM_TICKS.increment();

    let p = TICK_HOOK.load(Ordering::Acquire);
    if !p.is_null() {
        // Safety: the only non-null values ever stored in TICK_HOOK come from
        // casting a `fn()` in `set_tick_hook`, so transmuting it back yields
        // the same function pointer.
        let hook = unsafe { core::mem::transmute::<*mut (), fn()>(p) };
        hook();
    }
}

/// Conversion from human time units to ticks, for a given tick frequency.
///
/// Conversions round down, so an interval shorter than one tick becomes zero.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickRate {
    hz: u32,
}

impl TickRate {
    /// The usual 1 kHz rate, where one tick is one millisecond.
    pub const KHZ: Self = Self::from_hz(1000);

    /// Describes a tick that fires `hz` times per second.
    pub const fn from_hz(hz: u32) -> Self {
        Self { hz }
    }

    /// Returns the tick frequency in Hz.
    pub const fn hz(self) -> u32 {
        self.hz
    }

    /// Converts microseconds to ticks.
    pub const fn micros(self, us: u32) -> u32 {
        (us as u64 * self.hz as u64 / 1_000_000) as u32
    }

    /// Converts milliseconds to ticks.
    pub const fn millis(self, ms: u32) -> u32 {
        (ms as u64 * self.hz as u64 / 1_000) as u32
    }

    /// Converts seconds to ticks.
    pub const fn secs(self, s: u32) -> u32 {
        s.wrapping_mul(self.hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_counter_starts_where_asked() {
        assert_eq!(TickCounter::new().now(), Tick::from_raw(0));
        assert_eq!(TickCounter::starting_at(42).now().raw(), 42);
    }

    #[test]
    fn test_is_up_basic() {
        let clock = TickCounter::new();
        let stamp = clock.now();
        assert!(clock.is_up(stamp, 0));
        assert!(!clock.is_up(stamp, 3));
        clock.advance(2);
        assert!(!clock.is_up(stamp, 3));
        clock.increment();
        assert!(clock.is_up(stamp, 3));
        assert_eq!(clock.elapsed(stamp), 3);
    }

    #[test]
    fn test_is_up_across_wrap() {
        let clock = TickCounter::starting_at(0xFFFF_FFF0);
        let stamp = clock.now();
        for _ in 0..31 {
            clock.increment();
        }
        assert!(!clock.is_up(stamp, 32));
        clock.increment();
        assert_eq!(clock.now().raw(), 0x10);
        assert!(clock.is_up(stamp, 32));
        assert!(clock.is_up(Tick::from_raw(0xFFFF_FFF0), 32));
        assert!(!clock.is_up(Tick::from_raw(0xFFFF_FFF0), 33));
    }

    #[test]
    fn test_wrapping_since() {
        let a = Tick::from_raw(u32::MAX);
        let b = a.wrapping_add(5);
        assert_eq!(b.raw(), 4);
        assert_eq!(b.wrapping_since(a), 5);
        // Backwards looks like "a very long time".
        assert_eq!(a.wrapping_since(b), u32::MAX - 4);
    }

    #[test]
    fn test_tick_rate() {
        let rate = TickRate::from_hz(10_000);
        assert_eq!(rate.micros(100), 1);
        assert_eq!(rate.micros(50), 0);
        assert_eq!(rate.millis(100), 1000);
        assert_eq!(rate.secs(2), 20_000);
        assert_eq!(TickRate::KHZ.millis(250), 250);
    }

    static HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn count_hook() {
        HOOK_CALLS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    // This is the only test that touches the process-wide counter.
    #[test]
    fn test_on_tick_advances_global_and_calls_hook() {
        let before = now();
        set_tick_hook(Some(count_hook));
        on_tick();
        on_tick();
        set_tick_hook(None);
        on_tick();

        assert_eq!(now().wrapping_since(before), 3);
        assert!(is_up(before, 3));
        assert_eq!(HOOK_CALLS.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
