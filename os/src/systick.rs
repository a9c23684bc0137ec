// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cortex-M tick source using the SysTick timer.

use cortex_m::peripheral::{syst::SystClkSource, SYST};
use cortex_m_rt::exception;

use crate::time::{self, TickRate};

/// Sets up SysTick to fire at `rate`, assuming a CPU core clock of
/// `clock_hz`.
///
/// If you use this module in your application, call this before you start
/// running the scheduler. Every SysTick interrupt then advances
/// [`SYSTEM_TICKS`][time::SYSTEM_TICKS] through [`time::on_tick`].
///
/// # Panics
///
/// If `rate` is faster than `clock_hz`, or so slow that the reload value
/// doesn't fit SysTick's 24-bit counter.
pub fn initialize_sys_tick(syst: &mut SYST, clock_hz: u32, rate: TickRate) {
    crate::cheap_assert!(rate.hz() != 0);
    let cycles_per_tick = clock_hz / rate.hz();
    crate::cheap_assert!(cycles_per_tick != 0 && cycles_per_tick <= 1 << 24);
    syst.set_reload(cycles_per_tick - 1);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_interrupt();
    syst.enable_counter();
}

/// System tick ISR.
#[doc(hidden)]
#[exception]
fn SysTick() {
    time::on_tick();
}
