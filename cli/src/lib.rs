// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A line-oriented command shell for `cadence` applications.
//!
//! The shell talks to a terminal over anything implementing
//! [`ByteIo`](byte::ByteIo) (typically a UART driver), reads lines, and
//! matches them against a static tree of [`Command`]s whose handlers do the
//! actual work. It never blocks waiting for input: [`Cli::poll`] handles
//! whatever has arrived and returns, so the shell can live in the service
//! table as a [`CliService`] next to everything else.
//!
//! ```ignore
//! fn led(phase: CmdPhase, args: &str, out: &mut dyn fmt::Write, app: &mut App)
//!     -> Result<(), CliError>
//! {
//!     if phase == CmdPhase::Run {
//!         let on = match token(args) {
//!             Some("on") => true,
//!             Some("off") => false,
//!             _ => return Err(CliError::Args),
//!         };
//!         app.led.set(on);
//!         write!(out, "ok\r\n")?;
//!     }
//!     Ok(())
//! }
//!
//! const COMMANDS: &[Command<App>] = &[Command::new("led").args(1).handler(led)];
//! static ROOT: Command<App> = Command::new("").children(COMMANDS);
//!
//! let shell = CliService::new(Cli::<_, _>::new(uart, &ROOT, App::new(), CliConfig::DEFAULT));
//! ```
//!
//! The pieces:
//!
//! - [`byte`] has the device interface.
//! - [`command`] describes command trees and how lines are matched.
//! - [`cli`] is the shell proper.

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

pub mod byte;
pub mod command;
pub mod cli;

pub use byte::{ByteIo, Writer};
pub use cli::{Cli, CliConfig, CliService, PollError};
pub use command::{next_token, token, CliError, CmdPhase, Command, Handler};
