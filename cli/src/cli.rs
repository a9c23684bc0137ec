// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The shell itself.
//!
//! A [`Cli`] owns a [`ByteIo`], a line buffer, the root of a command tree,
//! and an application context value that handlers get to mutate. Calling
//! [`Cli::poll`] does a bounded amount of work and returns: it takes
//! whatever input has arrived, and if that completes a line, runs the line.
//! That makes it suitable for calling from a service's `Routine` phase, which
//! is what [`CliService`] does.
//!
//! # Line editing
//!
//! Editing is deliberately minimal. Printable ASCII is appended to the line
//! (and dropped once the buffer is full), backspace or DEL erases the last
//! character, and CR, LF, or NUL ends the line. Everything else is ignored.
//! Echo is optional, since some terminals do it themselves.
//!
//! # Processing a line
//!
//! See [`crate::command`] for how lines are matched against the tree. In
//! addition, a `?` token anywhere prints the commands available at that
//! point, and stops. The root command is never matched by name, but if it has
//! a handler, it takes part in `Run` and `Reset` with the whole line as its
//! argument text.
//!
//! If the line fails, the error (other than [`CliError::Abort`]) is printed
//! on a line of its own. Either way a fresh prompt follows.

use core::cell::RefCell;
use core::fmt::{self, Write as _};

use cadence::event::{self, Component, Kind};
use cadence::service::{Context, Phase, Service};
use heapless::Vec;

use crate::byte::{ByteIo, Writer};
use crate::command::{next_token, CliError, CmdPhase, Command};

/// Default line buffer size, in bytes.
pub const DEFAULT_LINE_LEN: usize = 128;

/// Deepest command nesting the shell will follow.
pub const MAX_DEPTH: usize = 8;

/// Event component for shell errors.
pub const CLI: Component = Component("Cli");

/// Shell settings.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CliConfig {
    /// Printed, followed by a space, whenever the shell is ready for a line.
    pub prompt: &'static str,
    /// Echo input back to the terminal.
    pub echo: bool,
    /// Throw away anything received while a line was being processed. Useful
    /// when commands take long enough that typed-ahead input is suspect.
    pub reset_rx: bool,
}

impl CliConfig {
    /// `#` prompt, no echo, no receive flush.
    pub const DEFAULT: Self = Self {
        prompt: "#",
        echo: false,
        reset_rx: false,
    };
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Things that can go wrong in [`Cli::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollError<E> {
    /// The byte device failed.
    Io(E),
    /// The line was processed and failed with this error, which has already
    /// been printed.
    Command(CliError),
}

/// A command shell. See the module docs.
///
/// `N` is the capacity of the line buffer.
pub struct Cli<IO, C: 'static, const N: usize = DEFAULT_LINE_LEN> {
    io: IO,
    ctx: C,
    root: &'static Command<C>,
    config: CliConfig,
    line: Vec<u8, N>,
    lock: u8,
    prompted: bool,
}

impl<IO: ByteIo, C: 'static, const N: usize> Cli<IO, C, N> {
    /// Creates a shell talking over `io`, understanding the children of
    /// `root`, and passing `ctx` to handlers.
    ///
    /// Nothing is printed until the first [`poll`](Self::poll) (or
    /// [`start`](Self::start)).
    pub const fn new(io: IO, root: &'static Command<C>, ctx: C, config: CliConfig) -> Self {
        Self {
            io,
            ctx,
            root,
            config,
            line: Vec::new(),
            lock: 0,
            prompted: false,
        }
    }

    /// Discards any partial line and prints the prompt.
    pub fn start(&mut self) -> Result<(), IO::Error> {
        self.line.clear();
        self.prompt()
    }

    /// Does whatever work is pending. See the module docs.
    ///
    /// The very first call only prints the prompt. After that, each call
    /// consumes all input that has arrived; if that includes the end of a
    /// line, the line is processed and a new prompt printed.
    pub fn poll(&mut self) -> Result<(), PollError<IO::Error>> {
        if !self.prompted {
            return self.start().map_err(PollError::Io);
        }

        if !self.fetch().map_err(PollError::Io)? {
            return Ok(());
        }

        let outcome = if self.line.is_empty() {
            Ok(())
        } else {
            self.parse()
        };
        self.line.clear();

        self.prompt().map_err(PollError::Io)?;
        if self.config.reset_rx {
            self.io.rx_reset();
        }
        outcome
    }

    /// Sets the lock value; commands are visible only if all of their lock
    /// bits are set here.
    pub fn set_lock(&mut self, lock: u8) {
        self.lock = lock;
    }

    /// The current lock value.
    pub fn lock(&self) -> u8 {
        self.lock
    }

    /// The settings.
    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Borrows the handler context.
    pub fn context(&self) -> &C {
        &self.ctx
    }

    /// Borrows the handler context mutably.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    /// Borrows the byte device.
    pub fn io(&self) -> &IO {
        &self.io
    }

    /// Borrows the byte device mutably, e.g. to print something unprompted.
    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    /// The partial line typed so far.
    pub fn pending(&self) -> &[u8] {
        &self.line
    }

    fn prompt(&mut self) -> Result<(), IO::Error> {
        self.io.write_str(self.config.prompt)?;
        self.io.write(b" ")?;
        self.prompted = true;
        Ok(())
    }

    /// Takes input until it runs out or a line is complete. Returns `true`
    /// in the latter case.
    fn fetch(&mut self) -> Result<bool, IO::Error> {
        loop {
            let c = match self.io.get() {
                Ok(c) => c,
                Err(nb::Error::WouldBlock) => return Ok(false),
                Err(nb::Error::Other(e)) => return Err(e),
            };
            match c {
                b'\r' | b'\n' | 0 => {
                    if self.config.echo {
                        self.io.write(b"\r\n")?;
                    }
                    return Ok(true);
                }
                0x08 | 0x7F => {
                    if self.line.pop().is_some() {
                        self.io.write(b"\x08 \x08")?;
                    }
                }
                32..=126 => {
                    if self.line.push(c).is_ok() && self.config.echo {
                        self.io.write(&[c])?;
                    }
                }
                _ => (),
            }
        }
    }

    fn parse(&mut self) -> Result<(), PollError<IO::Error>> {
        let Self {
            io,
            ctx,
            root,
            line,
            lock,
            ..
        } = self;
        let root: &'static Command<C> = *root;
        // Only printable ASCII ever goes into the buffer.
        let Ok(line) = core::str::from_utf8(&line[..]) else {
            return Ok(());
        };
        let Some(mut pos) = next_token(line, 0) else {
            return Ok(());
        };

        let mut out = Writer::new(io);
        let mut path: Vec<(&'static Command<C>, usize), MAX_DEPTH> = Vec::new();
        let mut result = match path.push((root, 0)) {
            Ok(()) => Ok(()),
            Err(_) => Err(CliError::Other),
        };
        let mut cur = root;
        let mut skip = 0;

        while result.is_ok() {
            let rest = &line[pos..];

            if rest == "?" || rest.starts_with("? ") {
                let _ = write_help(&mut out, cur);
                result = Err(CliError::Abort);
                break;
            }

            if skip > 0 {
                skip -= 1;
            } else {
                let found = cur
                    .subcommands()
                    .iter()
                    .find(|c| c.is_unlocked_by(*lock) && c.matches(rest));
                match found {
                    Some(child) => {
                        let at = pos + child.name().len();
                        result = child.call(CmdPhase::Match, &line[at..], &mut out, ctx);
                        if result.is_err() {
                            break;
                        }
                        skip = child.arg_count();
                        if !child.is_batch() {
                            if path.push((child, at)).is_err() {
                                result = Err(CliError::Other);
                                break;
                            }
                            cur = child;
                        }
                    }
                    None if cur.subcommands().is_empty() => result = Err(CliError::Args),
                    None => result = Err(CliError::NoMatch),
                }
            }

            match next_token(rest, 1) {
                Some(n) => pos += n,
                None => break,
            }
        }

        if result.is_ok() {
            for &(cmd, at) in path.iter() {
                result = cmd.call(CmdPhase::Run, &line[at..], &mut out, ctx);
                if result.is_err() {
                    break;
                }
            }
        }
        for &(cmd, at) in path.iter().rev() {
            let _ = cmd.call(CmdPhase::Reset, &line[at..], &mut out, ctx);
        }

        if let Err(e) = result {
            if e != CliError::Abort {
                let _ = write!(out, "{}\r\n", e);
            }
        }
        if let Some(e) = out.take_error() {
            return Err(PollError::Io(e));
        }
        match result {
            Err(e) if e != CliError::Abort => Err(PollError::Command(e)),
            _ => Ok(()),
        }
    }
}

fn write_help<C: 'static>(out: &mut dyn fmt::Write, cmd: &Command<C>) -> fmt::Result {
    out.write_str("Command List:\r\n")?;
    for c in cmd.subcommands() {
        let batch = if c.is_batch() { "BATCH" } else { "" };
        write!(out, "  {:<10}{}  {}\r\n", c.name(), c.arg_count(), batch)?;
    }
    Ok(())
}

impl<IO, C: 'static, const N: usize> fmt::Debug for Cli<IO, C, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("root", self.root)
            .field("config", &self.config)
            .field("pending", &self.line.len())
            .field("lock", &self.lock)
            .field("prompted", &self.prompted)
            .finish_non_exhaustive()
    }
}

/// A [`Cli`] that can sit in the service table.
///
/// `Start` prints the prompt; `Routine` polls. Failures are reported as
/// [`CLI`] `ERROR` events. Other code can get at the shell through
/// [`with`](Self::with), as long as it isn't a command handler of the same
/// shell.
///
/// Input never blocks, but output does: prompts, echo, and handler output go
/// through [`ByteIo::write`], which waits for room in the transmitter. The
/// dispatcher is held up for as long as that takes, so the device should
/// either buffer a whole response or report a stuck transmitter as an error
/// instead of `WouldBlock`.
pub struct CliService<IO, C: 'static, const N: usize = DEFAULT_LINE_LEN> {
    cli: RefCell<Cli<IO, C, N>>,
}

impl<IO: ByteIo, C: 'static, const N: usize> CliService<IO, C, N> {
    /// Wraps `cli`.
    pub const fn new(cli: Cli<IO, C, N>) -> Self {
        Self {
            cli: RefCell::new(cli),
        }
    }

    /// Runs `body` with the shell.
    ///
    /// # Panics
    ///
    /// If called from inside one of the shell's own handlers.
    pub fn with<R>(&self, body: impl FnOnce(&mut Cli<IO, C, N>) -> R) -> R {
        body(&mut self.cli.borrow_mut())
    }
}

impl<IO: ByteIo, C: 'static, const N: usize> Service for CliService<IO, C, N> {
    fn on_phase(&self, phase: Phase, _cx: &Context<'_>) {
        let mut cli = self.cli.borrow_mut();
        let failed = match phase {
            Phase::Start => cli.start().is_err(),
            Phase::Routine => cli.poll().is_err(),
            _ => false,
        };
        if failed {
            event::emit(CLI, Kind::ERROR);
        }
    }
}

impl<IO, C: 'static, const N: usize> fmt::Debug for CliService<IO, C, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cli.try_borrow() {
            Ok(cli) => f.debug_tuple("CliService").field(&*cli).finish(),
            Err(_) => f.write_str("CliService(<busy>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte::testutil::{Full, Term};
    use crate::command::token;

    use std::format;
    use std::string::String;
    use std::vec::Vec as StdVec;

    #[derive(Debug, Default)]
    struct Log {
        calls: StdVec<String>,
        fail_match: bool,
        value: u32,
    }

    type Result = core::result::Result<(), CliError>;

    fn rec(ctx: &mut Log, name: &str, phase: CmdPhase, args: &str) {
        ctx.calls.push(format!("{name}:{}:{args}", phase.as_str()));
    }

    fn root_h(p: CmdPhase, a: &str, _: &mut dyn fmt::Write, c: &mut Log) -> Result {
        rec(c, "root", p, a);
        Ok(())
    }

    fn led_h(p: CmdPhase, a: &str, _: &mut dyn fmt::Write, c: &mut Log) -> Result {
        rec(c, "led", p, a);
        Ok(())
    }

    fn on_h(p: CmdPhase, a: &str, _: &mut dyn fmt::Write, c: &mut Log) -> Result {
        rec(c, "on", p, a);
        if p == CmdPhase::Match && c.fail_match {
            return Err(CliError::Other);
        }
        Ok(())
    }

    fn set_h(p: CmdPhase, a: &str, out: &mut dyn fmt::Write, c: &mut Log) -> Result {
        rec(c, "set", p, a);
        if p == CmdPhase::Run {
            let v = token(a)
                .and_then(|t| t.parse().ok())
                .ok_or(CliError::Args)?;
            c.value = v;
            write!(out, "set {v}\r\n")?;
        }
        Ok(())
    }

    fn v_h(p: CmdPhase, a: &str, _: &mut dyn fmt::Write, c: &mut Log) -> Result {
        rec(c, "v", p, a);
        Ok(())
    }

    fn secret_h(p: CmdPhase, a: &str, _: &mut dyn fmt::Write, c: &mut Log) -> Result {
        rec(c, "secret", p, a);
        Ok(())
    }

    const LED: &[Command<Log>] = &[
        Command::new("on").handler(on_h),
        Command::new("set").args(1).handler(set_h),
    ];

    const TOP: &[Command<Log>] = &[
        Command::new("led").handler(led_h).children(LED),
        Command::new("-v").batch().handler(v_h),
        Command::new("secret").lock(0b10).handler(secret_h),
    ];

    static ROOT: Command<Log> = Command::new("").handler(root_h).children(TOP);

    fn shell(input: &str) -> Cli<Term, Log> {
        let mut cli = Cli::new(Term::typed(input), &ROOT, Log::default(), CliConfig::DEFAULT);
        // Prompt.
        assert_eq!(cli.poll(), Ok(()));
        cli
    }

    fn calls(cli: &mut Cli<Term, Log>) -> StdVec<String> {
        core::mem::take(&mut cli.context_mut().calls)
    }

    #[test]
    fn test_first_poll_only_prompts() {
        let mut cli = shell("led on\r");
        assert_eq!(cli.io_mut().output(), "# ");
        assert!(calls(&mut cli).is_empty());
        assert_eq!(cli.io().rx.len(), 7);

        assert_eq!(cli.poll(), Ok(()));
        assert_eq!(cli.io_mut().output(), "# ");
    }

    #[test]
    fn test_partial_line_waits() {
        let mut cli = shell("le");
        cli.poll().unwrap();
        assert_eq!(cli.pending(), b"le");
        assert!(calls(&mut cli).is_empty());

        cli.io_mut().type_in("d on\r");
        cli.poll().unwrap();
        assert_eq!(cli.pending(), b"");
        assert_eq!(calls(&mut cli).len(), 8);
    }

    #[test]
    fn test_path_runs_root_first_resets_leaf_first() {
        let mut cli = shell("led on\r");
        assert_eq!(cli.poll(), Ok(()));
        assert_eq!(
            calls(&mut cli),
            [
                "led:Match: on",
                "on:Match:",
                "root:Run:led on",
                "led:Run: on",
                "on:Run:",
                "on:Reset:",
                "led:Reset: on",
                "root:Reset:led on",
            ],
        );
        assert_eq!(cli.io_mut().output(), "# # ");
    }

    #[test]
    fn test_args_are_skipped_and_passed() {
        let mut cli = shell("  led set 42\r");
        assert_eq!(cli.poll(), Ok(()));
        assert_eq!(cli.context().value, 42);
        assert_eq!(cli.io_mut().output(), "# set 42\r\n# ");

        // "on" here is set's argument, not the command.
        cli.io_mut().type_in("led set on\r");
        assert_eq!(cli.poll(), Err(PollError::Command(CliError::Args)));
        assert_eq!(cli.io_mut().output(), "Args\r\n# ");
        let log = calls(&mut cli);
        assert!(log.contains(&"set:Run: on".into()));
        assert!(!log.iter().any(|c| c.starts_with("on:")));
        assert_eq!(log.last().map(String::as_str), Some("root:Reset:led set on"));
    }

    #[test]
    fn test_extra_token_on_leaf_is_args_error() {
        let mut cli = shell("led on extra\r");
        assert_eq!(cli.poll(), Err(PollError::Command(CliError::Args)));
        assert_eq!(
            calls(&mut cli),
            [
                "led:Match: on extra",
                "on:Match: extra",
                "on:Reset: extra",
                "led:Reset: on extra",
                "root:Reset:led on extra",
            ],
        );
    }

    #[test]
    fn test_no_match() {
        let mut cli = shell("bogus\r");
        assert_eq!(cli.poll(), Err(PollError::Command(CliError::NoMatch)));
        assert_eq!(cli.io_mut().output(), "# NoMatch\r\n# ");
        assert_eq!(calls(&mut cli), ["root:Reset:bogus"]);
    }

    #[test]
    fn test_lock_hides_commands() {
        let mut cli = shell("secret\r");
        assert_eq!(cli.poll(), Err(PollError::Command(CliError::NoMatch)));
        calls(&mut cli);

        cli.set_lock(0b11);
        assert_eq!(cli.lock(), 0b11);
        cli.io_mut().type_in("secret\r");
        assert_eq!(cli.poll(), Ok(()));
        assert!(calls(&mut cli).contains(&"secret:Run:".into()));
    }

    #[test]
    fn test_help() {
        let mut cli = shell("?\r");
        assert_eq!(cli.poll(), Ok(()));
        assert_eq!(
            cli.io_mut().output(),
            "# Command List:\r\n\
             \x20 led       0  \r\n\
             \x20 -v        0  BATCH\r\n\
             \x20 secret    0  \r\n\
             # ",
        );
        assert_eq!(calls(&mut cli), ["root:Reset:?"]);

        cli.io_mut().type_in("led ?\r");
        assert_eq!(cli.poll(), Ok(()));
        assert_eq!(
            cli.io_mut().output(),
            "Command List:\r\n\
             \x20 on        0  \r\n\
             \x20 set       1  \r\n\
             # ",
        );
        assert!(!calls(&mut cli).iter().any(|c| c.contains(":Run:")));
    }

    #[test]
    fn test_batch_commands_stay_at_level() {
        let mut cli = shell("-v -v led on\r");
        assert_eq!(cli.poll(), Ok(()));
        assert_eq!(
            calls(&mut cli),
            [
                "v:Match: -v led on",
                "v:Match: led on",
                "led:Match: on",
                "on:Match:",
                "root:Run:-v -v led on",
                "led:Run: on",
                "on:Run:",
                "on:Reset:",
                "led:Reset: on",
                "root:Reset:-v -v led on",
            ],
        );
    }

    #[test]
    fn test_match_error_stops_line() {
        let mut cli = shell("led on\r");
        cli.context_mut().fail_match = true;
        assert_eq!(cli.poll(), Err(PollError::Command(CliError::Other)));
        assert_eq!(
            calls(&mut cli),
            [
                "led:Match: on",
                "on:Match:",
                "led:Reset: on",
                "root:Reset:led on",
            ],
        );
        assert_eq!(cli.io_mut().output(), "# Other\r\n# ");
    }

    #[test]
    fn test_editing_and_echo() {
        let config = CliConfig {
            prompt: ">",
            echo: true,
            ..CliConfig::DEFAULT
        };
        let mut cli: Cli<Term, Log> =
            Cli::new(Term::typed("lex\x08d\x01 on\r"), &ROOT, Log::default(), config);
        cli.poll().unwrap();
        cli.poll().unwrap();
        assert_eq!(cli.io_mut().output(), "> lex\x08 \x08d on\r\n> ");
        assert_eq!(calls(&mut cli).len(), 8);
    }

    #[test]
    fn test_backspace_on_empty_line() {
        let mut cli = shell("\x08\x7F");
        cli.poll().unwrap();
        assert_eq!(cli.io_mut().output(), "# ");
        assert_eq!(cli.pending(), b"");
    }

    #[test]
    fn test_full_buffer_drops_input() {
        let mut cli: Cli<Term, Log, 4> =
            Cli::new(Term::typed("ledxx\r"), &ROOT, Log::default(), CliConfig::DEFAULT);
        cli.poll().unwrap();
        assert_eq!(cli.poll(), Err(PollError::Command(CliError::NoMatch)));
        assert_eq!(cli.context().calls, ["root:Reset:ledx"]);
    }

    #[test]
    fn test_blank_line_just_prompts() {
        let mut cli = shell("   \r\n");
        cli.poll().unwrap();
        cli.poll().unwrap();
        assert_eq!(cli.io_mut().output(), "# # # ");
        assert!(calls(&mut cli).is_empty());
    }

    #[test]
    fn test_reset_rx_flushes_typeahead() {
        let config = CliConfig {
            reset_rx: true,
            ..CliConfig::DEFAULT
        };
        let mut cli: Cli<Term, Log> =
            Cli::new(Term::typed("led on\rled on\r"), &ROOT, Log::default(), config);
        cli.poll().unwrap();
        cli.poll().unwrap();
        assert!(cli.io().rx.is_empty());
        assert_eq!(calls(&mut cli).len(), 8);
    }

    #[test]
    fn test_device_error() {
        let mut cli = shell("?\r");
        cli.io_mut().limit = Some(4);
        assert_eq!(cli.poll(), Err(PollError::Io(Full)));
    }

    #[test]
    fn test_as_service() {
        use cadence::service::{Descriptor, Scheduler};
        use cadence::time::TickCounter;

        let clock = TickCounter::new();
        let svc = CliService::new(Cli::<_, _>::new(
            Term::typed("led set 7\r"),
            &ROOT,
            Log::default(),
            CliConfig::DEFAULT,
        ));
        let mut table = [Descriptor::new(0, &svc).default_start()];
        let mut sched = Scheduler::new(&mut table, &clock);

        sched.run(Phase::Routine);
        assert_eq!(svc.with(|cli| cli.context().value), 7);
        assert_eq!(svc.with(|cli| cli.io_mut().output()), "# set 7\r\n# ");
    }

    #[test]
    fn test_service_gives_up_on_stuck_transmitter() {
        use cadence::service::{Descriptor, Scheduler};
        use cadence::time::TickCounter;

        let clock = TickCounter::new();
        let mut term = Term::typed("led set 7\r");
        term.limit = Some(0);
        let svc = CliService::new(Cli::<_, _>::new(
            term,
            &ROOT,
            Log::default(),
            CliConfig::DEFAULT,
        ));
        let mut table = [Descriptor::new(0, &svc).default_start()];
        let mut sched = Scheduler::new(&mut table, &clock);

        // The device refuses output, so each dispatch returns without
        // having printed or consumed anything.
        sched.run(Phase::Routine);
        sched.run(Phase::Routine);
        assert!(svc.with(|cli| cli.io_mut().output().is_empty()));
        assert_eq!(svc.with(|cli| cli.io().rx.len()), 10);

        svc.with(|cli| cli.io_mut().limit = None);
        sched.run(Phase::Routine);
        assert_eq!(svc.with(|cli| cli.io_mut().output()), "# ");
        sched.run(Phase::Routine);
        assert_eq!(svc.with(|cli| cli.context().value), 7);
        assert_eq!(svc.with(|cli| cli.io_mut().output()), "set 7\r\n# ");
    }
}
