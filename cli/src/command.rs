// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command trees.
//!
//! The commands a shell understands are a tree of [`Command`]s, normally
//! built at compile time as `static`s. A line is matched against the tree
//! one space-separated token at a time: the first token against the root's
//! children, the next against the matched child's children, and so on.
//!
//! Each command can have a handler, which is called with a [`CmdPhase`]:
//!
//! - `Match` as soon as the command's token is matched, before the rest of
//!   the line is looked at. A handler can reject the line here by returning
//!   an error.
//! - `Run` once the whole line has been matched successfully. Every command
//!   along the matched path gets `Run`, starting from the root.
//! - `Reset` after the line has been processed, whether or not it
//!   succeeded, starting from the deepest matched command. Handlers that
//!   stashed something in the context during `Match` clean it up here.
//!
//! A handler gets the text of the line following its own token (including
//! the leading space), an output stream, and the shell's context value.
//! Use [`next_token`] to pick arguments out of the text.
//!
//! Commands have three more knobs:
//!
//! - `args` is the number of tokens after the command that are its
//!   arguments. These are skipped when matching, so an argument that happens
//!   to look like a command doesn't get matched as one.
//! - `lock` is a bit mask. A command is only visible when all of its lock
//!   bits are set in the shell's current lock value, which is how you hide
//!   service commands until someone has typed a password.
//! - `batch` makes a command behave like an option: it's matched and gets
//!   `Match`, but matching continues among its siblings rather than its
//!   children, and it doesn't take part in `Run` or `Reset`.

use core::fmt;

/// What's happening to a command.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CmdPhase {
    /// The command's token was just matched.
    Match,
    /// The line matched; do the thing.
    Run,
    /// The line is finished.
    Reset,
}

impl CmdPhase {
    /// Name of the phase.
    pub const fn as_str(self) -> &'static str {
        match self {
            CmdPhase::Match => "Match",
            CmdPhase::Run => "Run",
            CmdPhase::Reset => "Reset",
        }
    }
}

/// Reasons a command line fails.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CliError {
    /// Stop processing the line without complaining. Used by `?`, and by
    /// handlers that have already explained themselves.
    Abort,
    /// A token was left over where no more were expected.
    Args,
    /// A token didn't match any visible command.
    NoMatch,
    /// Anything else; typically returned by handlers.
    Other,
}

impl CliError {
    /// Short description, as printed by the shell.
    pub const fn as_str(self) -> &'static str {
        match self {
            CliError::Abort => "Abort",
            CliError::Args => "Args",
            CliError::NoMatch => "NoMatch",
            CliError::Other => "Other",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output errors inside a handler become `Other`, so that handlers can use
/// `?` on `write!`.
impl From<fmt::Error> for CliError {
    fn from(_: fmt::Error) -> Self {
        CliError::Other
    }
}

/// Signature of a command handler. See the module docs.
pub type Handler<C> =
    fn(phase: CmdPhase, args: &str, out: &mut dyn fmt::Write, ctx: &mut C) -> Result<(), CliError>;

/// A node in the command tree, with a context type `C`.
pub struct Command<C: 'static> {
    name: &'static str,
    lock: u8,
    args: u8,
    batch: bool,
    children: &'static [Command<C>],
    handler: Option<Handler<C>>,
}

impl<C: 'static> Command<C> {
    /// Creates a command matching `name`, with no handler, no children, no
    /// arguments, and no lock bits.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: 0,
            args: 0,
            batch: false,
            children: &[],
            handler: None,
        }
    }

    /// Sets the handler.
    pub const fn handler(mut self, handler: Handler<C>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the subcommands.
    pub const fn children(mut self, children: &'static [Command<C>]) -> Self {
        self.children = children;
        self
    }

    /// Sets the number of argument tokens.
    pub const fn args(mut self, args: u8) -> Self {
        self.args = args;
        self
    }

    /// Sets the lock bits.
    pub const fn lock(mut self, lock: u8) -> Self {
        self.lock = lock;
        self
    }

    /// Makes this a batch command.
    pub const fn batch(mut self) -> Self {
        self.batch = true;
        self
    }

    /// The token this command matches.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The number of argument tokens.
    pub fn arg_count(&self) -> u8 {
        self.args
    }

    /// Checks whether this is a batch command.
    pub fn is_batch(&self) -> bool {
        self.batch
    }

    /// The subcommands.
    pub fn subcommands(&self) -> &'static [Command<C>] {
        self.children
    }

    /// Checks whether the command is visible under the shell lock value
    /// `lock`.
    pub fn is_unlocked_by(&self, lock: u8) -> bool {
        lock & self.lock == self.lock
    }

    /// Checks whether `text` starts with this command's name as a whole
    /// token.
    pub fn matches(&self, text: &str) -> bool {
        match text.strip_prefix(self.name) {
            Some(rest) => rest.is_empty() || rest.starts_with(' '),
            None => false,
        }
    }

    /// Calls the handler, if there is one.
    pub(crate) fn call(
        &self,
        phase: CmdPhase,
        args: &str,
        out: &mut dyn fmt::Write,
        ctx: &mut C,
    ) -> Result<(), CliError> {
        match self.handler {
            Some(h) => h(phase, args, out, ctx),
            None => Ok(()),
        }
    }
}

impl<C: 'static> fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("lock", &self.lock)
            .field("args", &self.args)
            .field("batch", &self.batch)
            .field("children", &self.children.len())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Finds the start of a token in `line`.
///
/// Skips leading spaces, then skips `skip` whole tokens (and the spaces
/// after each), and returns the byte offset of the token found there, or
/// `None` if the line runs out first.
///
/// ```
/// # use cadence_cli::next_token;
/// assert_eq!(next_token("  set 10 20", 0), Some(2));
/// assert_eq!(next_token("  set 10 20", 2), Some(9));
/// assert_eq!(next_token("  set 10 20", 3), None);
/// ```
pub fn next_token(line: &str, skip: usize) -> Option<usize> {
    let b = line.as_bytes();
    let spaces = |mut i: usize| {
        while i < b.len() && b[i] == b' ' {
            i += 1;
        }
        i
    };

    let mut i = spaces(0);
    if i == b.len() {
        return None;
    }
    for _ in 0..skip {
        while i < b.len() && b[i] != b' ' {
            i += 1;
        }
        i = spaces(i);
        if i == b.len() {
            return None;
        }
    }
    Some(i)
}

/// Returns the token starting at the beginning of `text` (after any leading
/// spaces), or `None` if there isn't one.
///
/// ```
/// # use cadence_cli::token;
/// assert_eq!(token(" 10 20"), Some("10"));
/// assert_eq!(token("   "), None);
/// ```
pub fn token(text: &str) -> Option<&str> {
    let start = next_token(text, 0)?;
    let rest = &text[start..];
    let end = rest.find(' ').unwrap_or(rest.len());
    Some(&rest[..end])
}
