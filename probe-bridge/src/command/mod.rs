//! The command surface of a session.
//!
//! Commands are plain entries of a [`CommandTable`], each mapping a name to a handler
//! function together with its arity and help text. A command line is split on
//! whitespace; the first word selects the command and the rest are its arguments.

mod adapter;
mod signal;
mod transport;

use indexmap::IndexMap;
use std::fmt;

use crate::{error::Error, session::Session};

/// The handler of a command.
///
/// Lines meant for the user are pushed to `output`; diagnostics go to the log.
pub type CommandHandler =
    fn(session: &mut Session, args: &[&str], output: &mut CommandOutput) -> Result<(), CommandError>;

/// A command and its metadata.
#[derive(Clone, Copy)]
pub struct CommandRegistration {
    /// The word that invokes the command. Case sensitive.
    pub name: &'static str,
    /// The arguments, as shown in usage messages.
    pub usage: &'static str,
    pub help: &'static str,
    /// The minimum number of arguments.
    pub min_args: usize,
    /// The maximum number of arguments, `None` if unbounded.
    pub max_args: Option<usize>,
    pub handler: CommandHandler,
}

impl CommandRegistration {
    fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

impl fmt::Debug for CommandRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistration")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish()
    }
}

impl fmt::Display for CommandRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.usage.is_empty() {
            write!(f, " {}", self.usage)?;
        }
        write!(f, ": {}", self.help)
    }
}

/// An error which can occur when running a command.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum CommandError {
    /// Unknown command '{0}'.
    Unknown(String),

    /// Invalid syntax, usage: {command} {usage}
    Syntax {
        command: &'static str,
        usage: &'static str,
    },

    /// Invalid argument '{argument}': {reason}.
    InvalidArgument { argument: String, reason: String },

    /// The command '{0}' is already registered.
    DuplicateCommand(&'static str),

    /// {0}
    Failed(#[from] Error),
}

impl CommandError {
    fn invalid(argument: &str, reason: impl Into<String>) -> Self {
        CommandError::InvalidArgument {
            argument: argument.to_string(),
            reason: reason.into(),
        }
    }
}

/// Lines printed by commands.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    lines: Vec<String>,
}

impl CommandOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Removes and returns all printed lines.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// The commands available in a session, in registration order.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: IndexMap<&'static str, CommandRegistration>,
}

impl CommandTable {
    /// Creates a table without any commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with all commands of this crate.
    pub fn with_builtin() -> Self {
        let mut table = Self::new();
        for command in adapter::COMMANDS
            .iter()
            .chain(signal::COMMANDS)
            .chain(transport::COMMANDS)
        {
            table.commands.insert(command.name, *command);
        }
        table
    }

    /// Adds a command. Names must be unique.
    pub fn register(&mut self, command: CommandRegistration) -> Result<(), CommandError> {
        if self.commands.contains_key(command.name) {
            return Err(CommandError::DuplicateCommand(command.name));
        }
        self.commands.insert(command.name, command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CommandRegistration> {
        self.commands.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandRegistration> {
        self.commands.values()
    }

    /// Runs a command with already split arguments.
    pub fn execute(
        &self,
        session: &mut Session,
        name: &str,
        args: &[&str],
        output: &mut CommandOutput,
    ) -> Result<(), CommandError> {
        let command = self
            .get(name)
            .ok_or_else(|| CommandError::Unknown(name.to_string()))?;

        if !command.accepts(args.len()) {
            return Err(syntax(command));
        }

        tracing::debug!("Running '{name}' with {args:?}");
        (command.handler)(session, args, output)
    }

    /// Splits a command line and runs it. Empty lines and lines starting with `#` are
    /// ignored.
    pub fn execute_line(
        &self,
        session: &mut Session,
        line: &str,
        output: &mut CommandOutput,
    ) -> Result<(), CommandError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next().filter(|name| !name.starts_with('#')) else {
            return Ok(());
        };
        let args: Vec<&str> = words.collect();

        self.execute(session, name, &args, output)
    }
}

fn syntax(command: &CommandRegistration) -> CommandError {
    CommandError::Syntax {
        command: command.name,
        usage: command.usage,
    }
}

/// Parses a decimal, `0x` hexadecimal or `0b` binary number.
fn parse_number(argument: &str) -> Result<u32, CommandError> {
    parse_int::parse::<u32>(argument).map_err(|e| CommandError::invalid(argument, e.to_string()))
}

/// Parses a hexadecimal value, with or without a `0x` prefix.
fn parse_hex(argument: &str) -> Result<u32, CommandError> {
    let digits = argument
        .strip_prefix("0x")
        .or_else(|| argument.strip_prefix("0X"))
        .unwrap_or(argument);
    u32::from_str_radix(digits, 16)
        .map_err(|_| CommandError::invalid(argument, "expected a hexadecimal value"))
}
