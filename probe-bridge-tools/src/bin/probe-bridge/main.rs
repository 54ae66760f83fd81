mod config;
mod util;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use probe_bridge::{CommandOutput, CommandTable, Session};

use crate::config::ToolConfig;
use crate::util::logging::{log_file_location, setup_logging, LevelFilter};

#[derive(clap::Parser)]
#[clap(
    name = "probe-bridge",
    about = "Bind a debug adapter, select a transport and run commands against it",
    version
)]
struct Cli {
    /// Location for log file
    ///
    /// If no location is specified, the behaviour depends on `--log-to-folder` and the
    /// `log_file` setting of the configuration.
    #[clap(long, help_heading = "LOG CONFIGURATION")]
    log_file: Option<PathBuf>,
    /// Log to a new file in the default log folder. Ignored if `--log-file` is specified.
    #[clap(long, help_heading = "LOG CONFIGURATION")]
    log_to_folder: bool,
    /// Log level of the console output. Overrides the configuration and RUST_LOG.
    #[clap(long, value_enum, help_heading = "LOG CONFIGURATION")]
    log_level: Option<LevelFilter>,
    /// Configuration file applied after the default locations (.toml, .json or .yaml)
    #[clap(long, short = 'f', value_name = "PATH")]
    config: Option<PathBuf>,
    /// Command to run after the configuration has been applied. May be given multiple times.
    #[clap(long = "command", short = 'c', value_name = "COMMAND")]
    commands: Vec<String>,
    /// List the available commands and exit
    #[clap(long)]
    list_commands: bool,
}

fn main() {
    if let Err(error) = run(Cli::parse()) {
        eprintln!("{} {:?}", "Error:".red().bold(), error);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ToolConfig::load(cli.config.as_deref()).context("Failed to load configuration.")?;

    let log_path = log_file_location(
        cli.log_file.as_deref(),
        cli.log_to_folder,
        config.log_file.as_deref(),
    )
    .context("Unable to determine the log file location.")?;
    let _logger_guard = setup_logging(log_path, cli.log_level.or(config.log_level))
        .context("Failed to set up logging.")?;

    let commands = CommandTable::with_builtin();

    if cli.list_commands {
        for command in commands.iter() {
            println!("{command}");
        }
        return Ok(());
    }

    let mut session = Session::new();

    for line in config.startup_commands().iter().chain(&cli.commands) {
        run_line(&commands, &mut session, line)?;
    }

    Ok(())
}

fn run_line(commands: &CommandTable, session: &mut Session, line: &str) -> Result<()> {
    tracing::debug!("> {line}");

    let mut output = CommandOutput::new();
    let result = commands.execute_line(session, line, &mut output);

    for printed in output.lines() {
        println!("{printed}");
    }

    result.with_context(|| format!("Command '{}' failed.", line.trim().cyan()))
}
