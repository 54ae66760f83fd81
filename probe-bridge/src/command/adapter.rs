//! Adapter binding, clock and reset commands.

use super::{parse_number, CommandError, CommandOutput, CommandRegistration};
use crate::{error::Error, session::Session};

pub(super) static COMMANDS: &[CommandRegistration] = &[
    CommandRegistration {
        name: "interface",
        usage: "<driver>",
        help: "Select the debug adapter driver. Only the first selection in a session takes effect.",
        min_args: 1,
        max_args: Some(1),
        handler: interface,
    },
    CommandRegistration {
        name: "interface_list",
        usage: "",
        help: "List the available debug adapter drivers.",
        min_args: 0,
        max_args: Some(0),
        handler: interface_list,
    },
    CommandRegistration {
        name: "adapter_name",
        usage: "",
        help: "Print the name of the selected debug adapter.",
        min_args: 0,
        max_args: Some(0),
        handler: adapter_name,
    },
    CommandRegistration {
        name: "adapter_khz",
        usage: "[kHz]",
        help: "Set or print the adapter clock. 0 selects adaptive clocking (RCLK).",
        min_args: 0,
        max_args: Some(1),
        handler: adapter_khz,
    },
    CommandRegistration {
        name: "adapter_nsrst_delay",
        usage: "[milliseconds]",
        help: "Set or print the delay after SRST is deasserted.",
        min_args: 0,
        max_args: Some(1),
        handler: adapter_nsrst_delay,
    },
    CommandRegistration {
        name: "adapter_nsrst_assert_width",
        usage: "[milliseconds]",
        help: "Set or print how long SRST is held asserted.",
        min_args: 0,
        max_args: Some(1),
        handler: adapter_nsrst_assert_width,
    },
    CommandRegistration {
        name: "reset_config",
        usage: "[none|trst_only|srst_only|trst_and_srst] [srst_pulls_trst|trst_pulls_srst|combined|separate] [srst_gates_jtag|srst_nogate] [trst_push_pull|trst_open_drain] [srst_push_pull|srst_open_drain]",
        help: "Update the reset configuration and print it. Tokens may be given in any order.",
        min_args: 0,
        max_args: None,
        handler: reset_config,
    },
];

fn interface(
    session: &mut Session,
    args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    let name = args[0];

    match session.open_adapter(name) {
        Ok(_) => Ok(()),
        Err(error @ Error::UnknownDriver(_)) => {
            tracing::error!("The specified debug interface was not found ({name})");
            interface_list(session, &[], output)?;
            Err(error.into())
        }
        Err(error) => Err(error.into()),
    }
}

fn interface_list(
    session: &mut Session,
    _args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    output.print("The following debug interfaces are available:");
    for (i, driver) in session.drivers().iter().enumerate() {
        output.print(format!("{}: {}", i + 1, driver.name()));
    }
    Ok(())
}

fn adapter_name(
    session: &mut Session,
    _args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    output.print(session.adapter().map_or("undefined", |adapter| adapter.name()));
    Ok(())
}

fn adapter_khz(
    session: &mut Session,
    args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    if let Some(argument) = args.first() {
        session.set_adapter_khz(parse_number(argument)?)?;
    }

    match session.adapter_khz()? {
        0 => output.print("RCLK - adaptive"),
        khz => output.print(format!("{khz} kHz")),
    }
    Ok(())
}

fn adapter_nsrst_delay(
    session: &mut Session,
    args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    if let Some(argument) = args.first() {
        session.set_nsrst_delay(parse_number(argument)?);
    }

    output.print(format!(
        "adapter_nsrst_delay: {}",
        session.reset_timing().nsrst_delay_ms
    ));
    Ok(())
}

fn adapter_nsrst_assert_width(
    session: &mut Session,
    args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    if let Some(argument) = args.first() {
        session.set_nsrst_assert_width(parse_number(argument)?);
    }

    output.print(format!(
        "adapter_nsrst_assert_width: {}",
        session.reset_timing().nsrst_assert_width_ms
    ));
    Ok(())
}

fn reset_config(
    session: &mut Session,
    args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    let config = session.update_reset_config(args).map_err(|error| {
        tracing::error!("{error}");
        error
    })?;

    output.print(config.to_string());
    Ok(())
}
