//! Signal management and bitbanging.

use super::{parse_hex, CommandError, CommandOutput, CommandRegistration};
use crate::{
    adapter::{
        signal::{SignalError, SignalValue},
        AdapterError, Capability,
    },
    error::Error,
    session::Session,
};

const INTERFACE_SIGNAL_USAGE: &str = "add <name> <hex-mask> | del <name> | find <name> | list";
const BITBANG_USAGE: &str = "<name>[=<hex-value>|hi|set|lo|clr] ...";

pub(super) static COMMANDS: &[CommandRegistration] = &[
    CommandRegistration {
        name: "interface_signal",
        usage: INTERFACE_SIGNAL_USAGE,
        help: "Manage the named signals of the debug adapter.",
        min_args: 1,
        max_args: Some(3),
        handler: interface_signal,
    },
    CommandRegistration {
        name: "bitbang",
        usage: BITBANG_USAGE,
        help: "Read a signal, or write it when a value is given. Prints the value of each signal.",
        min_args: 1,
        max_args: None,
        handler: bitbang,
    },
];

fn interface_signal_syntax() -> CommandError {
    CommandError::Syntax {
        command: "interface_signal",
        usage: INTERFACE_SIGNAL_USAGE,
    }
}

fn interface_signal(
    session: &mut Session,
    args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    let adapter = session.adapter_mut()?;

    match args {
        ["add", name, mask] => {
            let mask = parse_hex(mask)?;
            adapter.signals_mut().add(name, mask).map_err(Error::from)?;
        }
        ["del", name] => {
            adapter.signals_mut().delete(name).map_err(Error::from)?;
        }
        ["find", name] => {
            let signal = adapter.signals().find(name).map_err(Error::from)?;
            output.print(signal.to_string());
        }
        ["list"] => {
            output.print("      Interface Signal Name      |    Mask    |   Value   ");
            output.print("----------------------------------------------------------");
            for signal in adapter.signals().iter() {
                output.print(format!(
                    "{:>32} | 0x{:08X} | 0x{:08X}",
                    signal.name(),
                    signal.mask(),
                    signal.value()
                ));
            }
            if !adapter.has_capability(Capability::Bitbang) {
                output.print("WARNING: This interface does not support bit-banging!");
            }
        }
        _ => return Err(interface_signal_syntax()),
    }

    Ok(())
}

fn bitbang(
    session: &mut Session,
    args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    let adapter = session.adapter_mut()?;

    if !adapter.has_capability(Capability::Bitbang) {
        tracing::error!("This interface does not support bit-banging!");
        return Err(Error::from(AdapterError::CapabilityMissing(Capability::Bitbang)).into());
    }

    if adapter.signals().is_empty() {
        return Err(Error::from(SignalError::NoSignals).into());
    }

    for argument in args {
        let (name, value) = match argument.split_once('=') {
            None => {
                let value = adapter.read_signal(argument).map_err(|error| {
                    tracing::error!("Unable to read signal: {argument}");
                    Error::from(error)
                })?;
                (*argument, value)
            }
            Some((name, value)) => {
                if value.is_empty() {
                    return Err(CommandError::invalid(
                        argument,
                        "no value specified, use hi, set, lo, clr, or a hexadecimal port value",
                    ));
                }
                let value: SignalValue = value.parse().map_err(Error::from)?;
                let value = adapter.write_signal(name, value).map_err(|error| {
                    tracing::error!("Unable to write signal: {name}");
                    Error::from(error)
                })?;
                (name, value)
            }
        };

        output.print(format!("{name}=0x{value:08X}"));
    }

    Ok(())
}
