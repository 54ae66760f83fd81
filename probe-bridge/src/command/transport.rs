//! Transport selection and SWD commands.

use super::{parse_number, CommandError, CommandOutput, CommandRegistration};
use crate::{
    error::Error,
    session::Session,
    transport::{
        swd::{
            queue::{PortType, SwdCommand},
            SwdError, SwdInterface, SwdLogLevel,
        },
        TransportError,
    },
};

const TRANSPORT_USAGE: &str = "list | select [name] | init";
const SWD_USAGE: &str =
    "loglevel [0..5|inherit] | idcode | dp_read <reg> | dp_write <reg> <value> | ap_read <reg> | ap_write <reg> <value>";

pub(super) static COMMANDS: &[CommandRegistration] = &[
    CommandRegistration {
        name: "interface_transports",
        usage: "<transport> ...",
        help: "Declare the transports the debug adapter may use in this session.",
        min_args: 1,
        max_args: None,
        handler: interface_transports,
    },
    CommandRegistration {
        name: "transport",
        usage: TRANSPORT_USAGE,
        help: "List, select or initialize the transport of this session.",
        min_args: 1,
        max_args: Some(2),
        handler: transport,
    },
    CommandRegistration {
        name: "swd",
        usage: SWD_USAGE,
        help: "Access the SWD transport.",
        min_args: 1,
        max_args: Some(3),
        handler: swd,
    },
];

fn interface_transports(
    session: &mut Session,
    args: &[&str],
    _output: &mut CommandOutput,
) -> Result<(), CommandError> {
    session.allow_transports(args)?;
    Ok(())
}

fn transport(
    session: &mut Session,
    args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    match args {
        ["list"] => {
            output.print("The following transports are available:");
            let names: Vec<_> = session.transports().names().collect();
            for name in names {
                output.print(format!("\t{name}"));
            }
        }
        ["select"] => {
            let current = session
                .transports()
                .current()
                .ok_or(Error::from(TransportError::NotSelected))?;
            output.print(current);
        }
        ["select", name] => {
            session.select_transport(name)?;
            output.print(*name);
        }
        ["init"] => session.init_transport()?,
        _ => {
            return Err(CommandError::Syntax {
                command: "transport",
                usage: TRANSPORT_USAGE,
            })
        }
    }

    Ok(())
}

fn swd(
    session: &mut Session,
    args: &[&str],
    output: &mut CommandOutput,
) -> Result<(), CommandError> {
    match args {
        ["loglevel"] => {
            let level = session.swd_context_mut()?.log_level();
            output.print(format!(
                "Current SWD log level [0..5] is: {} ({level})",
                level as u8
            ));
            output.print("Available values:");
            for level in SwdLogLevel::ALL {
                output.print(format!(" {} ({level})", level as u8));
            }
        }
        ["loglevel", "inherit"] => {
            let level = SwdLogLevel::inherited();
            session.swd_context_mut()?.set_log_level(level);
            output.print(format!(
                "Using host log settings, SWD log level [0..5] set to: {} ({level})",
                level as u8
            ));
        }
        ["loglevel", value] => {
            let number = u8::try_from(parse_number(value)?)
                .map_err(|_| CommandError::invalid(value, "not within 0..=5"))?;
            let level = SwdLogLevel::try_from(number).map_err(Error::from)?;
            session.swd_context_mut()?.set_log_level(level);
            output.print(format!(
                "Setting SWD log level [0..5] to: {} ({level})",
                level as u8
            ));
        }
        ["idcode"] => {
            let idcode = session.swd()?.read_idcode().map_err(Error::from)?;
            output.print(format!("IDCODE: {idcode:#010x}"));
        }
        ["dp_read", register] => {
            let register = parse_register(register)?;
            let value = read_register(&mut session.swd()?, PortType::DebugPort, register)
                .map_err(Error::from)?;
            output.print(format!("{value:#010x}"));
        }
        ["ap_read", register] => {
            let register = parse_register(register)?;
            let value = read_register(&mut session.swd()?, PortType::AccessPort, register)
                .map_err(Error::from)?;
            output.print(format!("{value:#010x}"));
        }
        ["dp_write", register, value] => {
            let register = parse_register(register)?;
            let value = parse_number(value)?;
            let mut swd = session.swd()?;
            swd.queue_dp_write(register, value).map_err(Error::from)?;
            swd.run().map_err(Error::from)?;
        }
        ["ap_write", register, value] => {
            let register = parse_register(register)?;
            let value = parse_number(value)?;
            let mut swd = session.swd()?;
            swd.queue_ap_write(register, value).map_err(Error::from)?;
            swd.run().map_err(Error::from)?;
        }
        _ => {
            return Err(CommandError::Syntax {
                command: "swd",
                usage: SWD_USAGE,
            })
        }
    }

    Ok(())
}

fn parse_register(argument: &str) -> Result<u8, CommandError> {
    u8::try_from(parse_number(argument)?)
        .map_err(|_| CommandError::invalid(argument, "register addresses are 0x0, 0x4, 0x8 or 0xc"))
}

fn read_register(
    swd: &mut SwdInterface<'_>,
    port: PortType,
    address: u8,
) -> Result<u32, SwdError> {
    let index = match port {
        PortType::DebugPort => swd.queue_dp_read(address)?,
        PortType::AccessPort => swd.queue_ap_read(address)?,
    };

    swd.run()?
        .take(index)
        .map_err(|_| SwdError::MissingResult(SwdCommand::Read { port, address }))
}
