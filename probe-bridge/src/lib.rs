//! # Driving debug adapters at the bit level
//!
//! probe-bridge connects a debug host to JTAG/SWD debug adapters. It binds an adapter
//! driver, manages the adapter's named signals, selects a transport and translates debug
//! port register accesses into the bit sequences clocked by the adapter.
//!
//! # Examples
//!
//! ## Reading the IDCODE through the dummy adapter
//! ```
//! # use probe_bridge::Error;
//! use probe_bridge::Session;
//!
//! let mut session = Session::new();
//!
//! // Bind the adapter driver. Its declared transports become the allow-list.
//! session.open_adapter("dummy")?;
//!
//! // Select and initialize SWD. Initialization reads the IDCODE.
//! session.select_transport("swd")?;
//! session.init_transport()?;
//!
//! let idcode = session.swd()?.read_idcode()?;
//! assert_eq!(idcode, 0x2ba0_1477);
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Running commands
//! ```
//! use probe_bridge::{CommandOutput, CommandTable, Session};
//!
//! let commands = CommandTable::with_builtin();
//! let mut session = Session::new();
//! let mut output = CommandOutput::new();
//!
//! commands.execute_line(&mut session, "reset_config srst_only", &mut output)?;
//! assert_eq!(output.lines(), ["srst_only separate srst_gates_jtag srst_open_drain"]);
//! # Ok::<(), probe_bridge::CommandError>(())
//! ```

pub mod adapter;
pub mod command;
mod error;
pub mod session;
pub mod transport;

pub use crate::adapter::{
    signal::{Signal, SignalError, SignalList, SignalValue},
    Adapter, AdapterDriver, AdapterError, DebugAdapter, FakeAdapter, ResetConfig,
    ResetConfigError,
};
pub use crate::command::{CommandError, CommandOutput, CommandRegistration, CommandTable};
pub use crate::error::Error;
pub use crate::session::Session;
pub use crate::transport::{
    swd::{SwdError, SwdInterface, SwdLogLevel, SwdSettings, SwdTransport},
    Transport, TransportError, TransportRegistry,
};
