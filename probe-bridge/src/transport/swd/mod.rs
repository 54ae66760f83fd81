//! The SWD transport, built from raw bit transfers and the `RnW` direction signal.
//!
//! Register accesses are queued on an [`SwdInterface`] and executed in FIFO order by
//! [`SwdInterface::run`]. Execution stops at the first failing operation; the operations
//! queued after it are discarded.

pub mod codec;
pub mod queue;
pub mod turnaround;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::level_filters::LevelFilter;

use self::{
    codec::ShiftOrder,
    queue::{DeferredResultIndex, DeferredResultSet, PortType, SwdCommand, SwdQueue},
};
use super::{Transport, TransportError};
use crate::adapter::{Adapter, AdapterError};

pub use self::queue::QueueState;

/// The bit sequence switching a target from JTAG to SWD, sent LSB first.
///
/// More than 50 cycles with SWDIO high, the 16-bit switch code, and another line reset.
pub const JTAG_TO_SWD_SEQUENCE: [u8; 16] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x9e, 0xe7, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff,
];

/// Idle cycles clocked after the line reset, before the first request.
pub const IDLE_CYCLES_AFTER_RESET: u8 = 8;

const ACK_OK: u8 = 0b001;
const ACK_WAIT: u8 = 0b010;
const ACK_FAULT: u8 = 0b100;
const ACK_NONE: u8 = 0b111;

/// An error which can occur on the SWD transport.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum SwdError {
    /// Invalid parameter: {0}.
    Parameter(String),

    /// A turnaround of {cycles} cycles is outside of the supported range {min}..={max}.
    Turnaround { cycles: u8, min: u8, max: u8 },

    /// The adapter driver reported an error.
    Driver(#[source] AdapterError),

    /// Target device responded with a WAIT response to the request.
    WaitResponse,

    /// Target device responded with a FAULT response to the request.
    FaultResponse,

    /// Target device did not respond to the request.
    NoAcknowledge,

    /// Target device responded with an invalid acknowledge {0:#05b}.
    InvalidAck(u8),

    /// Incorrect parity on READ request.
    IncorrectParity,

    /// {0} is not implemented.
    NotImplemented(&'static str),

    /// The SWD transport has not been selected.
    NotSelected,

    /// The queued read {0} produced no result.
    MissingResult(SwdCommand),

    /// {0}
    Batch(#[from] SwdBatchError),
}

#[derive(Debug, thiserror::Error, docsplay::Display)]
/// Queued operation #{position}, {command}, failed
#[ignore_extra_doc_attributes]
///
/// The operations queued after it were discarded.
pub struct SwdBatchError {
    /// Zero-based position of the failed operation in the flushed queue.
    pub position: usize,
    /// The failed operation.
    pub command: SwdCommand,
    /// Why it failed.
    #[source]
    pub source: Box<SwdError>,
}

/// Verbosity of the SWD session, kept separately from the host log filter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SwdLogLevel {
    Silent = 0,
    Error = 1,
    Warning = 2,
    #[default]
    Normal = 3,
    Info = 4,
    /// Every executed request with its acknowledge and data.
    Payload = 5,
}

impl SwdLogLevel {
    /// All levels, from least to most verbose.
    pub const ALL: [SwdLogLevel; 6] = [
        SwdLogLevel::Silent,
        SwdLogLevel::Error,
        SwdLogLevel::Warning,
        SwdLogLevel::Normal,
        SwdLogLevel::Info,
        SwdLogLevel::Payload,
    ];

    /// The level matching the current maximum level of the host logger.
    pub fn inherited() -> Self {
        Self::from(LevelFilter::current())
    }
}

impl From<LevelFilter> for SwdLogLevel {
    fn from(filter: LevelFilter) -> Self {
        match filter {
            LevelFilter::OFF => SwdLogLevel::Silent,
            LevelFilter::ERROR => SwdLogLevel::Error,
            LevelFilter::WARN => SwdLogLevel::Warning,
            LevelFilter::INFO => SwdLogLevel::Info,
            _ => SwdLogLevel::Payload,
        }
    }
}

impl TryFrom<u8> for SwdLogLevel {
    type Error = SwdError;

    fn try_from(value: u8) -> Result<Self, SwdError> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| SwdError::Parameter(format!("log level {value} is not within 0..=5")))
    }
}

impl fmt::Display for SwdLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwdLogLevel::Silent => "silent",
            SwdLogLevel::Error => "error",
            SwdLogLevel::Warning => "warning",
            SwdLogLevel::Normal => "normal",
            SwdLogLevel::Info => "info",
            SwdLogLevel::Payload => "payload",
        };
        f.write_str(name)
    }
}

/// Timing settings of the SWD transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwdSettings {
    /// Cycles clocked on every change of the data line direction.
    pub turnaround_cycles: u8,
    /// Idle cycles clocked after the last operation of a flushed queue.
    pub idle_cycles_after_transfer: u8,
}

impl Default for SwdSettings {
    fn default() -> Self {
        Self {
            turnaround_cycles: 1,
            idle_cycles_after_transfer: 8,
        }
    }
}

/// The session context of the SWD transport.
#[derive(Debug)]
pub struct SwdContext {
    queue: SwdQueue,
    log_level: SwdLogLevel,
    settings: SwdSettings,
    idcode: Option<u32>,
}

impl SwdContext {
    fn new(settings: SwdSettings, log_level: SwdLogLevel) -> Self {
        Self {
            queue: SwdQueue::new(),
            log_level,
            settings,
            idcode: None,
        }
    }

    pub fn log_level(&self) -> SwdLogLevel {
        self.log_level
    }

    pub fn set_log_level(&mut self, level: SwdLogLevel) {
        self.log_level = level;
    }

    pub fn settings(&self) -> &SwdSettings {
        &self.settings
    }

    /// The IDCODE found during initialization.
    pub fn idcode(&self) -> Option<u32> {
        self.idcode
    }

    pub fn queue(&self) -> &SwdQueue {
        &self.queue
    }
}

/// The SWD transport.
///
/// The session context is created on the first selection and reused afterwards.
#[derive(Debug, Default)]
pub struct SwdTransport {
    settings: SwdSettings,
    context: Option<Box<SwdContext>>,
}

impl SwdTransport {
    pub const NAME: &'static str = "swd";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: SwdSettings) -> Self {
        Self {
            settings,
            context: None,
        }
    }

    pub fn context(&self) -> Option<&SwdContext> {
        self.context.as_deref()
    }

    pub fn context_mut(&mut self) -> Option<&mut SwdContext> {
        self.context.as_deref_mut()
    }

    /// Combines the session context with the adapter for register access.
    pub fn interface<'a>(
        &'a mut self,
        adapter: &'a mut Adapter,
    ) -> Result<SwdInterface<'a>, SwdError> {
        let context = self.context.as_deref_mut().ok_or(SwdError::NotSelected)?;
        Ok(SwdInterface { context, adapter })
    }
}

impl Transport for SwdTransport {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn select(&mut self) -> Result<(), TransportError> {
        let level = SwdLogLevel::inherited();

        match self.context.as_deref_mut() {
            Some(context) => {
                tracing::debug!("Reusing SWD context, log level {level}");
                context.log_level = level;
            }
            None => {
                tracing::debug!("Creating SWD context, log level {level}");
                self.context = Some(Box::new(SwdContext::new(self.settings, level)));
            }
        }

        Ok(())
    }

    fn init(&mut self, adapter: &mut Adapter) -> Result<(), TransportError> {
        let mut swd = self.interface(adapter)?;
        let idcode = swd.connect()?;

        tracing::info!("SWD transport initialization complete. Found IDCODE={idcode:#010x}.");

        Ok(())
    }

    fn as_swd(&self) -> Option<&SwdTransport> {
        Some(self)
    }

    fn as_swd_mut(&mut self) -> Option<&mut SwdTransport> {
        Some(self)
    }
}

fn check_address(address: u8) -> Result<u8, SwdError> {
    if address & !0x0c == 0 {
        Ok(address)
    } else {
        Err(SwdError::Parameter(format!(
            "register address {address:#x} is not one of 0x0, 0x4, 0x8 or 0xc"
        )))
    }
}

fn check_ack(ack: u8) -> Result<(), SwdError> {
    match ack {
        ACK_OK => Ok(()),
        ACK_WAIT => Err(SwdError::WaitResponse),
        ACK_FAULT => Err(SwdError::FaultResponse),
        ACK_NONE => Err(SwdError::NoAcknowledge),
        other => Err(SwdError::InvalidAck(other)),
    }
}

fn parity(value: u32) -> u8 {
    (value.count_ones() % 2) as u8
}

/// Register access through the SWD transport of a session.
#[derive(Debug)]
pub struct SwdInterface<'a> {
    context: &'a mut SwdContext,
    adapter: &'a mut Adapter,
}

impl SwdInterface<'_> {
    pub fn context(&self) -> &SwdContext {
        &*self.context
    }

    pub fn context_mut(&mut self) -> &mut SwdContext {
        &mut *self.context
    }

    /// The number of queued operations.
    pub fn queued(&self) -> usize {
        self.context.queue.len()
    }

    /// Queues a read of the IDCODE register.
    pub fn queue_idcode_read(&mut self) -> DeferredResultIndex {
        self.context.queue.schedule(SwdCommand::Read {
            port: PortType::DebugPort,
            address: 0x0,
        })
    }

    pub fn queue_dp_read(&mut self, address: u8) -> Result<DeferredResultIndex, SwdError> {
        self.queue_read(PortType::DebugPort, address)
    }

    pub fn queue_dp_write(&mut self, address: u8, value: u32) -> Result<(), SwdError> {
        self.queue_write(PortType::DebugPort, address, value)
    }

    /// Queues an access port read.
    ///
    /// AP reads are posted: the data returned is the result of the previous AP read.
    pub fn queue_ap_read(&mut self, address: u8) -> Result<DeferredResultIndex, SwdError> {
        self.queue_read(PortType::AccessPort, address)
    }

    pub fn queue_ap_write(&mut self, address: u8, value: u32) -> Result<(), SwdError> {
        self.queue_write(PortType::AccessPort, address, value)
    }

    /// Aborting access port transactions is not supported.
    pub fn queue_ap_abort(&mut self) -> Result<(), SwdError> {
        tracing::error!("queue_ap_abort is not implemented");
        Err(SwdError::NotImplemented("queue_ap_abort"))
    }

    fn queue_read(
        &mut self,
        port: PortType,
        address: u8,
    ) -> Result<DeferredResultIndex, SwdError> {
        let address = check_address(address)?;
        Ok(self.context.queue.schedule(SwdCommand::Read { port, address }))
    }

    fn queue_write(&mut self, port: PortType, address: u8, value: u32) -> Result<(), SwdError> {
        let address = check_address(address)?;
        // Writes have no result, so the index is dropped right away.
        self.context.queue.schedule(SwdCommand::Write {
            port,
            address,
            value,
        });
        Ok(())
    }

    /// Executes all queued operations in order.
    ///
    /// The queue is empty afterwards, also when an operation failed.
    pub fn run(&mut self) -> Result<DeferredResultSet<u32>, SwdError> {
        let commands = self.context.queue.begin_flush();
        tracing::debug!("Flushing {} queued SWD operations", commands.len());

        let mut results = DeferredResultSet::new();

        for (position, (index, command)) in commands.into_iter().enumerate() {
            match self.execute(command) {
                Ok(Some(value)) if index.should_capture() => results.push(&index, value),
                Ok(_) => {}
                Err(error) => {
                    self.context.queue.end_flush();
                    tracing::debug!("{command} failed: {error}");
                    return Err(SwdBatchError {
                        position,
                        command,
                        source: Box::new(error),
                    }
                    .into());
                }
            }
        }

        let idle = self.idle(self.context.settings.idle_cycles_after_transfer);
        self.context.queue.end_flush();
        idle?;

        Ok(results)
    }

    fn execute(&mut self, command: SwdCommand) -> Result<Option<u32>, SwdError> {
        let trn = self.context.settings.turnaround_cycles;
        let request = command.request();

        codec::mosi_8(self.adapter, request, 8, ShiftOrder::LsbFirst)?;
        turnaround::miso_trn(self.adapter, trn)?;
        let ack = codec::miso_8(self.adapter, 3, ShiftOrder::LsbFirst)?;

        if let Err(error) = check_ack(ack) {
            turnaround::mosi_trn(self.adapter, trn)?;
            return Err(error);
        }

        match command {
            SwdCommand::Read { .. } => {
                let value = codec::miso_32(self.adapter, 32, ShiftOrder::LsbFirst)?;
                let received_parity = codec::miso_8(self.adapter, 1, ShiftOrder::LsbFirst)?;
                turnaround::mosi_trn(self.adapter, trn)?;

                if self.context.log_level >= SwdLogLevel::Payload {
                    tracing::debug!(
                        "{command}: request={request:#04x} ack={ack:#05b} data={value:#010x}"
                    );
                }

                if received_parity != parity(value) {
                    return Err(SwdError::IncorrectParity);
                }

                Ok(Some(value))
            }
            SwdCommand::Write { value, .. } => {
                turnaround::mosi_trn(self.adapter, trn)?;
                codec::mosi_32(self.adapter, value, 32, ShiftOrder::LsbFirst)?;
                codec::mosi_8(self.adapter, parity(value), 1, ShiftOrder::LsbFirst)?;

                if self.context.log_level >= SwdLogLevel::Payload {
                    tracing::debug!("{command}: request={request:#04x} ack={ack:#05b}");
                }

                Ok(None)
            }
        }
    }

    /// Clocks idle cycles with the host driving the line low.
    pub fn idle(&mut self, cycles: u8) -> Result<(), SwdError> {
        let mut remaining = usize::from(cycles);
        while remaining > 0 {
            let bits = remaining.min(8);
            codec::mosi_8(self.adapter, 0, bits, ShiftOrder::LsbFirst)?;
            remaining -= bits;
        }
        Ok(())
    }

    /// Sends the JTAG-to-SWD switch sequence.
    pub fn switch_from_jtag(&mut self) -> Result<(), SwdError> {
        tracing::debug!("Switching from JTAG to SWD");
        for byte in JTAG_TO_SWD_SEQUENCE {
            codec::mosi_8(self.adapter, byte, 8, ShiftOrder::LsbFirst)?;
        }
        Ok(())
    }

    /// Reads the IDCODE register right away.
    pub fn read_idcode(&mut self) -> Result<u32, SwdError> {
        let index = self.queue_idcode_read();
        self.run()?.take(index).map_err(|_| {
            SwdError::MissingResult(SwdCommand::Read {
                port: PortType::DebugPort,
                address: 0x0,
            })
        })
    }

    /// Switches the target to SWD and reads its IDCODE.
    ///
    /// Fails when the target does not respond.
    pub fn connect(&mut self) -> Result<u32, SwdError> {
        self.switch_from_jtag()?;
        self.idle(IDLE_CYCLES_AFTER_RESET)?;

        let idcode = self.read_idcode()?;
        self.context.idcode = Some(idcode);

        Ok(idcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        fake_adapter::{FakeOperation, DUMMY_IDCODE},
        BitDirection, FakeAdapter,
    };
    use parking_lot::Mutex;
    use std::{io, sync::Arc};
    use test_case::test_case;

    fn selected_transport() -> (FakeAdapter, Adapter, SwdTransport) {
        let fake = FakeAdapter::new().with_signal(turnaround::DIRECTION_SIGNAL, 0x100);
        let adapter = Adapter::new(Box::new(fake.clone()));
        let mut transport = SwdTransport::new();
        transport.select().unwrap();
        (fake, adapter, transport)
    }

    /// The request headers sent so far, in order.
    fn requests(fake: &FakeAdapter) -> Vec<u8> {
        fake.transfers()
            .iter()
            .filter_map(|op| match op {
                FakeOperation::Transfer {
                    direction: BitDirection::Mosi,
                    mosi,
                } if mosi.len() == 8 => op.mosi_value().map(|v| v as u8),
                _ => None,
            })
            .filter(|request| request & 0x01 == 0x01 && request & 0x40 == 0)
            .collect()
    }

    #[test]
    fn select_reuses_context() {
        let mut transport = SwdTransport::new();
        transport.select().unwrap();
        let first: *const SwdContext = transport.context().unwrap();

        transport.select().unwrap();
        let second: *const SwdContext = transport.context().unwrap();

        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn interface_requires_selection() {
        let mut adapter = Adapter::new(Box::new(FakeAdapter::new()));
        let mut transport = SwdTransport::new();

        assert!(matches!(
            transport.interface(&mut adapter),
            Err(SwdError::NotSelected)
        ));
    }

    #[test]
    fn operations_execute_in_fifo_order() {
        let (fake, mut adapter, mut transport) = selected_transport();
        fake.add_ack(ACK_OK);
        fake.add_read_data(0x1111_1111);
        fake.add_ack(ACK_OK);
        fake.add_ack(ACK_OK);
        fake.add_read_data(0x3333_3333);

        let mut swd = transport.interface(&mut adapter).unwrap();
        let first = swd.queue_dp_read(0x4).unwrap();
        swd.queue_dp_write(0x8, 0x0000_00f0).unwrap();
        let third = swd.queue_ap_read(0xc).unwrap();
        pretty_assertions::assert_eq!(swd.queued(), 3);

        let mut results = swd.run().unwrap();

        pretty_assertions::assert_eq!(results.len(), 2);
        pretty_assertions::assert_eq!(results.take(first).unwrap(), 0x1111_1111);
        pretty_assertions::assert_eq!(results.take(third).unwrap(), 0x3333_3333);
        pretty_assertions::assert_eq!(swd.queued(), 0);
        pretty_assertions::assert_eq!(swd.context().queue().state(), QueueState::Building);
        pretty_assertions::assert_eq!(requests(&fake), vec![0x8d, 0xb1, 0x9f]);
    }

    #[test]
    fn write_sends_data_and_parity() {
        let (fake, mut adapter, mut transport) = selected_transport();
        fake.add_ack(ACK_OK);

        let mut swd = transport.interface(&mut adapter).unwrap();
        swd.queue_ap_write(0x4, 0x0000_0007).unwrap();
        swd.run().unwrap();

        let mosi: Vec<_> = fake
            .transfers()
            .iter()
            .filter(|op| {
                matches!(op, FakeOperation::Transfer { direction: BitDirection::Mosi, mosi } if mosi.len() != 8)
            })
            .filter_map(FakeOperation::mosi_value)
            .collect();

        pretty_assertions::assert_eq!(mosi, vec![0x0000_0007, 1]);
    }

    #[test]
    fn failure_aborts_remaining_operations() {
        let (fake, mut adapter, mut transport) = selected_transport();
        fake.add_ack(ACK_OK);
        fake.add_read_data(0x1234_5678);
        fake.add_ack(ACK_FAULT);

        let mut swd = transport.interface(&mut adapter).unwrap();
        let _first = swd.queue_dp_read(0x4).unwrap();
        swd.queue_ap_write(0x0, 0xdead_beef).unwrap();
        let _third = swd.queue_dp_read(0xc).unwrap();

        let error = swd.run().unwrap_err();

        let SwdError::Batch(batch) = error else {
            panic!("expected a batch error, got {error:?}");
        };
        pretty_assertions::assert_eq!(batch.position, 1);
        pretty_assertions::assert_eq!(
            batch.command,
            SwdCommand::Write {
                port: PortType::AccessPort,
                address: 0x0,
                value: 0xdead_beef
            }
        );
        assert!(matches!(*batch.source, SwdError::FaultResponse));
        pretty_assertions::assert_eq!(swd.queued(), 0);
        pretty_assertions::assert_eq!(requests(&fake), vec![0x8d, 0xa3]);
    }

    #[test]
    fn driver_failure_aborts_queue() {
        let (fake, mut adapter, mut transport) = selected_transport();
        fake.fail_transfer_after(0);

        let mut swd = transport.interface(&mut adapter).unwrap();
        let _idcode = swd.queue_idcode_read();

        let Err(SwdError::Batch(batch)) = swd.run() else {
            panic!("expected a batch error");
        };
        pretty_assertions::assert_eq!(batch.position, 0);
        assert!(matches!(*batch.source, SwdError::Driver(_)));
    }

    #[test]
    fn parity_error_is_detected() {
        let (fake, mut adapter, mut transport) = selected_transport();
        fake.add_ack(ACK_OK);
        fake.add_read_data_with_parity(0x0000_0001, false);

        let mut swd = transport.interface(&mut adapter).unwrap();
        let _idcode = swd.queue_idcode_read();

        let Err(SwdError::Batch(batch)) = swd.run() else {
            panic!("expected a batch error");
        };
        assert!(matches!(*batch.source, SwdError::IncorrectParity));
    }

    #[test_case(ACK_WAIT => "WaitResponse"; "wait")]
    #[test_case(ACK_FAULT => "FaultResponse"; "fault")]
    #[test_case(ACK_NONE => "NoAcknowledge"; "no acknowledge")]
    #[test_case(0b110 => "InvalidAck(6)"; "invalid")]
    fn acknowledge_errors(ack: u8) -> String {
        format!("{:?}", check_ack(ack).unwrap_err())
    }

    #[test_case(0x1; "unaligned")]
    #[test_case(0x10; "out of range")]
    fn invalid_register_address(address: u8) {
        let (fake, mut adapter, mut transport) = selected_transport();
        let mut swd = transport.interface(&mut adapter).unwrap();

        assert!(matches!(
            swd.queue_dp_read(address),
            Err(SwdError::Parameter(_))
        ));
        assert!(matches!(
            swd.queue_ap_write(address, 0),
            Err(SwdError::Parameter(_))
        ));
        pretty_assertions::assert_eq!(swd.queued(), 0);
        assert!(fake.operations().is_empty());
    }

    #[test]
    fn ap_abort_is_not_implemented() {
        let (_fake, mut adapter, mut transport) = selected_transport();
        let mut swd = transport.interface(&mut adapter).unwrap();

        assert!(matches!(
            swd.queue_ap_abort(),
            Err(SwdError::NotImplemented(_))
        ));
        pretty_assertions::assert_eq!(swd.queued(), 0);
    }

    #[test]
    fn init_switches_to_swd_and_reads_idcode() {
        let fake = FakeAdapter::dummy();
        let mut adapter = Adapter::new(Box::new(fake.clone()));
        let mut transport = SwdTransport::new();
        transport.select().unwrap();

        transport.init(&mut adapter).unwrap();

        pretty_assertions::assert_eq!(transport.context().unwrap().idcode(), Some(DUMMY_IDCODE));

        let sent: Vec<_> = fake
            .transfers()
            .iter()
            .take(JTAG_TO_SWD_SEQUENCE.len())
            .filter_map(FakeOperation::mosi_value)
            .map(|v| v as u8)
            .collect();
        pretty_assertions::assert_eq!(sent, JTAG_TO_SWD_SEQUENCE.to_vec());
    }

    #[test]
    fn init_fails_without_response() {
        let (_fake, mut adapter, mut transport) = selected_transport();

        // An unconnected data line reads as zero, which is not a valid acknowledge.
        assert!(matches!(
            transport.init(&mut adapter),
            Err(TransportError::Swd(SwdError::Batch(_)))
        ));
        pretty_assertions::assert_eq!(transport.context().unwrap().idcode(), None);
    }

    #[test_case(LevelFilter::OFF => SwdLogLevel::Silent; "off")]
    #[test_case(LevelFilter::ERROR => SwdLogLevel::Error; "error")]
    #[test_case(LevelFilter::WARN => SwdLogLevel::Warning; "warn")]
    #[test_case(LevelFilter::INFO => SwdLogLevel::Info; "info")]
    #[test_case(LevelFilter::DEBUG => SwdLogLevel::Payload; "debug")]
    #[test_case(LevelFilter::TRACE => SwdLogLevel::Payload; "trace")]
    fn log_level_from_host(filter: LevelFilter) -> SwdLogLevel {
        SwdLogLevel::from(filter)
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Reads the IDCODE at the given SWD log level and returns what was logged.
    fn idcode_read_log(level: SwdLogLevel) -> String {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let fake = FakeAdapter::dummy();
            let mut adapter = Adapter::new(Box::new(fake));
            let mut transport = SwdTransport::new();
            transport.select().unwrap();

            let mut swd = transport.interface(&mut adapter).unwrap();
            swd.context_mut().set_log_level(level);
            pretty_assertions::assert_eq!(swd.read_idcode().unwrap(), DUMMY_IDCODE);
        });

        let bytes = log.0.lock();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn payload_level_logs_every_operation() {
        let log = idcode_read_log(SwdLogLevel::Payload);

        assert!(
            log.contains("Read(port=DP, addr=0x0): request=0xa5 ack=0b001 data=0x2ba01477"),
            "{log}"
        );
    }

    #[test_case(SwdLogLevel::Silent; "silent")]
    #[test_case(SwdLogLevel::Normal; "normal")]
    #[test_case(SwdLogLevel::Info; "info")]
    fn lower_levels_do_not_log_payload(level: SwdLogLevel) {
        let log = idcode_read_log(level);

        assert!(log.contains("Flushing 1 queued SWD operations"), "{log}");
        assert!(!log.contains("request="), "{log}");
    }

    #[test]
    fn missing_result_names_the_read() {
        let error = SwdError::MissingResult(SwdCommand::Read {
            port: PortType::AccessPort,
            address: 0xc,
        });

        pretty_assertions::assert_eq!(
            error.to_string(),
            "The queued read Read(port=AP, addr=0xc) produced no result."
        );
    }

    #[test]
    fn log_level_from_number() {
        pretty_assertions::assert_eq!(SwdLogLevel::try_from(3).unwrap(), SwdLogLevel::Normal);
        assert!(matches!(
            SwdLogLevel::try_from(6),
            Err(SwdError::Parameter(_))
        ));
    }
}
