//! Debug adapters and the capabilities they provide.
//!
//! A driver implements [`DebugAdapter`]. Optional capabilities have default
//! implementations on the trait, so every call site can use them unconditionally.
//! The low-level capabilities needed by the bit-level transports, pin bitbanging and raw
//! bit transfers, have no safe default. A driver exposes them through
//! [`DebugAdapter::get_interface_bitbang_mut`] and
//! [`DebugAdapter::get_interface_transfer_mut`], and their absence is reported as
//! [`AdapterError::CapabilityMissing`].

pub mod fake_adapter;
pub mod reset_config;
pub mod signal;

use bitflags::bitflags;
use bitvec::slice::BitSlice;
use serde::{Deserialize, Serialize};
use std::fmt;

use self::signal::{Signal, SignalError, SignalList, SignalOp, SignalValue};

pub use self::fake_adapter::FakeAdapter;
pub use self::reset_config::{ResetCategory, ResetConfig, ResetConfigError};

/// The capabilities which have no default implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, docsplay::Display)]
pub enum Capability {
    /// bitbang
    Bitbang,
    /// transfer
    Transfer,
}

bitflags! {
    /// The set of low-level capabilities provided by a bound adapter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u8 {
        /// The adapter implements [`BitbangAccess`].
        const BITBANG = 0x1;
        /// The adapter implements [`BitTransfer`].
        const TRANSFER = 0x2;
    }
}

impl From<Capability> for Capabilities {
    fn from(capability: Capability) -> Self {
        match capability {
            Capability::Bitbang => Capabilities::BITBANG,
            Capability::Transfer => Capabilities::TRANSFER,
        }
    }
}

/// An error reported by a debug adapter or its driver.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum AdapterError {
    /// The debug adapter does not provide the '{0}' capability.
    CapabilityMissing(Capability),

    /// Translation from {0} is not implemented by this adapter.
    NotImplemented(&'static str),

    /// The requested speed setting ({0} kHz) is not supported by the adapter.
    UnsupportedSpeed(u32),

    /// Signal access failed.
    Signal(#[from] SignalError),

    /// An error specific to the adapter driver occurred.
    AdapterSpecific(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// The direction of a raw bit transfer on a bidirectional data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDirection {
    /// The host drives the line.
    Mosi,
    /// The target drives the line.
    Miso,
    /// Nobody drives the line while its direction changes.
    Turnaround,
}

/// Direct control over named adapter pins.
pub trait BitbangAccess {
    /// Reads or writes the pins selected by `signal`.
    ///
    /// Returns the value read, or the value written. Drivers restrict the value to the
    /// bits covered by [`Signal::mask`].
    fn bitbang(&mut self, signal: &Signal, op: SignalOp) -> Result<u32, AdapterError>;
}

/// Clocking raw bits through the adapter.
pub trait BitTransfer {
    /// Clocks `bits` bits. Bit `i` of `mosi` is driven in cycle `i`, and the sampled data
    /// line is stored into bit `i` of `miso`.
    ///
    /// Both slices are at least `bits` long. Returns the number of bits transferred.
    fn transfer(
        &mut self,
        bits: usize,
        mosi: &BitSlice<u8>,
        miso: &mut BitSlice<u8>,
        direction: BitDirection,
    ) -> Result<usize, AdapterError>;
}

/// The capability contract of a debug adapter driver.
pub trait DebugAdapter: Send + fmt::Debug {
    /// Get human readable name for the adapter
    fn name(&self) -> &str;

    /// The transports this adapter can be used with.
    ///
    /// `None` marks a legacy driver which never declared its transports; such a driver
    /// is treated as JTAG-only.
    fn transports(&self) -> Option<&[&'static str]> {
        None
    }

    /// Signals defined by the driver itself, as name and mask.
    ///
    /// They are added to the signal list when the adapter is bound.
    fn default_signals(&self) -> &[(&'static str, u32)] {
        &[]
    }

    /// Converts a clock frequency in kHz to the adapter specific speed value.
    fn khz_to_speed(&self, _khz: u32) -> Result<u32, AdapterError> {
        tracing::error!("Translation from khz to adapter speed not implemented");
        Err(AdapterError::NotImplemented("khz to adapter speed"))
    }

    /// Converts an adapter specific speed value to a clock frequency in kHz.
    fn speed_to_khz(&self, _speed: u32) -> Result<u32, AdapterError> {
        tracing::error!("Translation from adapter speed to khz not implemented");
        Err(AdapterError::NotImplemented("adapter speed to khz"))
    }

    /// Applies an adapter specific speed value.
    fn set_speed(&mut self, _speed: u32) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Whether the target power dropped since the last check.
    fn power_dropout(&mut self) -> Result<bool, AdapterError> {
        Ok(false)
    }

    /// Whether the system reset line is asserted.
    fn srst_asserted(&mut self) -> Result<bool, AdapterError> {
        Ok(false)
    }

    fn get_interface_bitbang_mut(&mut self) -> Option<&mut dyn BitbangAccess> {
        None
    }

    fn get_interface_transfer_mut(&mut self) -> Option<&mut dyn BitTransfer> {
        None
    }
}

/// A named factory for an adapter driver.
#[derive(Clone, Copy)]
pub struct AdapterDriver {
    name: &'static str,
    factory: fn() -> Box<dyn DebugAdapter>,
}

impl AdapterDriver {
    /// Creates a driver catalogue entry.
    pub const fn new(name: &'static str, factory: fn() -> Box<dyn DebugAdapter>) -> Self {
        Self { name, factory }
    }

    /// The name used to select this driver.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Creates a new instance of the driver.
    pub fn open(&self) -> Box<dyn DebugAdapter> {
        (self.factory)()
    }
}

impl fmt::Debug for AdapterDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterDriver")
            .field("name", &self.name)
            .finish()
    }
}

/// The drivers compiled into this crate.
pub fn builtin_drivers() -> Vec<AdapterDriver> {
    vec![AdapterDriver::new(fake_adapter::DRIVER_NAME, || {
        Box::new(FakeAdapter::dummy())
    })]
}

/// Clock configuration of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSettings {
    /// The requested clock in kHz. `0` requests adaptive clocking.
    pub khz: Option<u32>,
    /// The adapter specific speed value last applied.
    pub speed: Option<u32>,
}

/// Timing of the system reset line, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetTiming {
    /// Delay after deasserting SRST.
    pub nsrst_delay_ms: u32,
    /// Minimum time SRST is held asserted.
    pub nsrst_assert_width_ms: u32,
}

/// The debug adapter bound to a session, together with its signals.
#[derive(Debug)]
pub struct Adapter {
    driver: Box<dyn DebugAdapter>,
    capabilities: Capabilities,
    signals: SignalList,
    transport: Option<&'static str>,
}

impl Adapter {
    /// Binds a driver instance.
    pub fn new(mut driver: Box<dyn DebugAdapter>) -> Self {
        let mut capabilities = Capabilities::empty();
        capabilities.set(
            Capabilities::BITBANG,
            driver.get_interface_bitbang_mut().is_some(),
        );
        capabilities.set(
            Capabilities::TRANSFER,
            driver.get_interface_transfer_mut().is_some(),
        );

        tracing::debug!(
            "Bound adapter '{}' with capabilities {:?}",
            driver.name(),
            capabilities
        );

        let mut signals = SignalList::new();
        for (name, mask) in driver.default_signals() {
            if let Err(error) = signals.add(name, *mask) {
                tracing::warn!("Ignoring signal declared by the driver: {error}");
            }
        }

        Self {
            driver,
            capabilities,
            signals,
            transport: None,
        }
    }

    /// Get human readable name for the adapter
    pub fn name(&self) -> &str {
        self.driver.name()
    }

    /// The transports declared by the driver.
    pub fn declared_transports(&self) -> Option<&[&'static str]> {
        self.driver.transports()
    }

    /// The low-level capabilities of the driver.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability.into())
    }

    /// The transport this adapter is bound to.
    pub fn transport(&self) -> Option<&'static str> {
        self.transport
    }

    pub(crate) fn bind_transport(&mut self, name: &'static str) {
        self.transport = Some(name);
    }

    pub fn signals(&self) -> &SignalList {
        &self.signals
    }

    pub fn signals_mut(&mut self) -> &mut SignalList {
        &mut self.signals
    }

    /// Reads a signal through the driver and remembers the value.
    pub fn read_signal(&mut self, name: &str) -> Result<u32, AdapterError> {
        let signal = self.signals.find(name)?;
        let bitbang = self
            .driver
            .get_interface_bitbang_mut()
            .ok_or(AdapterError::CapabilityMissing(Capability::Bitbang))?;

        let value = bitbang.bitbang(signal, SignalOp::Read)?;
        self.signals.set_value(name, value)?;

        Ok(value)
    }

    /// Writes a signal through the driver and remembers the value.
    pub fn write_signal(&mut self, name: &str, value: SignalValue) -> Result<u32, AdapterError> {
        let signal = self.signals.find(name)?;
        let bitbang = self
            .driver
            .get_interface_bitbang_mut()
            .ok_or(AdapterError::CapabilityMissing(Capability::Bitbang))?;

        let value = value.resolve(signal.mask());
        let value = bitbang.bitbang(signal, SignalOp::Write(value))?;
        self.signals.set_value(name, value)?;

        Ok(value)
    }

    /// Clocks raw bits through the driver.
    pub fn transfer(
        &mut self,
        bits: usize,
        mosi: &BitSlice<u8>,
        miso: &mut BitSlice<u8>,
        direction: BitDirection,
    ) -> Result<usize, AdapterError> {
        let transfer = self
            .driver
            .get_interface_transfer_mut()
            .ok_or(AdapterError::CapabilityMissing(Capability::Transfer))?;

        transfer.transfer(bits, mosi, miso, direction)
    }

    pub fn khz_to_speed(&self, khz: u32) -> Result<u32, AdapterError> {
        self.driver.khz_to_speed(khz)
    }

    pub fn speed_to_khz(&self, speed: u32) -> Result<u32, AdapterError> {
        self.driver.speed_to_khz(speed)
    }

    pub fn set_speed(&mut self, speed: u32) -> Result<(), AdapterError> {
        self.driver.set_speed(speed)
    }

    pub fn power_dropout(&mut self) -> Result<bool, AdapterError> {
        self.driver.power_dropout()
    }

    pub fn srst_asserted(&mut self) -> Result<bool, AdapterError> {
        self.driver.srst_asserted()
    }
}
