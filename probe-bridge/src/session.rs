//! The session owns everything a debug connection needs.
//!
//! There is no global state: the adapter, the transport registry, the reset configuration
//! and the clock settings are fields of a [`Session`], and they are dropped with it.

use crate::{
    adapter::{
        builtin_drivers, Adapter, AdapterDriver, ClockSettings, DebugAdapter, ResetConfig,
        ResetTiming,
    },
    error::Error,
    transport::{
        swd::{SwdContext, SwdError, SwdInterface},
        TransportRegistry, LEGACY_TRANSPORTS,
    },
};

/// A debug session.
#[derive(Debug)]
pub struct Session {
    drivers: Vec<AdapterDriver>,
    adapter: Option<Adapter>,
    transports: TransportRegistry,
    reset_config: ResetConfig,
    clock: ClockSettings,
    reset_timing: ResetTiming,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session with the built-in drivers and transports.
    pub fn new() -> Self {
        Self::with_parts(builtin_drivers(), TransportRegistry::with_builtin())
    }

    /// Creates a session from a driver catalogue and a transport registry.
    pub fn with_parts(drivers: Vec<AdapterDriver>, transports: TransportRegistry) -> Self {
        Self {
            drivers,
            adapter: None,
            transports,
            reset_config: ResetConfig::default(),
            clock: ClockSettings::default(),
            reset_timing: ResetTiming::default(),
        }
    }

    /// The available adapter drivers.
    pub fn drivers(&self) -> &[AdapterDriver] {
        &self.drivers
    }

    /// Adds a driver to the catalogue, replacing one with the same name.
    pub fn register_driver(&mut self, driver: AdapterDriver) {
        self.drivers.retain(|d| d.name() != driver.name());
        self.drivers.push(driver);
    }

    pub fn adapter(&self) -> Option<&Adapter> {
        self.adapter.as_ref()
    }

    /// The bound adapter, or [`Error::NoAdapter`].
    pub fn adapter_mut(&mut self) -> Result<&mut Adapter, Error> {
        self.adapter.as_mut().ok_or(Error::NoAdapter)
    }

    /// Binds the adapter driver with the given name.
    ///
    /// Binding happens once per session. If an adapter is already bound, it is kept and
    /// `Ok(false)` is returned.
    pub fn open_adapter(&mut self, name: &str) -> Result<bool, Error> {
        if self.adapter.is_some() {
            tracing::warn!("Interface already configured, ignoring");
            return Ok(false);
        }

        let driver = self
            .drivers
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| Error::UnknownDriver(name.to_string()))?
            .open();

        self.bind(driver)?;
        Ok(true)
    }

    /// Binds an adapter driver instance which is not part of the catalogue.
    ///
    /// Behaves like [`Session::open_adapter`] when an adapter is already bound.
    pub fn attach_adapter(&mut self, driver: Box<dyn DebugAdapter>) -> Result<bool, Error> {
        if self.adapter.is_some() {
            tracing::warn!("Interface already configured, ignoring");
            return Ok(false);
        }

        self.bind(driver)?;
        Ok(true)
    }

    fn bind(&mut self, driver: Box<dyn DebugAdapter>) -> Result<(), Error> {
        let adapter = Adapter::new(driver);

        if !self.transports.is_declared() {
            match adapter.declared_transports() {
                Some(transports) if !transports.is_empty() => {
                    self.transports.allow(transports)?;
                }
                _ => {
                    tracing::warn!(
                        "Adapter driver '{}' did not declare which transports it allows; assuming legacy JTAG-only",
                        adapter.name()
                    );
                    self.transports.allow(LEGACY_TRANSPORTS)?;
                }
            }
        }

        tracing::info!("Using adapter '{}'", adapter.name());
        self.adapter = Some(adapter);

        if let Some(khz) = self.clock.khz {
            if let Err(error) = self.apply_khz(khz) {
                tracing::warn!("Unable to apply the configured clock of {khz} kHz: {error}");
                self.clock.khz = None;
            }
        }

        Ok(())
    }

    pub fn transports(&self) -> &TransportRegistry {
        &self.transports
    }

    pub fn transports_mut(&mut self) -> &mut TransportRegistry {
        &mut self.transports
    }

    /// Sets the transports which may be selected in this session.
    pub fn allow_transports<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), Error> {
        self.transports.allow(names)?;
        Ok(())
    }

    /// Selects a transport and binds it to the adapter, if one is bound.
    pub fn select_transport(&mut self, name: &str) -> Result<(), Error> {
        self.transports.select(name)?;

        if let (Some(adapter), Some(current)) = (self.adapter.as_mut(), self.transports.current())
        {
            adapter.bind_transport(current);
        }

        Ok(())
    }

    /// Initializes the selected transport.
    pub fn init_transport(&mut self) -> Result<(), Error> {
        let adapter = self.adapter.as_mut().ok_or(Error::NoAdapter)?;
        self.transports.init(adapter)?;
        Ok(())
    }

    /// Register access through the selected SWD transport.
    pub fn swd(&mut self) -> Result<SwdInterface<'_>, Error> {
        let adapter = self.adapter.as_mut().ok_or(Error::NoAdapter)?;
        let transport = self.transports.swd_mut().ok_or(SwdError::NotSelected)?;
        Ok(transport.interface(adapter)?)
    }

    /// The session context of the selected SWD transport.
    pub fn swd_context_mut(&mut self) -> Result<&mut SwdContext, Error> {
        let context = self
            .transports
            .swd_mut()
            .and_then(|swd| swd.context_mut())
            .ok_or(SwdError::NotSelected)?;
        Ok(context)
    }

    pub fn reset_config(&self) -> ResetConfig {
        self.reset_config
    }

    /// Applies reset configuration tokens. On error the configuration is unchanged.
    pub fn update_reset_config<S: AsRef<str>>(
        &mut self,
        tokens: &[S],
    ) -> Result<ResetConfig, Error> {
        self.reset_config = self.reset_config.update(tokens)?;
        Ok(self.reset_config)
    }

    pub fn clock(&self) -> ClockSettings {
        self.clock
    }

    /// Requests an adapter clock. `0` requests adaptive clocking.
    ///
    /// The request is applied right away when an adapter is bound, otherwise when one is
    /// bound later. A request the adapter rejects leaves the clock settings unchanged.
    pub fn set_adapter_khz(&mut self, khz: u32) -> Result<(), Error> {
        if self.adapter.is_some() {
            self.apply_khz(khz)?;
        }

        self.clock.khz = Some(khz);
        Ok(())
    }

    fn apply_khz(&mut self, khz: u32) -> Result<(), Error> {
        let adapter = self.adapter.as_mut().ok_or(Error::NoAdapter)?;

        let speed = adapter.khz_to_speed(khz)?;
        adapter.set_speed(speed)?;
        self.clock.speed = Some(speed);

        tracing::debug!("Adapter clock set to {khz} kHz, speed value {speed}");

        Ok(())
    }

    /// The current adapter clock in kHz. `0` means adaptive clocking.
    pub fn adapter_khz(&self) -> Result<u32, Error> {
        match (&self.adapter, self.clock.speed) {
            (Some(adapter), Some(speed)) => Ok(adapter.speed_to_khz(speed)?),
            _ => Ok(self.clock.khz.unwrap_or(0)),
        }
    }

    pub fn reset_timing(&self) -> ResetTiming {
        self.reset_timing
    }

    /// Sets the delay after deasserting SRST.
    pub fn set_nsrst_delay(&mut self, ms: u32) {
        self.reset_timing.nsrst_delay_ms = ms;
    }

    /// Sets how long SRST is held asserted.
    pub fn set_nsrst_assert_width(&mut self, ms: u32) {
        self.reset_timing.nsrst_assert_width_ms = ms;
    }
}
