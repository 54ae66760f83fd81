//! Transports and their registry.
//!
//! A transport is selected once per session and then initialized. Which transports may
//! be selected is decided by an allow-list, normally taken from the transports the bound
//! adapter declares.

pub mod swd;

use indexmap::IndexMap;
use std::fmt;

use self::swd::{SwdError, SwdTransport};
use crate::adapter::Adapter;

/// The allow-list used for adapters which never declared their transports.
pub const LEGACY_TRANSPORTS: &[&str] = &["jtag"];

/// An error which can occur when selecting or initializing a transport.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum TransportError {
    /// The transport '{0}' is already registered.
    DuplicateTransport(&'static str),

    /// Invalid transport '{0}'.
    InvalidTransport(String),

    /// The transport '{name}' is not allowed, use one of: {allowed}.
    NotAllowed {
        /// The rejected transport.
        name: String,
        /// The allowed transports, separated by spaces.
        allowed: String,
    },

    /// The transport '{current}' is already selected, it cannot be changed to '{requested}'.
    AlreadySelected {
        /// The selected transport.
        current: &'static str,
        /// The rejected transport.
        requested: String,
    },

    /// The set of allowed transports cannot be changed after a transport was selected.
    AllowListLocked,

    /// The list of allowed transports is invalid: {0}.
    InvalidAllowList(String),

    /// No transport has been selected.
    NotSelected,

    /// SWD transport error.
    Swd(#[from] SwdError),
}

/// A transport between the adapter and the target.
pub trait Transport: fmt::Debug + Send {
    /// The unique name of the transport.
    fn name(&self) -> &'static str;

    /// Prepares the transport for use. Must not access hardware.
    ///
    /// Selecting a transport again reuses its session context.
    fn select(&mut self) -> Result<(), TransportError>;

    /// Initializes the transport, interrogating the target through the adapter.
    fn init(&mut self, adapter: &mut Adapter) -> Result<(), TransportError>;

    fn as_swd(&self) -> Option<&SwdTransport> {
        None
    }

    fn as_swd_mut(&mut self) -> Option<&mut SwdTransport> {
        None
    }
}

/// The transports available to a session.
#[derive(Debug, Default)]
pub struct TransportRegistry {
    transports: IndexMap<&'static str, Box<dyn Transport>>,
    allowed: Option<Vec<String>>,
    current: Option<&'static str>,
}

impl TransportRegistry {
    /// Creates a registry without any transports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with all transports of this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.transports.insert(
            SwdTransport::NAME,
            Box::new(SwdTransport::new()) as Box<dyn Transport>,
        );
        registry
    }

    /// Adds a transport. Names must be unique.
    pub fn register(&mut self, transport: Box<dyn Transport>) -> Result<(), TransportError> {
        let name = transport.name();
        if self.transports.contains_key(name) {
            return Err(TransportError::DuplicateTransport(name));
        }

        tracing::debug!("Registered transport '{name}'");
        self.transports.insert(name, transport);
        Ok(())
    }

    /// Sets the transports which may be selected.
    pub fn allow<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), TransportError> {
        if self.current.is_some() {
            return Err(TransportError::AllowListLocked);
        }

        if names.is_empty() {
            return Err(TransportError::InvalidAllowList(
                "at least one transport is required".to_string(),
            ));
        }

        let mut allowed: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if allowed.iter().any(|a| a == name) {
                return Err(TransportError::InvalidAllowList(format!(
                    "'{name}' is listed twice"
                )));
            }
            allowed.push(name.to_string());
        }

        tracing::debug!("Allowed transports: {}", allowed.join(" "));
        self.allowed = Some(allowed);
        Ok(())
    }

    /// Whether an allow-list was set.
    pub fn is_declared(&self) -> bool {
        self.allowed.is_some()
    }

    /// The transports which may be selected.
    pub fn allowed(&self) -> Vec<&str> {
        match &self.allowed {
            Some(allowed) => allowed.iter().map(String::as_str).collect(),
            None => LEGACY_TRANSPORTS.to_vec(),
        }
    }

    /// Names of all registered transports.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.transports.keys().copied()
    }

    /// Selects a transport by name.
    pub fn select(&mut self, name: &str) -> Result<(), TransportError> {
        let Some((_, &key, transport)) = self.transports.get_full_mut(name) else {
            return Err(TransportError::InvalidTransport(name.to_string()));
        };

        let allowed = match &self.allowed {
            Some(allowed) => allowed.iter().any(|a| a == name),
            None => LEGACY_TRANSPORTS.iter().any(|t| *t == name),
        };
        if !allowed {
            let allowed = match &self.allowed {
                Some(allowed) => allowed.join(" "),
                None => LEGACY_TRANSPORTS.join(" "),
            };
            return Err(TransportError::NotAllowed {
                name: name.to_string(),
                allowed,
            });
        }

        if let Some(current) = self.current {
            if current != key {
                return Err(TransportError::AlreadySelected {
                    current,
                    requested: name.to_string(),
                });
            }
        }

        transport.select()?;
        self.current = Some(key);

        tracing::info!("Selected transport '{key}'");

        Ok(())
    }

    /// Initializes the selected transport.
    pub fn init(&mut self, adapter: &mut Adapter) -> Result<(), TransportError> {
        let transport = self
            .current_transport_mut()
            .ok_or(TransportError::NotSelected)?;

        tracing::debug!("Initializing transport '{}'", transport.name());
        transport.init(adapter)
    }

    /// The name of the selected transport.
    pub fn current(&self) -> Option<&'static str> {
        self.current
    }

    pub fn current_transport(&self) -> Option<&dyn Transport> {
        let name = self.current?;
        self.transports.get(name).map(|t| t.as_ref())
    }

    pub fn current_transport_mut(&mut self) -> Option<&mut dyn Transport> {
        let name = self.current?;
        match self.transports.get_mut(name) {
            Some(transport) => Some(transport.as_mut()),
            None => None,
        }
    }

    /// The selected transport, if it is SWD.
    pub fn swd_mut(&mut self) -> Option<&mut SwdTransport> {
        self.current_transport_mut()?.as_swd_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::FakeAdapter;
    use pretty_assertions::assert_eq;

    /// Stands in for a JTAG transport.
    #[derive(Debug, Default)]
    struct JtagStub;

    impl Transport for JtagStub {
        fn name(&self) -> &'static str {
            "jtag"
        }

        fn select(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        fn init(&mut self, _adapter: &mut Adapter) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn select_unknown_on_empty_registry() {
        let mut registry = TransportRegistry::new();

        assert!(matches!(
            registry.select("swd"),
            Err(TransportError::InvalidTransport(name)) if name == "swd"
        ));
        assert_eq!(registry.current(), None);
    }

    #[test]
    fn register_duplicate_fails() {
        let mut registry = TransportRegistry::with_builtin();

        assert!(matches!(
            registry.register(Box::new(SwdTransport::new())),
            Err(TransportError::DuplicateTransport("swd"))
        ));
    }

    #[test]
    fn legacy_allow_list_is_jtag_only() {
        let mut registry = TransportRegistry::with_builtin();
        registry.register(Box::new(JtagStub)).unwrap();

        assert_eq!(registry.allowed(), vec!["jtag"]);
        assert!(matches!(
            registry.select("swd"),
            Err(TransportError::NotAllowed { .. })
        ));
        registry.select("jtag").unwrap();
        assert_eq!(registry.current(), Some("jtag"));
    }

    #[test]
    fn allow_list_is_enforced() {
        let mut registry = TransportRegistry::with_builtin();
        registry.register(Box::new(JtagStub)).unwrap();
        registry.allow(&["swd"]).unwrap();

        let error = registry.select("jtag").unwrap_err();
        assert_eq!(
            error.to_string(),
            "The transport 'jtag' is not allowed, use one of: swd."
        );
        registry.select("swd").unwrap();
    }

    #[test]
    fn allow_list_validation() {
        let mut registry = TransportRegistry::with_builtin();
        let empty: [&str; 0] = [];

        assert!(matches!(
            registry.allow(&empty),
            Err(TransportError::InvalidAllowList(_))
        ));
        assert!(matches!(
            registry.allow(&["swd", "swd"]),
            Err(TransportError::InvalidAllowList(_))
        ));
        assert!(!registry.is_declared());

        registry.allow(&["swd"]).unwrap();
        registry.select("swd").unwrap();
        assert!(matches!(
            registry.allow(&["jtag"]),
            Err(TransportError::AllowListLocked)
        ));
    }

    #[test]
    fn reselect_reuses_context() {
        let mut registry = TransportRegistry::with_builtin();
        registry.allow(&["swd"]).unwrap();

        registry.select("swd").unwrap();
        let first: *const _ = registry.swd_mut().unwrap().context().unwrap();
        registry.select("swd").unwrap();
        let second: *const _ = registry.swd_mut().unwrap().context().unwrap();

        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn other_transport_cannot_be_selected_later() {
        let mut registry = TransportRegistry::with_builtin();
        registry.register(Box::new(JtagStub)).unwrap();
        registry.allow(&["swd", "jtag"]).unwrap();

        registry.select("swd").unwrap();

        assert!(matches!(
            registry.select("jtag"),
            Err(TransportError::AlreadySelected { current: "swd", .. })
        ));
    }

    #[test]
    fn init_requires_selection() {
        let mut registry = TransportRegistry::with_builtin();
        let mut adapter = Adapter::new(Box::new(FakeAdapter::dummy()));

        assert!(matches!(
            registry.init(&mut adapter),
            Err(TransportError::NotSelected)
        ));
    }

    #[test]
    fn init_runs_selected_transport() {
        let mut registry = TransportRegistry::with_builtin();
        let mut adapter = Adapter::new(Box::new(FakeAdapter::dummy()));
        registry.allow(&["swd"]).unwrap();
        registry.select("swd").unwrap();

        registry.init(&mut adapter).unwrap();

        let context = registry.swd_mut().unwrap().context().unwrap();
        assert_eq!(
            context.idcode(),
            Some(crate::adapter::fake_adapter::DUMMY_IDCODE)
        );
    }
}
