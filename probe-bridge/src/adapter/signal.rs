//! Named, masked signals layered over the generic pins of a debug adapter.
//!
//! A signal gives a name to a group of adapter pins, selected by a 32-bit mask.
//! Reading or writing a signal is delegated to the adapter driver through
//! [`BitbangAccess`](super::BitbangAccess). Restricting the transferred value to the
//! masked bits is the driver's job, not this layer's.
//!
//! Reading a signal may switch the masked pins to inputs, and writing may switch them to
//! outputs. This is adapter specific, so callers must not assume that the direction of a
//! pin is stable across mixed read and write sequences.

use indexmap::IndexMap;
use std::{fmt, str::FromStr};

/// Maximum length of a signal name.
pub const SIGNAL_NAME_MAX_LEN: usize = 32;

/// A named group of adapter pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    name: String,
    mask: u32,
    value: u32,
}

impl Signal {
    fn new(name: &str, mask: u32, value: u32) -> Self {
        Self {
            name: name.to_string(),
            mask,
            value,
        }
    }

    /// The name of the signal.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The adapter pins covered by this signal.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// The last value read from or written to the signal.
    ///
    /// Only the bits covered by [`Signal::mask`] are meaningful.
    pub fn value(&self) -> u32 {
        self.value
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: mask=0x{:08X} value=0x{:08X}",
            self.name, self.mask, self.value
        )
    }
}

/// The operation requested from the adapter driver for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOp {
    /// Sample the signal. The driver may switch the pins to inputs.
    Read,
    /// Drive the signal. The driver may switch the pins to outputs.
    Write(u32),
}

/// A value to be written to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalValue {
    /// All bits set (`hi` or `set`), restricted to the signal mask.
    High,
    /// All bits cleared (`lo` or `clr`).
    Low,
    /// A raw port value.
    Raw(u32),
}

impl SignalValue {
    /// Resolves the value against the mask of the signal it is written to.
    pub fn resolve(self, mask: u32) -> u32 {
        match self {
            SignalValue::High => u32::MAX & mask,
            SignalValue::Low => 0,
            SignalValue::Raw(value) => value,
        }
    }
}

impl FromStr for SignalValue {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hi" | "set" => Ok(SignalValue::High),
            "lo" | "clr" => Ok(SignalValue::Low),
            _ => {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                u32::from_str_radix(digits, 16)
                    .map(SignalValue::Raw)
                    .map_err(|_| SignalError::InvalidValue(s.to_string()))
            }
        }
    }
}

/// An error which can occur when managing adapter signals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, docsplay::Display)]
pub enum SignalError {
    /// The signal '{0}' already exists.
    AlreadyExists(String),

    /// The signal '{0}' was not found.
    NotFound(String),

    /// The signal name '{0}' is invalid. Names must be between 1 and 32 characters and must not contain '=' or whitespace.
    InvalidName(String),

    /// Bad signal value '{0}'. Use hi, set, lo, clr, or a hexadecimal port value.
    InvalidValue(String),

    /// No signals are defined, see the 'interface_signal' command.
    NoSignals,
}

/// The signals defined for one adapter, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct SignalList {
    signals: IndexMap<String, Signal>,
}

impl SignalList {
    /// Creates an empty signal list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new signal with an initial value of zero.
    pub fn add(&mut self, name: &str, mask: u32) -> Result<&Signal, SignalError> {
        self.add_with_value(name, mask, 0)
    }

    /// Adds a new signal with the given initial value.
    pub fn add_with_value(
        &mut self,
        name: &str,
        mask: u32,
        value: u32,
    ) -> Result<&Signal, SignalError> {
        validate_name(name)?;

        if self.signals.contains_key(name) {
            return Err(SignalError::AlreadyExists(name.to_string()));
        }

        tracing::debug!("Adding signal {name} with mask {mask:#010x}");

        let entry = self
            .signals
            .entry(name.to_string())
            .or_insert_with(|| Signal::new(name, mask, value));

        Ok(entry)
    }

    /// Removes a signal and returns it.
    pub fn delete(&mut self, name: &str) -> Result<Signal, SignalError> {
        tracing::debug!("Deleting signal {name}");
        self.signals
            .shift_remove(name)
            .ok_or_else(|| SignalError::NotFound(name.to_string()))
    }

    /// Looks up a signal by name.
    pub fn find(&self, name: &str) -> Result<&Signal, SignalError> {
        self.signals
            .get(name)
            .ok_or_else(|| SignalError::NotFound(name.to_string()))
    }

    pub(crate) fn set_value(&mut self, name: &str, value: u32) -> Result<(), SignalError> {
        let signal = self
            .signals
            .get_mut(name)
            .ok_or_else(|| SignalError::NotFound(name.to_string()))?;
        signal.value = value;
        Ok(())
    }

    /// Iterates over all signals in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    /// Returns the number of signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns whether no signals are defined.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

fn validate_name(name: &str) -> Result<(), SignalError> {
    let valid = !name.is_empty()
        && name.len() <= SIGNAL_NAME_MAX_LEN
        && !name.contains('=')
        && !name.chars().any(char::is_whitespace);

    if valid {
        Ok(())
    } else {
        Err(SignalError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn add_then_find() {
        let mut list = SignalList::new();
        list.add("RESET", 0x1).unwrap();

        let signal = list.find("RESET").unwrap();
        pretty_assertions::assert_eq!(signal.mask(), 0x1);
        pretty_assertions::assert_eq!(signal.value(), 0x0);
    }

    #[test]
    fn add_duplicate_fails() {
        let mut list = SignalList::new();
        list.add("LED", 0x10).unwrap();

        pretty_assertions::assert_eq!(
            list.add("LED", 0x20).unwrap_err(),
            SignalError::AlreadyExists("LED".to_string())
        );
        pretty_assertions::assert_eq!(list.find("LED").unwrap().mask(), 0x10);
    }

    #[test]
    fn delete_then_find_fails() {
        let mut list = SignalList::new();
        list.add("RESET", 0x1).unwrap();

        let removed = list.delete("RESET").unwrap();
        pretty_assertions::assert_eq!(removed.name(), "RESET");
        pretty_assertions::assert_eq!(
            list.find("RESET").unwrap_err(),
            SignalError::NotFound("RESET".to_string())
        );
    }

    #[test]
    fn delete_missing_fails() {
        let mut list = SignalList::new();
        pretty_assertions::assert_eq!(
            list.delete("TMS").unwrap_err(),
            SignalError::NotFound("TMS".to_string())
        );
    }

    #[test]
    fn insertion_order_is_kept_after_delete() {
        let mut list = SignalList::new();
        list.add("A", 0x1).unwrap();
        list.add("B", 0x2).unwrap();
        list.add("C", 0x4).unwrap();
        list.delete("B").unwrap();

        let names: Vec<_> = list.iter().map(Signal::name).collect();
        pretty_assertions::assert_eq!(names, vec!["A", "C"]);
    }

    #[test_case(""; "empty")]
    #[test_case("A=B"; "contains equals sign")]
    #[test_case("TWO WORDS"; "contains whitespace")]
    #[test_case("THIS_SIGNAL_NAME_IS_FAR_TOO_LONG_TO_USE"; "too long")]
    fn invalid_names_are_rejected(name: &str) {
        let mut list = SignalList::new();
        pretty_assertions::assert_eq!(
            list.add(name, 0x1).unwrap_err(),
            SignalError::InvalidName(name.to_string())
        );
    }

    #[test_case("hi", 0x0000_00F0 => 0x0000_00F0; "hi is mask restricted")]
    #[test_case("set", 0x8000_0001 => 0x8000_0001; "set is mask restricted")]
    #[test_case("lo", 0xFFFF_FFFF => 0; "lo")]
    #[test_case("clr", 0x1 => 0; "clr")]
    #[test_case("1f", 0x1 => 0x1F; "raw value is not masked")]
    #[test_case("0xdeadbeef", 0x1 => 0xDEAD_BEEF; "hex prefix")]
    fn value_aliases(input: &str, mask: u32) -> u32 {
        input.parse::<SignalValue>().unwrap().resolve(mask)
    }

    #[test]
    fn bad_value_is_rejected() {
        pretty_assertions::assert_eq!(
            "high".parse::<SignalValue>().unwrap_err(),
            SignalError::InvalidValue("high".to_string())
        );
    }
}
