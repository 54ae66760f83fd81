//! Turnaround of the bidirectional SWD data line.
//!
//! Before the drive direction changes, the direction control signal is set and a few
//! idle cycles are clocked in which neither side drives the line.

use bitvec::{array::BitArray, order::Lsb0};

use super::SwdError;
use crate::adapter::{signal::SignalValue, Adapter, BitDirection};

/// Fewest turnaround cycles allowed.
pub const TRN_MIN: u8 = 1;
/// Most turnaround cycles allowed.
pub const TRN_MAX: u8 = 4;

/// The adapter signal controlling the direction of the data line buffer.
///
/// Low while the host drives the line, high while the target drives it.
pub const DIRECTION_SIGNAL: &str = "RnW";

/// Turns the line around so the host drives it.
pub fn mosi_trn(adapter: &mut Adapter, bits: u8) -> Result<u8, SwdError> {
    turnaround(adapter, bits, SignalValue::Low)
}

/// Turns the line around so the target drives it.
pub fn miso_trn(adapter: &mut Adapter, bits: u8) -> Result<u8, SwdError> {
    turnaround(adapter, bits, SignalValue::High)
}

fn turnaround(adapter: &mut Adapter, bits: u8, direction: SignalValue) -> Result<u8, SwdError> {
    if !(TRN_MIN..=TRN_MAX).contains(&bits) {
        return Err(SwdError::Turnaround {
            cycles: bits,
            min: TRN_MIN,
            max: TRN_MAX,
        });
    }

    tracing::trace!("Turnaround of {bits} cycles, {DIRECTION_SIGNAL}={direction:?}");

    adapter
        .write_signal(DIRECTION_SIGNAL, direction)
        .map_err(SwdError::Driver)?;

    let out = BitArray::<[u8; 1], Lsb0>::ZERO;
    let mut input = BitArray::<[u8; 1], Lsb0>::ZERO;

    adapter
        .transfer(
            usize::from(bits),
            &out[..],
            &mut input[..],
            BitDirection::Turnaround,
        )
        .map_err(SwdError::Driver)?;

    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        fake_adapter::FakeOperation, signal::SignalOp, AdapterError, FakeAdapter,
    };
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn adapter_with_direction_signal() -> (FakeAdapter, Adapter) {
        let fake = FakeAdapter::new();
        let mut adapter = Adapter::new(Box::new(fake.clone()));
        adapter.signals_mut().add(DIRECTION_SIGNAL, 0x100).unwrap();
        (fake, adapter)
    }

    #[test_case(0; "below minimum")]
    #[test_case(5; "above maximum")]
    #[test_case(255; "far above maximum")]
    fn out_of_range_is_rejected_without_hardware_access(bits: u8) {
        let (fake, mut adapter) = adapter_with_direction_signal();

        assert!(matches!(
            mosi_trn(&mut adapter, bits),
            Err(SwdError::Turnaround { cycles, .. }) if cycles == bits
        ));
        assert!(matches!(
            miso_trn(&mut adapter, bits),
            Err(SwdError::Turnaround { cycles, .. }) if cycles == bits
        ));
        assert!(fake.operations().is_empty());
    }

    #[test]
    fn out_of_range_message_names_the_limits() {
        let (_fake, mut adapter) = adapter_with_direction_signal();

        let error = mosi_trn(&mut adapter, 7).unwrap_err();

        assert_eq!(
            error.to_string(),
            "A turnaround of 7 cycles is outside of the supported range 1..=4."
        );
    }

    #[test]
    fn miso_turnaround_sets_direction_high() {
        let (fake, mut adapter) = adapter_with_direction_signal();

        assert_eq!(miso_trn(&mut adapter, 2).unwrap(), 2);

        assert_eq!(
            fake.operations(),
            vec![
                FakeOperation::Bitbang {
                    signal: DIRECTION_SIGNAL.to_string(),
                    op: SignalOp::Write(0x100),
                    result: 0x100,
                },
                FakeOperation::Transfer {
                    direction: BitDirection::Turnaround,
                    mosi: vec![false, false],
                },
            ]
        );
    }

    #[test]
    fn mosi_turnaround_sets_direction_low() {
        let (fake, mut adapter) = adapter_with_direction_signal();
        miso_trn(&mut adapter, TRN_MIN).unwrap();

        mosi_trn(&mut adapter, TRN_MAX).unwrap();

        assert_eq!(fake.pins(), 0);
        assert_eq!(adapter.signals().find(DIRECTION_SIGNAL).unwrap().value(), 0);
    }

    #[test]
    fn missing_direction_signal_is_a_driver_error() {
        let fake = FakeAdapter::new();
        let mut adapter = Adapter::new(Box::new(fake));

        assert!(matches!(
            mosi_trn(&mut adapter, 1),
            Err(SwdError::Driver(AdapterError::Signal(_)))
        ));
    }

    #[test]
    fn transfer_failure_is_a_driver_error() {
        let (fake, mut adapter) = adapter_with_direction_signal();
        fake.fail_transfer_after(0);

        assert!(matches!(
            miso_trn(&mut adapter, 1),
            Err(SwdError::Driver(AdapterError::AdapterSpecific(_)))
        ));
    }
}
