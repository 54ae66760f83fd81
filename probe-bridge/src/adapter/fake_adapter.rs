//! An in-memory debug adapter.
//!
//! [`FakeAdapter`] implements the whole capability contract without hardware. It keeps a
//! 32-bit pin state for bitbanging, records every operation, and answers MISO transfers
//! either from scripted bits or from a small emulated SWD target.
//!
//! The adapter is a cheap handle: clones share their state, so a test can keep one clone
//! for inspection after moving another into a session.

use bitvec::{order::Lsb0, slice::BitSlice, view::BitView};
use parking_lot::Mutex;
use std::{collections::HashMap, collections::VecDeque, sync::Arc};

use super::{
    signal::{Signal, SignalOp},
    AdapterError, BitDirection, BitTransfer, BitbangAccess, DebugAdapter,
};
use crate::transport::swd::turnaround::DIRECTION_SIGNAL;

/// The driver name of the fake adapter in the driver catalogue.
pub const DRIVER_NAME: &str = "dummy";

/// The IDCODE reported by the emulated target of the `dummy` driver.
pub const DUMMY_IDCODE: u32 = 0x2ba0_1477;

/// The highest clock the fake adapter accepts, in kHz.
pub const MAX_KHZ: u32 = 100_000;

#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum FakeAdapterError {
    /// Injected failure after {0} successful transfers.
    InjectedFailure(usize),
}

/// An operation performed on the fake adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOperation {
    Bitbang {
        signal: String,
        op: SignalOp,
        result: u32,
    },
    Transfer {
        direction: BitDirection,
        /// The bits driven by the host, in clock order.
        mosi: Vec<bool>,
    },
}

impl FakeOperation {
    /// The host-driven bits of a transfer packed LSB first, if this is a transfer.
    pub fn mosi_value(&self) -> Option<u64> {
        match self {
            FakeOperation::Transfer { mosi, .. } => Some(pack(mosi)),
            FakeOperation::Bitbang { .. } => None,
        }
    }
}

fn pack(bits: &[bool]) -> u64 {
    bits.iter()
        .take(64)
        .enumerate()
        .fold(0, |acc, (i, bit)| acc | (u64::from(*bit) << i))
}

/// A register access request decoded by the emulated target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TargetRequest {
    access_port: bool,
    read: bool,
    address: u8,
}

impl TargetRequest {
    fn decode(byte: u8) -> Option<Self> {
        let start = byte & 0x01 != 0;
        let stop = byte & 0x40 != 0;
        let park = byte & 0x80 != 0;
        let parity = (byte >> 1 & 0x0f).count_ones() % 2 == 1;

        if !start || stop || !park || parity != (byte & 0x20 != 0) {
            return None;
        }

        Some(Self {
            access_port: byte & 0x02 != 0,
            read: byte & 0x04 != 0,
            address: (byte >> 1) & 0x0c,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum TargetPhase {
    #[default]
    Idle,
    Ack(TargetRequest),
    ReadData(u32),
    ReadParity(u32),
    WriteData(TargetRequest),
    WriteParity,
}

/// A minimal SWD target which answers every request with OK.
///
/// DP register 0 reads as the IDCODE, writes to it are ignored. All other registers
/// store what is written to them. AP reads return the register directly instead of the
/// posted result of the previous read.
#[derive(Debug, Clone)]
struct EmulatedTarget {
    idcode: u32,
    dp: HashMap<u8, u32>,
    ap: HashMap<u8, u32>,
    phase: TargetPhase,
}

impl EmulatedTarget {
    fn new(idcode: u32) -> Self {
        Self {
            idcode,
            dp: HashMap::new(),
            ap: HashMap::new(),
            phase: TargetPhase::Idle,
        }
    }

    fn register(&self, request: TargetRequest) -> u32 {
        match (request.access_port, request.address) {
            (false, 0) => self.idcode,
            (false, address) => self.dp.get(&address).copied().unwrap_or(0),
            (true, address) => self.ap.get(&address).copied().unwrap_or(0),
        }
    }

    fn host_bits(&mut self, bits: &[bool]) {
        self.phase = match (self.phase, bits.len()) {
            (TargetPhase::Idle, 8) => match TargetRequest::decode(pack(bits) as u8) {
                Some(request) => TargetPhase::Ack(request),
                None => TargetPhase::Idle,
            },
            (TargetPhase::WriteData(request), 32) => {
                let value = pack(bits) as u32;
                match (request.access_port, request.address) {
                    (false, 0) => {}
                    (false, address) => {
                        self.dp.insert(address, value);
                    }
                    (true, address) => {
                        self.ap.insert(address, value);
                    }
                }
                TargetPhase::WriteParity
            }
            (TargetPhase::WriteParity, 1) => TargetPhase::Idle,
            (phase, _) => phase,
        };
    }

    fn target_bits(&mut self, bits: usize) -> u64 {
        let (value, next) = match (self.phase, bits) {
            (TargetPhase::Ack(request), 3) if request.read => {
                (0b001, TargetPhase::ReadData(self.register(request)))
            }
            (TargetPhase::Ack(request), 3) => (0b001, TargetPhase::WriteData(request)),
            (TargetPhase::ReadData(value), 32) => {
                (u64::from(value), TargetPhase::ReadParity(value))
            }
            (TargetPhase::ReadParity(value), 1) => {
                (u64::from(value.count_ones() % 2), TargetPhase::Idle)
            }
            (phase, _) => (0, phase),
        };

        self.phase = next;
        value
    }
}

#[derive(Debug, Default)]
struct FakeState {
    pins: u32,
    speed: Option<u32>,
    miso_bits: VecDeque<bool>,
    target: Option<EmulatedTarget>,
    operations: Vec<FakeOperation>,
    transfers_until_failure: Option<usize>,
    transfers_done: usize,
    power_dropout: bool,
    srst_asserted: bool,
}

/// A debug adapter which exists only in memory.
#[derive(Debug, Clone)]
pub struct FakeAdapter {
    name: String,
    transports: Option<Vec<&'static str>>,
    signals: Vec<(&'static str, u32)>,
    bitbang: bool,
    transfer: bool,
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAdapter {
    /// Creates a fake adapter with all capabilities, declaring the `swd` transport.
    ///
    /// MISO transfers return scripted bits, or zeros once the script is exhausted.
    pub fn new() -> Self {
        Self {
            name: DRIVER_NAME.to_string(),
            transports: Some(vec!["swd"]),
            signals: Vec::new(),
            bitbang: true,
            transfer: true,
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    /// Creates the adapter used by the `dummy` driver, with an emulated target
    /// reporting [`DUMMY_IDCODE`] and the SWD direction signal on pin 8.
    pub fn dummy() -> Self {
        Self::new()
            .with_target(DUMMY_IDCODE)
            .with_signal(DIRECTION_SIGNAL, 0x100)
    }

    /// Attaches an emulated SWD target which answers requests instead of the script.
    pub fn with_target(self, idcode: u32) -> Self {
        self.state.lock().target = Some(EmulatedTarget::new(idcode));
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Sets the declared transports. `None` makes this a legacy driver.
    pub fn with_transports(mut self, transports: Option<&[&'static str]>) -> Self {
        self.transports = transports.map(<[_]>::to_vec);
        self
    }

    /// Declares a driver defined signal.
    pub fn with_signal(mut self, name: &'static str, mask: u32) -> Self {
        self.signals.push((name, mask));
        self
    }

    /// Removes the bitbang capability.
    pub fn without_bitbang(mut self) -> Self {
        self.bitbang = false;
        self
    }

    /// Removes the transfer capability.
    pub fn without_transfer(mut self) -> Self {
        self.transfer = false;
        self
    }

    /// Queues raw bits to be returned by MISO transfers.
    pub fn add_miso_bits(&self, bits: impl IntoIterator<Item = bool>) {
        self.state.lock().miso_bits.extend(bits);
    }

    /// Queues a 3-bit acknowledge value.
    pub fn add_ack(&self, ack: u8) {
        self.add_miso_bits(ack.view_bits::<Lsb0>()[..3].iter().by_vals());
    }

    /// Queues a read data phase: 32 data bits and their parity.
    pub fn add_read_data(&self, value: u32) {
        self.add_read_data_with_parity(value, value.count_ones() % 2 == 1);
    }

    /// Queues a read data phase with an explicit parity bit.
    pub fn add_read_data_with_parity(&self, value: u32, parity: bool) {
        self.add_miso_bits(value.view_bits::<Lsb0>().iter().by_vals());
        self.add_miso_bits([parity]);
    }

    /// Makes every transfer after the first `count` fail.
    pub fn fail_transfer_after(&self, count: usize) {
        let mut state = self.state.lock();
        state.transfers_until_failure = Some(state.transfers_done + count);
    }

    pub fn set_power_dropout(&self, dropout: bool) {
        self.state.lock().power_dropout = dropout;
    }

    pub fn set_srst_asserted(&self, asserted: bool) {
        self.state.lock().srst_asserted = asserted;
    }

    /// The current pin state.
    pub fn pins(&self) -> u32 {
        self.state.lock().pins
    }

    /// The speed value last applied.
    pub fn speed(&self) -> Option<u32> {
        self.state.lock().speed
    }

    /// All operations performed so far.
    pub fn operations(&self) -> Vec<FakeOperation> {
        self.state.lock().operations.clone()
    }

    /// The transfers performed so far.
    pub fn transfers(&self) -> Vec<FakeOperation> {
        self.operations()
            .into_iter()
            .filter(|op| matches!(op, FakeOperation::Transfer { .. }))
            .collect()
    }

    pub fn clear_operations(&self) {
        self.state.lock().operations.clear();
    }
}

impl DebugAdapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn transports(&self) -> Option<&[&'static str]> {
        self.transports.as_deref()
    }

    fn default_signals(&self) -> &[(&'static str, u32)] {
        &self.signals
    }

    fn khz_to_speed(&self, khz: u32) -> Result<u32, AdapterError> {
        if khz > MAX_KHZ {
            return Err(AdapterError::UnsupportedSpeed(khz));
        }
        Ok(khz)
    }

    fn speed_to_khz(&self, speed: u32) -> Result<u32, AdapterError> {
        Ok(speed)
    }

    fn set_speed(&mut self, speed: u32) -> Result<(), AdapterError> {
        self.state.lock().speed = Some(speed);
        Ok(())
    }

    fn power_dropout(&mut self) -> Result<bool, AdapterError> {
        Ok(self.state.lock().power_dropout)
    }

    fn srst_asserted(&mut self) -> Result<bool, AdapterError> {
        Ok(self.state.lock().srst_asserted)
    }

    fn get_interface_bitbang_mut(&mut self) -> Option<&mut dyn BitbangAccess> {
        if self.bitbang {
            Some(self as _)
        } else {
            None
        }
    }

    fn get_interface_transfer_mut(&mut self) -> Option<&mut dyn BitTransfer> {
        if self.transfer {
            Some(self as _)
        } else {
            None
        }
    }
}

impl BitbangAccess for FakeAdapter {
    fn bitbang(&mut self, signal: &Signal, op: SignalOp) -> Result<u32, AdapterError> {
        let mut state = self.state.lock();
        let mask = signal.mask();

        let result = match op {
            SignalOp::Read => state.pins & mask,
            SignalOp::Write(value) => {
                state.pins = (state.pins & !mask) | (value & mask);
                value & mask
            }
        };

        state.operations.push(FakeOperation::Bitbang {
            signal: signal.name().to_string(),
            op,
            result,
        });

        Ok(result)
    }
}

impl BitTransfer for FakeAdapter {
    fn transfer(
        &mut self,
        bits: usize,
        mosi: &BitSlice<u8>,
        miso: &mut BitSlice<u8>,
        direction: BitDirection,
    ) -> Result<usize, AdapterError> {
        let mut state = self.state.lock();

        if let Some(limit) = state.transfers_until_failure {
            if state.transfers_done >= limit {
                return Err(AdapterError::AdapterSpecific(Box::new(
                    FakeAdapterError::InjectedFailure(state.transfers_done),
                )));
            }
        }
        state.transfers_done += 1;

        let driven: Vec<bool> = mosi[..bits].iter().by_vals().collect();

        match direction {
            BitDirection::Miso => {
                let state = &mut *state;
                if let Some(target) = state.target.as_mut() {
                    let value = target.target_bits(bits);
                    for i in 0..bits {
                        miso.set(i, i < 64 && value >> i & 1 == 1);
                    }
                } else {
                    for i in 0..bits {
                        let bit = state.miso_bits.pop_front().unwrap_or(false);
                        miso.set(i, bit);
                    }
                }
            }
            BitDirection::Mosi => {
                if let Some(target) = state.target.as_mut() {
                    target.host_bits(&driven);
                }
                miso[..bits].fill(false);
            }
            BitDirection::Turnaround => miso[..bits].fill(false),
        }

        state.operations.push(FakeOperation::Transfer {
            direction,
            mosi: driven,
        });

        Ok(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::signal::SignalList;
    use pretty_assertions::assert_eq;

    fn transfer(adapter: &mut FakeAdapter, bits: usize, mosi: u64, direction: BitDirection) -> u64 {
        let mosi = mosi.to_le_bytes();
        let mut miso = [0u8; 8];
        adapter
            .transfer(
                bits,
                mosi.view_bits(),
                miso.view_bits_mut(),
                direction,
            )
            .unwrap();
        u64::from_le_bytes(miso)
    }

    #[test]
    fn bitbang_only_touches_masked_pins() {
        let mut signals = SignalList::new();
        signals.add("LOW", 0x0f).unwrap();
        signals.add("HIGH", 0xf0).unwrap();

        let mut adapter = FakeAdapter::new();
        adapter
            .bitbang(signals.find("LOW").unwrap(), SignalOp::Write(0xff))
            .unwrap();

        assert_eq!(adapter.pins(), 0x0f);
        assert_eq!(
            adapter
                .bitbang(signals.find("HIGH").unwrap(), SignalOp::Read)
                .unwrap(),
            0
        );
    }

    #[test]
    fn scripted_bits_are_returned_in_order() {
        let mut adapter = FakeAdapter::new();
        adapter.add_ack(0b001);
        adapter.add_read_data(0x1234_5678);

        assert_eq!(transfer(&mut adapter, 3, 0, BitDirection::Miso), 0b001);
        assert_eq!(
            transfer(&mut adapter, 32, 0, BitDirection::Miso),
            0x1234_5678
        );
        assert_eq!(transfer(&mut adapter, 1, 0, BitDirection::Miso), 1);
        assert_eq!(transfer(&mut adapter, 4, 0, BitDirection::Miso), 0);
    }

    #[test]
    fn emulated_target_answers_idcode_read() {
        let mut adapter = FakeAdapter::dummy();

        // Start, RnW, parity, park: DP read of register 0.
        transfer(&mut adapter, 8, 0xa5, BitDirection::Mosi);
        transfer(&mut adapter, 1, 0, BitDirection::Turnaround);

        assert_eq!(transfer(&mut adapter, 3, 0, BitDirection::Miso), 0b001);
        assert_eq!(
            transfer(&mut adapter, 32, 0, BitDirection::Miso),
            u64::from(DUMMY_IDCODE)
        );
        assert_eq!(
            transfer(&mut adapter, 1, 0, BitDirection::Miso),
            u64::from(DUMMY_IDCODE.count_ones() % 2)
        );
    }

    #[test]
    fn injected_failure() {
        let mut adapter = FakeAdapter::new();
        adapter.fail_transfer_after(1);

        transfer(&mut adapter, 1, 0, BitDirection::Mosi);

        let mosi = [0u8; 1];
        let mut miso = [0u8; 1];
        let result = adapter.transfer(
            1,
            mosi.view_bits(),
            miso.view_bits_mut(),
            BitDirection::Mosi,
        );

        assert!(matches!(result, Err(AdapterError::AdapterSpecific(_))));
        assert_eq!(adapter.transfers().len(), 1);
    }

    #[test]
    fn dummy_declares_direction_signal() {
        let adapter = crate::adapter::Adapter::new(Box::new(FakeAdapter::dummy()));

        assert_eq!(
            adapter.signals().find(DIRECTION_SIGNAL).unwrap().mask(),
            0x100
        );
    }

    #[test]
    fn clones_share_state() {
        let adapter = FakeAdapter::new();
        let mut clone = adapter.clone();
        clone.set_speed(400).unwrap();

        assert_eq!(adapter.speed(), Some(400));
    }
}
