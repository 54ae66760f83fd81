//! Conversion between words and the bit arrays clocked by the adapter.
//!
//! Bit `i` of a word is placed at array position `i` when shifting LSB first, and at
//! position `bits - 1 - i` when shifting MSB first. The adapter clocks array position 0
//! first.

use bitvec::{array::BitArray, order::Lsb0};

use super::SwdError;
use crate::adapter::{Adapter, BitDirection};

/// The order in which the bits of a word are shifted onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOrder {
    LsbFirst,
    MsbFirst,
}

impl ShiftOrder {
    fn position(self, index: usize, bits: usize) -> usize {
        match self {
            ShiftOrder::LsbFirst => index,
            ShiftOrder::MsbFirst => bits - 1 - index,
        }
    }
}

impl TryFrom<u8> for ShiftOrder {
    type Error = SwdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ShiftOrder::LsbFirst),
            1 => Ok(ShiftOrder::MsbFirst),
            other => Err(SwdError::Parameter(format!(
                "invalid shift order {other}, expected 0 (LSB first) or 1 (MSB first)"
            ))),
        }
    }
}

/// The width of the word buffer used for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordWidth {
    Byte,
    Word,
}

impl WordWidth {
    pub fn bits(self) -> usize {
        match self {
            WordWidth::Byte => 8,
            WordWidth::Word => 32,
        }
    }

    fn check(self, bits: usize) -> Result<(), SwdError> {
        if (1..=self.bits()).contains(&bits) {
            Ok(())
        } else {
            Err(SwdError::Parameter(format!(
                "bit count {bits} is outside of 1..={} for a {}-bit word",
                self.bits(),
                self.bits()
            )))
        }
    }
}

/// A bit buffer large enough for one word.
pub type WordBits = BitArray<[u8; 4], Lsb0>;

/// Places the lower `bits` bits of `word` into a bit array.
pub fn encode(
    word: u32,
    bits: usize,
    width: WordWidth,
    order: ShiftOrder,
) -> Result<WordBits, SwdError> {
    width.check(bits)?;

    let mut buffer = WordBits::ZERO;
    for i in 0..bits {
        buffer.set(order.position(i, bits), word >> i & 1 == 1);
    }

    Ok(buffer)
}

/// Reconstructs a word from the first `bits` bits of a bit array.
pub fn decode(
    buffer: &WordBits,
    bits: usize,
    width: WordWidth,
    order: ShiftOrder,
) -> Result<u32, SwdError> {
    width.check(bits)?;

    let mut word = 0;
    for i in 0..bits {
        if buffer[order.position(i, bits)] {
            word |= 1 << i;
        }
    }

    Ok(word)
}

fn mosi(
    adapter: &mut Adapter,
    word: u32,
    bits: usize,
    width: WordWidth,
    order: ShiftOrder,
) -> Result<usize, SwdError> {
    let out = encode(word, bits, width, order)?;
    let mut input = WordBits::ZERO;

    tracing::trace!("MOSI {bits} bits: {word:#x}");

    adapter
        .transfer(bits, &out[..], &mut input[..], BitDirection::Mosi)
        .map_err(SwdError::Driver)
}

fn miso(
    adapter: &mut Adapter,
    bits: usize,
    width: WordWidth,
    order: ShiftOrder,
) -> Result<u32, SwdError> {
    width.check(bits)?;

    let out = WordBits::ZERO;
    let mut input = WordBits::ZERO;

    adapter
        .transfer(bits, &out[..], &mut input[..], BitDirection::Miso)
        .map_err(SwdError::Driver)?;

    let word = decode(&input, bits, width, order)?;
    tracing::trace!("MISO {bits} bits: {word:#x}");

    Ok(word)
}

/// Shifts out up to 8 bits of `data`. Returns the number of bits transferred.
pub fn mosi_8(
    adapter: &mut Adapter,
    data: u8,
    bits: usize,
    order: ShiftOrder,
) -> Result<usize, SwdError> {
    mosi(adapter, u32::from(data), bits, WordWidth::Byte, order)
}

/// Shifts out up to 32 bits of `data`. Returns the number of bits transferred.
pub fn mosi_32(
    adapter: &mut Adapter,
    data: u32,
    bits: usize,
    order: ShiftOrder,
) -> Result<usize, SwdError> {
    mosi(adapter, data, bits, WordWidth::Word, order)
}

/// Shifts in up to 8 bits.
pub fn miso_8(adapter: &mut Adapter, bits: usize, order: ShiftOrder) -> Result<u8, SwdError> {
    // At most 8 bits are decoded, so the value always fits.
    miso(adapter, bits, WordWidth::Byte, order).map(|word| word as u8)
}

/// Shifts in up to 32 bits.
pub fn miso_32(adapter: &mut Adapter, bits: usize, order: ShiftOrder) -> Result<u32, SwdError> {
    miso(adapter, bits, WordWidth::Word, order)
}
