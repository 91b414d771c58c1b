//! MSB-first bit buffer (spec §4.1).
//!
//! Every field codec reads and writes through this type rather than raw
//! bytes: DCCL fields are packed to their exact declared bit width, so the
//! unit of currency between codecs is bits, not bytes. Byte alignment only
//! re-appears at the head/body boundary and at the end of the body
//! (`Message` codec, §4.9).
//!
//! Backed by [`bitvec`]'s `BitVec<u8, Msb0>`, which already is the "ordered
//! sequence of bits, MSB-first" the spec asks for.

use bitvec::prelude::*;

use crate::result::{Error, Result};

/// An MSB-first bit sequence with an optional upstream source for
/// streaming decode (spec §4.1, "get_more_bits").
///
/// Bits are appended at the *back* (the later-encoded end) and consumed
/// from the *front* (the earlier-encoded end), matching the "header-first,
/// body-second, earlier fields at lower bit positions" ordering policy.
#[derive(Debug, Clone, Default)]
pub struct BitBuffer {
    bits: BitVec<u8, Msb0>,
    parent: Option<Box<BitBuffer>>,
}

impl BitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bits: BitVec::with_capacity(bits),
            parent: None,
        }
    }

    /// Wraps a buffer so that it can pull additional bits from `parent`
    /// once its own supply runs out (see [`BitBuffer::get_more_bits`]).
    pub fn with_parent(self, parent: BitBuffer) -> Self {
        Self {
            bits: self.bits,
            parent: Some(Box::new(parent)),
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn push_back(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    pub fn push_front(&mut self, bit: bool) {
        self.bits.insert(0, bit);
    }

    /// Places `other`'s bits on the high-index (later-encoded) end.
    pub fn append(&mut self, other: &BitBuffer) {
        self.bits.extend_from_bitslice(&other.bits);
    }

    /// Places `other`'s bits on the low-index (earlier-encoded) end.
    pub fn prepend(&mut self, other: &BitBuffer) {
        let mut combined = other.bits.clone();
        combined.extend_from_bitslice(&self.bits);
        self.bits = combined;
    }

    /// Pushes the low `width` bits of `value`, MSB first, onto the back.
    pub fn push_uint(&mut self, value: u64, width: usize) {
        debug_assert!(width <= 64);
        for i in (0..width).rev() {
            self.bits.push((value >> i) & 1 != 0);
        }
    }

    /// Pads with zero bits until the length is a multiple of 8.
    pub fn pad_to_byte(&mut self) {
        while self.bits.len() % 8 != 0 {
            self.bits.push(false);
        }
    }

    pub fn resize(&mut self, new_len: usize, value: bool) {
        self.bits.resize(new_len, value);
    }

    /// Packs the whole buffer MSB-first into bytes. The bit at the highest
    /// index ends up in the high bit of the first output byte.
    pub fn to_byte_string(&self) -> Result<Vec<u8>> {
        if self.bits.len() % 8 != 0 {
            return Err(Error::Schema(format!(
                "bit buffer length {} is not a whole number of bytes",
                self.bits.len()
            )));
        }
        Ok(self.bits.clone().into_vec())
    }

    pub fn from_byte_string(bytes: &[u8]) -> Self {
        Self {
            bits: BitVec::from_slice(bytes),
            parent: None,
        }
    }

    /// Ensures at least `n` bits are available at the front of the buffer,
    /// pulling from `parent` (recursively) if the local supply is short.
    /// Fails with [`Error::Underflow`] once the chain is exhausted.
    pub fn get_more_bits(&mut self, n: usize) -> Result<()> {
        if self.bits.len() >= n {
            return Ok(());
        }
        let needed = n - self.bits.len();
        match self.parent.as_deref_mut() {
            Some(parent) => {
                parent.get_more_bits(needed)?;
                let pulled = parent.take_front(needed)?;
                self.bits.extend_from_bitslice(&pulled.bits);
                Ok(())
            }
            None => Err(Error::Underflow {
                requested: n,
                available: self.bits.len(),
            }),
        }
    }

    /// Pops `n` bits off the front, pulling from the parent chain first if
    /// necessary.
    pub fn take_front(&mut self, n: usize) -> Result<BitBuffer> {
        self.get_more_bits(n)?;
        let taken: BitVec<u8, Msb0> = self.bits[..n].to_bitvec();
        let remaining = self.bits[n..].to_bitvec();
        self.bits = remaining;
        Ok(BitBuffer {
            bits: taken,
            parent: None,
        })
    }

    pub fn take_bit(&mut self) -> Result<bool> {
        self.get_more_bits(1)?;
        let bit = self.bits[0];
        self.bits.remove(0);
        Ok(bit)
    }

    /// Pops `width` bits off the front and reconstructs them MSB-first as
    /// an unsigned integer.
    pub fn take_uint(&mut self, width: usize) -> Result<u64> {
        self.get_more_bits(width)?;
        let mut value: u64 = 0;
        for bit in self.bits[..width].iter() {
            value = (value << 1) | (*bit as u64);
        }
        let remaining = self.bits[width..].to_bitvec();
        self.bits = remaining;
        Ok(value)
    }

    pub fn peek_uint(&mut self, width: usize) -> Result<u64> {
        self.get_more_bits(width)?;
        let mut value: u64 = 0;
        for bit in self.bits[..width].iter() {
            value = (value << 1) | (*bit as u64);
        }
        Ok(value)
    }
}

/// Smallest number of bits needed to represent `count` distinct values
/// (`ceil(log2(count))`, spec-wide shorthand used by nearly every codec's
/// `size()`).
pub fn bits_for_value_count(count: u64) -> usize {
    if count <= 1 {
        return 0;
    }
    (u64::BITS - (count - 1).leading_zeros()) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip_is_msb_first() {
        let mut buf = BitBuffer::new();
        buf.push_uint(0b1010_1100, 8);
        assert_eq!(buf.to_byte_string().unwrap(), vec![0b1010_1100]);
    }

    #[test]
    fn push_then_take_round_trips() {
        let mut buf = BitBuffer::new();
        buf.push_uint(5, 3);
        buf.push_uint(200, 8);
        assert_eq!(buf.take_uint(3).unwrap(), 5);
        assert_eq!(buf.take_uint(8).unwrap(), 200);
    }

    #[test]
    fn underflow_without_parent() {
        let mut buf = BitBuffer::new();
        buf.push_uint(1, 1);
        assert!(matches!(buf.take_uint(5), Err(Error::Underflow { .. })));
    }

    #[test]
    fn get_more_bits_pulls_from_parent() {
        let mut parent = BitBuffer::new();
        parent.push_uint(0b1011, 4);
        let mut child = BitBuffer::new().with_parent(parent);
        child.push_uint(0b1, 1);
        assert_eq!(child.take_uint(5).unwrap(), 0b1_1011);
    }

    #[test]
    fn bits_for_value_count_matches_ceil_log2() {
        assert_eq!(bits_for_value_count(1), 0);
        assert_eq!(bits_for_value_count(2), 1);
        assert_eq!(bits_for_value_count(3), 2);
        assert_eq!(bits_for_value_count(4), 2);
        assert_eq!(bits_for_value_count(5), 3);
        assert_eq!(bits_for_value_count(256), 8);
        assert_eq!(bits_for_value_count(257), 9);
    }
}
