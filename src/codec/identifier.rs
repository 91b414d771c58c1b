//! Message identifier codec (spec §6, "Wire layout: identifier"):
//! 1 byte for ids in `0..=127`, 2 bytes for ids in `128..=32767`, with the
//! long-form marker carried as the low bit of the first serialized byte.
//!
//! Spec §4.13's prose (a generic "shift left one, OR in the
//! discriminator" Bitset push) and §6's literal wire contract ("LSB of the
//! first byte set means a 2-byte id follows") only agree for ids that fit
//! unsigned in the combined width; pushed as one `(id << 1) | disc`
//! integer via ordinary MSB-first bit packing, id 256 example:
//! `(256 << 1) | 1 = 513 = 0b10_0000_0001` packed into 16 bits is
//! `0000_0010_0000_0001`, whose first byte's LSB is 0, breaking the
//! wire contract it's supposed to satisfy. The two bytes are therefore
//! built directly instead of derived from one packed integer — see
//! DESIGN.md.

use crate::bitbuf::BitBuffer;
use crate::result::{Error, Result};

pub const ONE_BYTE_MAX_ID: u32 = 127;
pub const TWO_BYTE_MAX_ID: u32 = 32_767;

/// Encodes a message id as either a 1-byte (short form) or 2-byte (long
/// form) identifier, byte-aligned, at the very front of a frame.
pub fn encode_id(id: u32) -> Result<BitBuffer> {
    let mut buf = BitBuffer::new();
    if id <= ONE_BYTE_MAX_ID {
        buf.push_uint((id << 1) as u64, 8);
    } else if id <= TWO_BYTE_MAX_ID {
        let byte0 = ((id >> 8) << 1) | 1;
        let byte1 = id & 0xFF;
        buf.push_uint(byte0 as u64, 8);
        buf.push_uint(byte1 as u64, 8);
    } else {
        return Err(Error::Schema(format!("id {id} exceeds the maximum two-byte id {TWO_BYTE_MAX_ID}")));
    }
    Ok(buf)
}

/// Reads an identifier off the front of `bits`, consuming either 1 or 2
/// bytes depending on the discriminator bit.
pub fn decode_id(bits: &mut BitBuffer) -> Result<u32> {
    let byte0 = bits.take_uint(8)? as u32;
    if byte0 & 1 == 0 {
        Ok(byte0 >> 1)
    } else {
        let byte1 = bits.take_uint(8)? as u32;
        Ok(((byte0 >> 1) << 8) | byte1)
    }
}

/// Bits an identifier will occupy on the wire without consuming anything.
pub fn id_size_bits(id: u32) -> usize {
    if id <= ONE_BYTE_MAX_ID {
        8
    } else {
        16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_round_trips() {
        for id in [0u32, 1, 64, 127] {
            let mut buf = encode_id(id).unwrap();
            assert_eq!(buf.len(), 8);
            assert_eq!(decode_id(&mut buf).unwrap(), id);
        }
    }

    #[test]
    fn long_form_round_trips() {
        for id in [128u32, 200, 255, 256, 32767] {
            let mut buf = encode_id(id).unwrap();
            assert_eq!(buf.len(), 16);
            assert_eq!(decode_id(&mut buf).unwrap(), id);
        }
    }

    #[test]
    fn long_form_discriminator_bit_is_set() {
        let buf = encode_id(256).unwrap();
        let bytes = buf.to_byte_string().unwrap();
        assert_eq!(bytes[0] & 1, 1, "first byte's LSB must flag the long form");
    }

    #[test]
    fn id_beyond_two_byte_range_is_rejected() {
        assert!(encode_id(TWO_BYTE_MAX_ID + 1).is_err());
    }
}
