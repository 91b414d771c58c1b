//! `dccl.hash` codec (spec §4.12, codec-version-4 family): writes/verifies
//! the owning message's structural hash, masked to the field's declared
//! `max`, letting a decoder notice a schema mismatch with a peer before
//! any other field is misinterpreted.
//!
//! Grounded in `codecs4/field_codec_hash.h`: the hash field is declared as
//! a `DefaultNumericFieldCodec<uint32>` with `min == 0` and
//! `max == 2^n - 1`, so its wire width is `ceil_log2(max + 1)` like any
//! other numeric field — there's no fixed width, only whatever the schema
//! author budgets for collisions.

use crate::bitbuf::BitBuffer;
use crate::result::{Error, Result};
use crate::schema::FieldDescriptor;
use crate::value::FieldValue;

use super::{CodecContext, FieldCodec, NullStrategy};

#[derive(Debug, Clone, Copy)]
pub struct HashCodec;

impl HashCodec {
    /// Bit width of the hash field, derived from its declared `max`
    /// (`min` must be `0`, `max` must be `2^n - 1` for some `n >= 1`).
    fn width(field: &FieldDescriptor) -> Result<usize> {
        let min = field
            .options()
            .min
            .ok_or_else(|| Error::Schema(format!("hash field `{}` is missing min", field.name())))?;
        if min != 0.0 {
            return Err(Error::Schema(format!("hash field `{}` must declare min = 0, got {min}", field.name())));
        }
        let max = field
            .options()
            .max
            .ok_or_else(|| Error::Schema(format!("hash field `{}` is missing max", field.name())))?;
        if max < 1.0 || max.fract() != 0.0 || max > u32::MAX as f64 {
            return Err(Error::Schema(format!(
                "hash field `{}` max must be an integer in [1, {}], got {max}",
                field.name(),
                u32::MAX
            )));
        }
        let count = max as u64 + 1;
        if !count.is_power_of_two() {
            return Err(Error::Schema(format!(
                "hash field `{}` max must be 2^n - 1 for some n, got {}",
                field.name(),
                max as u64
            )));
        }
        Ok(count.trailing_zeros() as usize)
    }

    fn mask(width: usize) -> u64 {
        if width == 0 {
            0
        } else {
            (1u64 << width) - 1
        }
    }
}

impl FieldCodec for HashCodec {
    fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        Self::width(field)?;
        Ok(())
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::None
    }

    fn encode_empty(&self, field: &FieldDescriptor) -> Result<BitBuffer> {
        Ok(BitBuffer::with_capacity(Self::width(field)?))
    }

    fn encode(&self, field: &FieldDescriptor, _value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer> {
        let width = Self::width(field)?;
        let mut buf = BitBuffer::with_capacity(width);
        buf.push_uint(ctx.message_hash & Self::mask(width), width);
        Ok(buf)
    }

    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Option<FieldValue>> {
        let width = Self::width(field)?;
        let received = bits.take_uint(width)?;
        let expected = ctx.message_hash & Self::mask(width);
        if received != expected {
            return Err(Error::HashMismatch {
                field: field.name().clone(),
                expected,
                received,
            });
        }
        Ok(Some(FieldValue::U64(received)))
    }

    fn size_empty(&self, field: &FieldDescriptor) -> Result<usize> {
        Self::width(field)
    }

    fn size(&self, field: &FieldDescriptor, _value: &FieldValue) -> Result<usize> {
        Self::width(field)
    }

    fn min_size(&self, field: &FieldDescriptor) -> Result<usize> {
        Self::width(field)
    }

    fn max_size(&self, field: &FieldDescriptor) -> Result<usize> {
        Self::width(field)
    }

    fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8> {
        let mut out = b"hash".to_vec();
        out.extend_from_slice(&field.options().max.unwrap_or_default().to_be_bytes());
        out
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        match Self::width(field) {
            Ok(width) => format!("hash[{width} bits]"),
            Err(_) => "hash[invalid]".to_string(),
        }
    }
}
