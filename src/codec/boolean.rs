//! `dccl.default.bool` codec (spec §4.5): one bit required, two bits
//! optional.
//!
//! Uses the all-ones-at-width reserved code for "absent", the same
//! convention [`super::numeric::NumericCodec`] and
//! [`super::enums::EnumCodec`] use, rather than the original
//! implementation's reserved-zero-for-bool convention — an
//! implementation-detail choice the spec leaves open (see DESIGN.md).

use crate::bitbuf::BitBuffer;
use crate::result::{Error, Result};
use crate::schema::FieldDescriptor;
use crate::value::FieldValue;

use super::{CodecContext, FieldCodec, NullStrategy};

#[derive(Debug, Clone, Copy)]
pub struct BoolCodec;

impl BoolCodec {
    fn width(field: &FieldDescriptor) -> usize {
        if field.is_optional() {
            2
        } else {
            1
        }
    }

    fn null_code(field: &FieldDescriptor) -> u64 {
        (1u64 << Self::width(field)) - 1
    }
}

impl FieldCodec for BoolCodec {
    fn validate(&self, _field: &FieldDescriptor) -> Result<()> {
        Ok(())
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::ReservedCode
    }

    fn encode_empty(&self, field: &FieldDescriptor) -> Result<BitBuffer> {
        let mut buf = BitBuffer::with_capacity(Self::width(field));
        buf.push_uint(Self::null_code(field), Self::width(field));
        Ok(buf)
    }

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, _ctx: &CodecContext) -> Result<BitBuffer> {
        let b = value
            .as_bool()
            .ok_or_else(|| Error::Schema(format!("field `{}` expects a bool value", field.name())))?;
        let mut buf = BitBuffer::with_capacity(Self::width(field));
        buf.push_uint(b as u64, Self::width(field));
        Ok(buf)
    }

    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, _ctx: &CodecContext) -> Result<Option<FieldValue>> {
        let width = Self::width(field);
        let code = bits.take_uint(width)?;
        if field.is_optional() && code == Self::null_code(field) {
            return Ok(None);
        }
        Ok(Some(FieldValue::Bool(code != 0)))
    }

    fn size_empty(&self, field: &FieldDescriptor) -> Result<usize> {
        Ok(Self::width(field))
    }

    fn size(&self, field: &FieldDescriptor, _value: &FieldValue) -> Result<usize> {
        Ok(Self::width(field))
    }

    fn min_size(&self, field: &FieldDescriptor) -> Result<usize> {
        Ok(Self::width(field))
    }

    fn max_size(&self, field: &FieldDescriptor) -> Result<usize> {
        Ok(Self::width(field))
    }

    fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8> {
        vec![b'b', field.is_optional() as u8]
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        format!("bool[{}]", if field.is_optional() { "optional" } else { "required" })
    }
}
