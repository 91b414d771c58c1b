//! `dccl.default.static` codec (spec §4.9 family): a zero-width field
//! whose value is entirely determined by the schema (`static_value`). Costs
//! no bits on the wire; used for version tags and constant discriminators
//! that still want to show up in a decoded [`crate::value::Message`].

use crate::bitbuf::BitBuffer;
use crate::result::{Error, Result};
use crate::schema::FieldDescriptor;
use crate::value::FieldValue;

use super::{CodecContext, FieldCodec, NullStrategy};

#[derive(Debug, Clone, Copy)]
pub struct StaticCodec;

impl StaticCodec {
    fn declared(field: &FieldDescriptor) -> Result<&str> {
        field
            .options()
            .static_value
            .as_deref()
            .ok_or_else(|| Error::Schema(format!("static field `{}` is missing static_value", field.name())))
    }
}

impl FieldCodec for StaticCodec {
    fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        Self::declared(field)?;
        Ok(())
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::None
    }

    fn encode_empty(&self, _field: &FieldDescriptor) -> Result<BitBuffer> {
        Ok(BitBuffer::new())
    }

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, _ctx: &CodecContext) -> Result<BitBuffer> {
        let declared = Self::declared(field)?;
        if let Some(s) = value.as_string() {
            if s != declared {
                return Err(Error::Schema(format!(
                    "static field `{}` received `{s}`, schema declares `{declared}`",
                    field.name()
                )));
            }
        }
        Ok(BitBuffer::new())
    }

    fn decode(&self, field: &FieldDescriptor, _bits: &mut BitBuffer, _ctx: &CodecContext) -> Result<Option<FieldValue>> {
        Ok(Some(FieldValue::String(Self::declared(field)?.to_string())))
    }

    fn size_empty(&self, _field: &FieldDescriptor) -> Result<usize> {
        Ok(0)
    }

    fn size(&self, _field: &FieldDescriptor, _value: &FieldValue) -> Result<usize> {
        Ok(0)
    }

    fn min_size(&self, _field: &FieldDescriptor) -> Result<usize> {
        Ok(0)
    }

    fn max_size(&self, _field: &FieldDescriptor) -> Result<usize> {
        Ok(0)
    }

    fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8> {
        let mut out = b"static".to_vec();
        out.extend_from_slice(Self::declared(field).unwrap_or("").as_bytes());
        out
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        format!("static[{:?}]", field.options().static_value)
    }
}
