//! `dccl.presence` decorator (spec §4.8): wraps any other singular codec
//! and adds a leading presence bit, so an otherwise-required-shaped codec
//! (one with no reserved null code of its own — nested messages, static
//! fields used optionally, or any codec whose author didn't wire up
//! `ReservedCode`) can still participate in an optional field. An absent
//! value costs exactly the presence bit — nothing of the inner codec's
//! width is written or read — which is the whole point relative to the
//! numeric codec's reserved-null-code strategy when the inner codec is
//! wide (spec §4.8).

use crate::bitbuf::BitBuffer;
use crate::result::Result;
use crate::schema::{FieldDescriptor, Label};
use crate::value::FieldValue;

use super::{CodecContext, FieldCodec, NullStrategy};

/// A copy of `field` with its label forced to `Required`. The inner codec
/// is driven through this shape rather than the caller's actual (optional)
/// field, so a numeric/bool/enum inner codec doesn't also reserve its own
/// null code on top of the presence bit — the two absence strategies
/// would otherwise stack and waste a representable value for nothing.
pub fn as_required(field: &FieldDescriptor) -> Result<FieldDescriptor> {
    field.with_label(Label::Required)
}

pub struct PresenceCodec {
    inner: Box<dyn FieldCodec>,
    /// `field`, but with `Label::Required` — see [`as_required`].
    inner_field: FieldDescriptor,
}

impl PresenceCodec {
    pub fn new(inner: Box<dyn FieldCodec>, field: &FieldDescriptor) -> Result<Self> {
        Ok(Self {
            inner,
            inner_field: as_required(field)?,
        })
    }
}

impl FieldCodec for PresenceCodec {
    fn validate(&self, _field: &FieldDescriptor) -> Result<()> {
        self.inner.validate(&self.inner_field)
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::PresenceBit
    }

    fn encode_empty(&self, _field: &FieldDescriptor) -> Result<BitBuffer> {
        let mut buf = BitBuffer::with_capacity(1);
        buf.push_uint(0, 1);
        Ok(buf)
    }

    fn encode(&self, _field: &FieldDescriptor, value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer> {
        let mut buf = BitBuffer::with_capacity(1);
        buf.push_uint(1, 1);
        buf.append(&self.inner.encode(&self.inner_field, value, ctx)?);
        Ok(buf)
    }

    fn decode(&self, _field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Option<FieldValue>> {
        if bits.take_uint(1)? == 0 {
            return Ok(None);
        }
        self.inner.decode(&self.inner_field, bits, ctx)
    }

    fn size_empty(&self, _field: &FieldDescriptor) -> Result<usize> {
        Ok(1)
    }

    fn size(&self, _field: &FieldDescriptor, value: &FieldValue) -> Result<usize> {
        Ok(1 + self.inner.size(&self.inner_field, value)?)
    }

    fn min_size(&self, _field: &FieldDescriptor) -> Result<usize> {
        Ok(1)
    }

    fn max_size(&self, _field: &FieldDescriptor) -> Result<usize> {
        Ok(1 + self.inner.max_size(&self.inner_field)?)
    }

    fn hash_contribution(&self, _field: &FieldDescriptor) -> Vec<u8> {
        let mut out = b"presence".to_vec();
        out.extend(self.inner.hash_contribution(&self.inner_field));
        out
    }

    fn info(&self, _field: &FieldDescriptor) -> String {
        format!("presence<{}>", self.inner.info(&self.inner_field))
    }
}
