//! Repeated-field handling (spec §4.3/§4.9): not a `FieldCodec` itself,
//! since the spec gives repeated fields a distinct method set
//! (`encode_repeated`/`decode_repeated`/`size_repeated`/...) layered on top
//! of whichever singular codec the field's wire kind picks.
//!
//! Grounded in `DCCLFieldCodecBase::any_encode_repeated`/`any_decode_repeated`
//! (`examples/original_source/src/dccl_field_codec.cpp`): every element
//! slot is driven through the per-element codec as if the field were
//! `Optional` rather than `Repeated` — `this_field()->is_required()` is
//! false for a repeated field in the original too, so each slot already
//! reserves a null/presence representation the same way a true optional
//! field would.
//!
//! Two layout strategies, chosen by the element codec's
//! [`super::NullStrategy`] (spec §4.3: "The default repeated encoding lays
//! out exactly `max_repeat` slots, empty-encoded where absent;
//! presence-bit codecs instead encode an EOF symbol"):
//! - `ReservedCode`/`None`: always exactly `max_repeat` slots, trailing
//!   ones written with the element codec's `encode_empty`.
//! - `PresenceBit`: one slot per actual value, plus a single trailing
//!   "absent" slot marking end-of-list — skipped entirely when the list is
//!   already `max_repeat` long. This is strictly cheaper than the fixed
//!   layout once a presence bit is already being paid per element, since
//!   there's no need to also pad out every unused slot.

use tracing::debug;

use crate::bitbuf::BitBuffer;
use crate::result::Result;
use crate::schema::{FieldDescriptor, Label};
use crate::value::FieldValue;

use super::{CodecContext, FieldCodec, NullStrategy};

pub struct RepeatedCodec {
    inner: Box<dyn FieldCodec>,
}

impl RepeatedCodec {
    pub fn new(inner: Box<dyn FieldCodec>) -> Self {
        Self { inner }
    }

    /// The view each element slot is encoded/decoded through: `field`
    /// with its label forced to `Optional`, so the element codec reserves
    /// a null/presence representation exactly like a true optional field
    /// (see module docs).
    fn element_view(&self, field: &FieldDescriptor) -> Result<FieldDescriptor> {
        field.with_label(Label::Optional)
    }

    fn max_repeat(field: &FieldDescriptor) -> usize {
        field.options().max_repeat.unwrap_or(0) as usize
    }

    pub fn encode_repeated(&self, field: &FieldDescriptor, values: &[FieldValue], ctx: &CodecContext) -> Result<BitBuffer> {
        let max_repeat = Self::max_repeat(field);
        let truncated = values.len() > max_repeat;
        let used = values.len().min(max_repeat);
        if truncated {
            debug!(
                field = field.name(),
                declared = values.len(),
                max_repeat,
                "truncating repeated field to its declared max_repeat"
            );
        }
        let element = self.element_view(field)?;
        let mut buf = BitBuffer::new();
        match self.inner.null_strategy() {
            NullStrategy::PresenceBit => {
                for value in &values[..used] {
                    buf.append(&self.inner.encode(&element, value, ctx)?);
                }
                if used < max_repeat {
                    buf.append(&self.inner.encode_empty(&element)?);
                }
            }
            NullStrategy::ReservedCode | NullStrategy::None => {
                for i in 0..max_repeat {
                    if i < used {
                        buf.append(&self.inner.encode(&element, &values[i], ctx)?);
                    } else {
                        buf.append(&self.inner.encode_empty(&element)?);
                    }
                }
            }
        }
        Ok(buf)
    }

    pub fn decode_repeated(&self, field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Vec<FieldValue>> {
        let max_repeat = Self::max_repeat(field);
        let element = self.element_view(field)?;
        let mut out = Vec::new();
        match self.inner.null_strategy() {
            NullStrategy::PresenceBit => {
                for _ in 0..max_repeat {
                    match self.inner.decode(&element, bits, ctx)? {
                        Some(value) => out.push(value),
                        None => break,
                    }
                }
            }
            NullStrategy::ReservedCode | NullStrategy::None => {
                for _ in 0..max_repeat {
                    if let Some(value) = self.inner.decode(&element, bits, ctx)? {
                        out.push(value);
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn size_repeated(&self, field: &FieldDescriptor, values: &[FieldValue]) -> Result<usize> {
        let max_repeat = Self::max_repeat(field);
        let used = values.len().min(max_repeat);
        let element = self.element_view(field)?;
        let mut total = 0;
        match self.inner.null_strategy() {
            NullStrategy::PresenceBit => {
                for value in &values[..used] {
                    total += self.inner.size(&element, value)?;
                }
                if used < max_repeat {
                    total += self.inner.size_empty(&element)?;
                }
            }
            NullStrategy::ReservedCode | NullStrategy::None => {
                for i in 0..max_repeat {
                    total += if i < used {
                        self.inner.size(&element, &values[i])?
                    } else {
                        self.inner.size_empty(&element)?
                    };
                }
            }
        }
        Ok(total)
    }

    pub fn min_size_repeated(&self, field: &FieldDescriptor) -> Result<usize> {
        let max_repeat = Self::max_repeat(field);
        let element = self.element_view(field)?;
        match self.inner.null_strategy() {
            NullStrategy::PresenceBit => {
                if max_repeat == 0 {
                    Ok(0)
                } else {
                    self.inner.min_size(&element)
                }
            }
            NullStrategy::ReservedCode | NullStrategy::None => Ok(max_repeat * self.inner.min_size(&element)?),
        }
    }

    pub fn max_size_repeated(&self, field: &FieldDescriptor) -> Result<usize> {
        let max_repeat = Self::max_repeat(field);
        let element = self.element_view(field)?;
        Ok(max_repeat * self.inner.max_size(&element)?)
    }

    pub fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8> {
        let mut out = b"repeated".to_vec();
        out.extend_from_slice(&field.options().max_repeat.unwrap_or(0).to_be_bytes());
        out.extend(self.inner.hash_contribution(field));
        out
    }

    pub fn info(&self, field: &FieldDescriptor) -> String {
        format!("repeated<{}>[max_repeat={:?}]", self.inner.info(field), field.options().max_repeat)
    }
}
