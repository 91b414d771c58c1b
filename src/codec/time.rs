//! `dccl.time2` codec (spec §4.10): a seconds-of-day value, encoded with
//! the same scaled fixed-width packing as [`super::numeric::NumericCodec`]
//! over `[0, 86400)`.
//!
//! Spec §9 leaves open which calendar day a decoded seconds-of-day value
//! belongs to when the wall-clock time wraps past midnight between encode
//! and decode. This codec does not resolve that: it hands back the bare
//! seconds-of-day figure as `FieldValue::F64`, and reconstructing a full
//! timestamp (by picking the nearest midnight to a reference instant) is
//! left to the caller, same as the open question records.

use crate::bitbuf::BitBuffer;
use crate::result::{Error, Result};
use crate::schema::{FieldDescriptor, FieldOptions, WireKind};
use crate::value::FieldValue;

use super::numeric::NumericCodec;
use super::{CodecContext, FieldCodec, NullStrategy};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy)]
pub struct TimeCodec;

impl TimeCodec {
    fn as_numeric(field: &FieldDescriptor) -> Result<FieldDescriptor> {
        let options = FieldOptions {
            min: Some(0.0),
            max: Some(SECONDS_PER_DAY),
            precision: field.options().precision,
            max_repeat: field.options().max_repeat,
            in_head: field.options().in_head,
            ..Default::default()
        };
        let mut builder = crate::schema::FieldDescriptorBuilder::new(*field.index(), field.name().clone());
        builder.wire_kind(WireKind::Double).label(*field.label()).options(options);
        builder.build()
    }
}

impl FieldCodec for TimeCodec {
    fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        if !matches!(field.wire_kind(), WireKind::Double | WireKind::Float | WireKind::Int64 | WireKind::Uint64) {
            return Err(Error::Schema(format!(
                "time field `{}` must be a floating point or 64-bit integer wire kind",
                field.name()
            )));
        }
        Ok(())
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::ReservedCode
    }

    fn encode_empty(&self, field: &FieldDescriptor) -> Result<BitBuffer> {
        NumericCodec.encode_empty(&Self::as_numeric(field)?)
    }

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer> {
        let seconds = value
            .as_f64()
            .ok_or_else(|| Error::Schema(format!("field `{}` expects a time value in seconds-of-day", field.name())))?
            .rem_euclid(SECONDS_PER_DAY);
        NumericCodec.encode(&Self::as_numeric(field)?, &FieldValue::F64(seconds), ctx)
    }

    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Option<FieldValue>> {
        NumericCodec.decode(&Self::as_numeric(field)?, bits, ctx)
    }

    fn size_empty(&self, field: &FieldDescriptor) -> Result<usize> {
        NumericCodec.size_empty(&Self::as_numeric(field)?)
    }

    fn size(&self, field: &FieldDescriptor, value: &FieldValue) -> Result<usize> {
        NumericCodec.size(&Self::as_numeric(field)?, value)
    }

    fn min_size(&self, field: &FieldDescriptor) -> Result<usize> {
        NumericCodec.min_size(&Self::as_numeric(field)?)
    }

    fn max_size(&self, field: &FieldDescriptor) -> Result<usize> {
        NumericCodec.max_size(&Self::as_numeric(field)?)
    }

    fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8> {
        let mut out = b"time".to_vec();
        out.extend_from_slice(&field.options().precision.to_be_bytes());
        out
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        format!("time[precision={}]", field.options().precision)
    }
}
