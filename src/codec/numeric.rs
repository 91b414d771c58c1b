//! `dccl.default2`/`dccl.default3` numeric codec family (spec §4.4):
//! integers and floating point, packed as a fixed-width integer count of
//! `precision`-scaled steps from `min`.

use tracing::debug;

use crate::bitbuf::{bits_for_value_count, BitBuffer};
use crate::result::{Error, Result};
use crate::schema::FieldDescriptor;
use crate::value::FieldValue;

use super::{CodecContext, FieldCodec, NullStrategy};

/// Numeric field codec: applies `precision`-scaled rounding, then clamps or
/// rejects against `[min, max]` depending on `ctx.strict`, then packs the
/// zero-based step count in the smallest fixed width that holds every
/// representable step (plus one reserved all-ones code for "absent" when
/// the field is optional).
#[derive(Debug, Clone, Copy)]
pub struct NumericCodec;

impl NumericCodec {
    fn scale(precision: i32) -> f64 {
        10f64.powi(precision)
    }

    fn step_count(field: &FieldDescriptor) -> Result<u64> {
        let min = field
            .options()
            .min
            .ok_or_else(|| Error::Schema(format!("field `{}` is missing min", field.name())))?;
        let max = field
            .options()
            .max
            .ok_or_else(|| Error::Schema(format!("field `{}` is missing max", field.name())))?;
        let scale = Self::scale(field.options().precision);
        let steps = ((max - min) * scale).round() as u64;
        Ok(steps + 1)
    }

    fn width(field: &FieldDescriptor) -> Result<usize> {
        let steps = Self::step_count(field)?;
        let representable = if field.is_optional() { steps + 1 } else { steps };
        Ok(bits_for_value_count(representable))
    }

    fn null_code(field: &FieldDescriptor) -> Result<u64> {
        let width = Self::width(field)?;
        Ok(if width == 0 { 0 } else { (1u64 << width) - 1 })
    }

    fn encode_step(&self, field: &FieldDescriptor, raw: f64, ctx: &CodecContext) -> Result<u64> {
        let min = field.options().min.unwrap();
        let max = field.options().max.unwrap();
        let scale = Self::scale(field.options().precision);
        let clamped = if raw < min || raw > max {
            if ctx.strict {
                return Err(Error::OutOfRange {
                    field: field.name().clone(),
                    value: raw,
                    min,
                    max,
                });
            }
            debug!(field = field.name(), value = raw, min, max, "clamping out-of-range numeric field");
            raw.clamp(min, max)
        } else {
            raw
        };
        Ok(((clamped - min) * scale).round() as u64)
    }
}

impl FieldCodec for NumericCodec {
    fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        Self::step_count(field)?;
        Ok(())
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::ReservedCode
    }

    fn encode_empty(&self, field: &FieldDescriptor) -> Result<BitBuffer> {
        let width = Self::width(field)?;
        let mut buf = BitBuffer::with_capacity(width);
        buf.push_uint(Self::null_code(field)?, width);
        Ok(buf)
    }

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer> {
        let raw = value
            .as_f64()
            .ok_or_else(|| Error::Schema(format!("field `{}` expects a numeric value", field.name())))?;
        let step = self.encode_step(field, raw, ctx)?;
        let width = Self::width(field)?;
        let mut buf = BitBuffer::with_capacity(width);
        buf.push_uint(step, width);
        Ok(buf)
    }

    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Option<FieldValue>> {
        let _ = ctx;
        let width = Self::width(field)?;
        let step = bits.take_uint(width)?;
        if field.is_optional() && step == Self::null_code(field)? {
            return Ok(None);
        }
        let min = field.options().min.unwrap();
        let scale = Self::scale(field.options().precision);
        let raw = min + (step as f64) / scale;
        Ok(Some(match field.wire_kind() {
            crate::schema::WireKind::Float | crate::schema::WireKind::Double => FieldValue::F64(raw),
            crate::schema::WireKind::Int32 | crate::schema::WireKind::Int64 => FieldValue::I64(raw.round() as i64),
            _ => FieldValue::U64(raw.round() as u64),
        }))
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
        let mut out = b"numeric".to_vec();
        out.extend_from_slice(&field.options().min.unwrap_or(0.0).to_bits().to_be_bytes());
        out.extend_from_slice(&field.options().max.unwrap_or(0.0).to_bits().to_be_bytes());
        out.extend_from_slice(&field.options().precision.to_be_bytes());
        out
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        format!(
            "numeric[min={:?}, max={:?}, precision={}]",
            field.options().min,
            field.options().max,
            field.options().precision
        )
    }
}
