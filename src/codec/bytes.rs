//! `dccl.default.string`/`dccl.default.bytes` (length-prefixed,
//! spec §4.7) and `dccl.var_bytes` (presence-bit, spec §4.7 variant) field
//! codecs.
//!
//! Non-strict mode truncates over-length values and logs, matching the
//! original implementation's `DefaultStringCodec` behavior; strict mode
//! rejects with `OutOfRange`.

use tracing::debug;

use crate::bitbuf::{bits_for_value_count, BitBuffer};
use crate::result::{Error, Result};
use crate::schema::{FieldDescriptor, WireKind};
use crate::value::FieldValue;

use super::{CodecContext, FieldCodec, NullStrategy};

fn max_length(field: &FieldDescriptor) -> Result<u32> {
    field
        .options()
        .max_length
        .ok_or_else(|| Error::Schema(format!("field `{}` is missing max_length", field.name())))
}

fn raw_bytes<'a>(field: &FieldDescriptor, value: &'a FieldValue) -> Result<std::borrow::Cow<'a, [u8]>> {
    match (field.wire_kind(), value) {
        (WireKind::String, FieldValue::String(s)) => Ok(std::borrow::Cow::Borrowed(s.as_bytes())),
        (WireKind::Bytes, FieldValue::Bytes(b)) => Ok(std::borrow::Cow::Borrowed(b.as_slice())),
        _ => Err(Error::Schema(format!(
            "field `{}` expects a value matching its wire kind",
            field.name()
        ))),
    }
}

fn to_field_value(field: &FieldDescriptor, bytes: Vec<u8>) -> Result<FieldValue> {
    match field.wire_kind() {
        WireKind::String => Ok(FieldValue::String(String::from_utf8(bytes)?)),
        WireKind::Bytes => Ok(FieldValue::Bytes(bytes)),
        other => Err(Error::Schema(format!("wire kind {other:?} is not byte-shaped"))),
    }
}

fn clamp_len(field: &FieldDescriptor, bytes: &[u8], ctx: &CodecContext, limit: u32) -> Result<usize> {
    if bytes.len() as u32 > limit {
        if ctx.strict {
            return Err(Error::OutOfRange {
                field: field.name().clone(),
                value: bytes.len() as f64,
                min: 0.0,
                max: limit as f64,
            });
        }
        debug!(field = field.name(), len = bytes.len(), limit, "truncating over-length field");
        Ok(limit as usize)
    } else {
        Ok(bytes.len())
    }
}

/// `dccl.default.string`/`dccl.default.bytes`: a length field wide enough
/// for `0..=max_length` (plus one reserved all-ones code when optional),
/// followed by that many bytes, byte-aligned (spec §4.7: length-prefixed
/// variant is always byte-aligned, unlike most DCCL fields).
#[derive(Debug, Clone, Copy)]
pub struct LengthPrefixedCodec;

impl LengthPrefixedCodec {
    fn length_width(field: &FieldDescriptor) -> Result<usize> {
        let max_len = max_length(field)? as u64;
        let representable = if field.is_optional() { max_len + 2 } else { max_len + 1 };
        Ok(bits_for_value_count(representable))
    }

    fn null_code(field: &FieldDescriptor) -> Result<u64> {
        let width = Self::length_width(field)?;
        Ok(if width == 0 { 0 } else { (1u64 << width) - 1 })
    }
}

impl FieldCodec for LengthPrefixedCodec {
    fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        max_length(field)?;
        Ok(())
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::ReservedCode
    }

    fn encode_empty(&self, field: &FieldDescriptor) -> Result<BitBuffer> {
        let width = Self::length_width(field)?;
        let mut buf = BitBuffer::with_capacity(width);
        buf.push_uint(Self::null_code(field)?, width);
        Ok(buf)
    }

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer> {
        let bytes = raw_bytes(field, value)?;
        let limit = max_length(field)?;
        let len = clamp_len(field, &bytes, ctx, limit)?;
        let width = Self::length_width(field)?;
        let mut buf = BitBuffer::with_capacity(width + len * 8);
        buf.push_uint(len as u64, width);
        for byte in &bytes[..len] {
            buf.push_uint(*byte as u64, 8);
        }
        Ok(buf)
    }

    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, _ctx: &CodecContext) -> Result<Option<FieldValue>> {
        let width = Self::length_width(field)?;
        let len = bits.take_uint(width)?;
        if field.is_optional() && len == Self::null_code(field)? {
            return Ok(None);
        }
        let mut out = Vec::with_capacity(len as usize);
        for _ in 0..len {
            out.push(bits.take_uint(8)? as u8);
        }
        Ok(Some(to_field_value(field, out)?))
    }

    fn size_empty(&self, field: &FieldDescriptor) -> Result<usize> {
        Self::length_width(field)
    }

    fn size(&self, field: &FieldDescriptor, value: &FieldValue) -> Result<usize> {
        let bytes = raw_bytes(field, value)?;
        let limit = max_length(field)?;
        let len = (bytes.len() as u32).min(limit) as usize;
        Ok(Self::length_width(field)? + len * 8)
    }

    fn min_size(&self, field: &FieldDescriptor) -> Result<usize> {
        Self::length_width(field)
    }

    fn max_size(&self, field: &FieldDescriptor) -> Result<usize> {
        Ok(Self::length_width(field)? + max_length(field)? as usize * 8)
    }

    fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8> {
        let mut out = b"lenpfx".to_vec();
        out.extend_from_slice(&max_length(field).unwrap_or(0).to_be_bytes());
        out
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        format!("{:?}[max_length={:?}]", field.wire_kind(), field.options().max_length)
    }
}

/// `dccl.var_bytes`: `[presence bit (optional only)][length prefix][bytes]`
/// — unlike [`LengthPrefixedCodec`] the payload is exactly as long as the
/// actual value (never padded out to `max_length`), so it only costs what
/// the data actually needs, at the price of the field no longer being a
/// fixed size (spec §4.7 variant, grounded in
/// `codecs3/field_codec_var_bytes.h`: `presence_size() + prefix_size() +
/// value.length() * 8`).
#[derive(Debug, Clone, Copy)]
pub struct VarBytesCodec;

impl VarBytesCodec {
    fn prefix_width(field: &FieldDescriptor) -> Result<usize> {
        Ok(bits_for_value_count(max_length(field)? as u64 + 1))
    }

    fn presence_width(field: &FieldDescriptor) -> usize {
        if field.is_optional() {
            1
        } else {
            0
        }
    }
}

impl FieldCodec for VarBytesCodec {
    fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        max_length(field)?;
        Ok(())
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::PresenceBit
    }

    fn encode_empty(&self, field: &FieldDescriptor) -> Result<BitBuffer> {
        let mut buf = BitBuffer::with_capacity(Self::presence_width(field));
        if field.is_optional() {
            buf.push_uint(0, 1);
        }
        Ok(buf)
    }

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer> {
        let bytes = raw_bytes(field, value)?;
        let limit = max_length(field)?;
        let len = clamp_len(field, &bytes, ctx, limit)?;
        let prefix_width = Self::prefix_width(field)?;
        let mut buf = BitBuffer::with_capacity(Self::presence_width(field) + prefix_width + len * 8);
        if field.is_optional() {
            buf.push_uint(1, 1);
        }
        buf.push_uint(len as u64, prefix_width);
        for byte in &bytes[..len] {
            buf.push_uint(*byte as u64, 8);
        }
        Ok(buf)
    }

    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, _ctx: &CodecContext) -> Result<Option<FieldValue>> {
        if field.is_optional() && bits.take_uint(1)? == 0 {
            return Ok(None);
        }
        let prefix_width = Self::prefix_width(field)?;
        let len = bits.take_uint(prefix_width)?;
        let mut out = Vec::with_capacity(len as usize);
        for _ in 0..len {
            out.push(bits.take_uint(8)? as u8);
        }
        Ok(Some(to_field_value(field, out)?))
    }

    fn size_empty(&self, field: &FieldDescriptor) -> Result<usize> {
        if field.is_optional() {
            Ok(1)
        } else {
            Self::prefix_width(field)
        }
    }

    fn size(&self, field: &FieldDescriptor, value: &FieldValue) -> Result<usize> {
        let bytes = raw_bytes(field, value)?;
        let limit = max_length(field)?;
        let len = (bytes.len() as u32).min(limit) as usize;
        Ok(Self::presence_width(field) + Self::prefix_width(field)? + len * 8)
    }

    fn min_size(&self, field: &FieldDescriptor) -> Result<usize> {
        self.size_empty(field)
    }

    fn max_size(&self, field: &FieldDescriptor) -> Result<usize> {
        Ok(Self::presence_width(field) + Self::prefix_width(field)? + max_length(field)? as usize * 8)
    }

    fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8> {
        let mut out = b"varbytes".to_vec();
        out.extend_from_slice(&max_length(field).unwrap_or(0).to_be_bytes());
        out
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        format!("var_bytes[max_length={:?}]", field.options().max_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptorBuilder, FieldOptions, Label};
    use crate::value::Message;

    fn ctx() -> CodecContext<'static> {
        use std::sync::OnceLock;
        static EMPTY: OnceLock<Message> = OnceLock::new();
        CodecContext::top_level(EMPTY.get_or_init(Message::new), true, 0)
    }

    fn string_field(label: Label, max_length: u32) -> FieldDescriptor {
        let mut f = FieldDescriptorBuilder::new(1, "name");
        f.wire_kind(WireKind::String).label(label).options(FieldOptions {
            max_length: Some(max_length),
            ..Default::default()
        });
        f.build().unwrap()
    }

    #[test]
    fn length_prefixed_round_trips_and_reports_exact_size() {
        let f = string_field(Label::Required, 16);
        let codec = LengthPrefixedCodec;
        let value = FieldValue::String("hello".to_string());
        let mut bits = codec.encode(&f, &value, &ctx()).unwrap();
        assert_eq!(bits.len(), codec.size(&f, &value).unwrap());
        let decoded = codec.decode(&f, &mut bits, &ctx()).unwrap().unwrap();
        assert_eq!(decoded.as_string(), Some("hello"));
    }

    #[test]
    fn length_prefixed_truncates_over_length_in_non_strict_mode() {
        let f = string_field(Label::Required, 3);
        let codec = LengthPrefixedCodec;
        let mut ctx = ctx();
        ctx.strict = false;
        let value = FieldValue::String("hello".to_string());
        let mut bits = codec.encode(&f, &value, &ctx).unwrap();
        let decoded = codec.decode(&f, &mut bits, &ctx).unwrap().unwrap();
        assert_eq!(decoded.as_string(), Some("hel"));
    }

    #[test]
    fn length_prefixed_rejects_over_length_in_strict_mode() {
        let f = string_field(Label::Required, 3);
        let codec = LengthPrefixedCodec;
        let mut ctx = ctx();
        ctx.strict = true;
        let value = FieldValue::String("hello".to_string());
        assert!(matches!(codec.encode(&f, &value, &ctx), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn length_prefixed_optional_round_trips_absent() {
        let f = string_field(Label::Optional, 16);
        let codec = LengthPrefixedCodec;
        let mut absent = codec.encode_empty(&f).unwrap();
        assert!(codec.decode(&f, &mut absent, &ctx()).unwrap().is_none());
    }

    #[test]
    fn var_bytes_costs_exactly_presence_plus_prefix_plus_payload() {
        let f = string_field(Label::Optional, 255);
        let codec = VarBytesCodec;
        let value = FieldValue::String("hi".to_string());
        let mut bits = codec.encode(&f, &value, &ctx()).unwrap();
        // 1 presence bit + 8-bit length prefix (max_length=255) + 2 bytes payload
        assert_eq!(bits.len(), 1 + 8 + 16);
        assert_eq!(bits.len(), codec.size(&f, &value).unwrap());
        let decoded = codec.decode(&f, &mut bits, &ctx()).unwrap().unwrap();
        assert_eq!(decoded.as_string(), Some("hi"));
    }

    #[test]
    fn var_bytes_does_not_pad_short_values_to_max_length() {
        let f = string_field(Label::Required, 255);
        let codec = VarBytesCodec;
        let value = FieldValue::String("x".to_string());
        let bits = codec.encode(&f, &value, &ctx()).unwrap();
        assert_eq!(bits.len(), 8 + 8);
        assert!(bits.len() < codec.max_size(&f).unwrap());
    }

    #[test]
    fn var_bytes_optional_round_trips_absent() {
        let f = string_field(Label::Optional, 255);
        let codec = VarBytesCodec;
        let mut absent = codec.encode_empty(&f).unwrap();
        assert!(codec.decode(&f, &mut absent, &ctx()).unwrap().is_none());
    }
}
