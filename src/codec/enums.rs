//! `dccl.default.enum` codec (spec §4.6): either a tightly packed index
//! (`packed_enum = true`, the default) or a delegation to
//! [`super::numeric::NumericCodec`] with `min = 0`, `max = enum_count - 1`,
//! `precision = 0` (`packed_enum = false`, for schemas that want enum
//! fields to participate in the same bounds-reporting path as integers).

use tracing::debug;

use crate::bitbuf::{bits_for_value_count, BitBuffer};
use crate::result::{Error, Result};
use crate::schema::{FieldDescriptor, FieldOptions};
use crate::value::FieldValue;

use super::numeric::NumericCodec;
use super::{CodecContext, FieldCodec, NullStrategy};

#[derive(Debug, Clone, Copy)]
pub struct EnumCodec;

impl EnumCodec {
    fn enum_count(field: &FieldDescriptor) -> Result<u32> {
        field
            .options()
            .enum_count
            .ok_or_else(|| Error::Schema(format!("enum field `{}` is missing enum_count", field.name())))
    }

    fn width(field: &FieldDescriptor) -> Result<usize> {
        let count = Self::enum_count(field)? as u64;
        let representable = if field.is_optional() { count + 1 } else { count };
        Ok(bits_for_value_count(representable))
    }

    fn null_code(field: &FieldDescriptor) -> Result<u64> {
        let width = Self::width(field)?;
        Ok(if width == 0 { 0 } else { (1u64 << width) - 1 })
    }

    /// A `NumericCodec`-shaped view of this field for unpacked mode:
    /// `min=0, max=enum_count-1, precision=0`, same label/optionality.
    fn as_numeric(field: &FieldDescriptor) -> Result<FieldDescriptor> {
        let count = Self::enum_count(field)?;
        let mut options = FieldOptions {
            min: Some(0.0),
            max: Some((count - 1) as f64),
            precision: 0,
            ..field.options().clone()
        };
        options.enum_count = None;
        let mut builder = crate::schema::FieldDescriptorBuilder::new(*field.index(), field.name().clone());
        builder
            .wire_kind(crate::schema::WireKind::Uint32)
            .label(*field.label())
            .options(options);
        builder.build()
    }
}

impl FieldCodec for EnumCodec {
    fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        Self::enum_count(field)?;
        Ok(())
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::ReservedCode
    }

    fn encode_empty(&self, field: &FieldDescriptor) -> Result<BitBuffer> {
        if field.options().packed_enum {
            let width = Self::width(field)?;
            let mut buf = BitBuffer::with_capacity(width);
            buf.push_uint(Self::null_code(field)?, width);
            Ok(buf)
        } else {
            NumericCodec.encode_empty(&Self::as_numeric(field)?)
        }
    }

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer> {
        let tag = value
            .as_enum()
            .ok_or_else(|| Error::Schema(format!("field `{}` expects an enum value", field.name())))?;
        let count = Self::enum_count(field)? as i32;
        if tag < 0 || tag >= count {
            if ctx.strict {
                return Err(Error::OutOfRange {
                    field: field.name().clone(),
                    value: tag as f64,
                    min: 0.0,
                    max: (count - 1) as f64,
                });
            }
            debug!(field = field.name(), tag, count, "clamping out-of-range enum tag");
        }
        let clamped = tag.clamp(0, count - 1);
        if field.options().packed_enum {
            let width = Self::width(field)?;
            let mut buf = BitBuffer::with_capacity(width);
            buf.push_uint(clamped as u64, width);
            Ok(buf)
        } else {
            NumericCodec.encode(&Self::as_numeric(field)?, &FieldValue::F64(clamped as f64), ctx)
        }
    }

    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Option<FieldValue>> {
        if field.options().packed_enum {
            let width = Self::width(field)?;
            let code = bits.take_uint(width)?;
            // A non-power-of-two enum_count leaves codes above it
            // unused by any enumerator; the reserved null code for an
            // optional field falls in that same range. Either way an
            // unknown wire value decodes to NullValue rather than a
            // bogus enum tag.
            if code >= Self::enum_count(field)? as u64 {
                return Ok(None);
            }
            Ok(Some(FieldValue::Enum(code as i32)))
        } else {
            let numeric = Self::as_numeric(field)?;
            match NumericCodec.decode(&numeric, bits, ctx)? {
                Some(v) => Ok(Some(FieldValue::Enum(v.as_f64().unwrap() as i32))),
                None => Ok(None),
            }
        }
    }

    fn size_empty(&self, field: &FieldDescriptor) -> Result<usize> {
        if field.options().packed_enum {
            Self::width(field)
        } else {
            NumericCodec.size_empty(&Self::as_numeric(field)?)
        }
    }

    fn size(&self, field: &FieldDescriptor, value: &FieldValue) -> Result<usize> {
        if field.options().packed_enum {
            Self::width(field)
        } else {
            NumericCodec.size(&Self::as_numeric(field)?, value)
        }
    }

    fn min_size(&self, field: &FieldDescriptor) -> Result<usize> {
        if field.options().packed_enum {
            Self::width(field)
        } else {
            NumericCodec.min_size(&Self::as_numeric(field)?)
        }
    }

    fn max_size(&self, field: &FieldDescriptor) -> Result<usize> {
        if field.options().packed_enum {
            Self::width(field)
        } else {
            NumericCodec.max_size(&Self::as_numeric(field)?)
        }
    }

    fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8> {
        let mut out = b"enum".to_vec();
        out.extend_from_slice(&field.options().enum_count.unwrap_or(0).to_be_bytes());
        out.push(field.options().packed_enum as u8);
        out
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        format!(
            "enum[count={:?}, packed={}]",
            field.options().enum_count,
            field.options().packed_enum
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptorBuilder, FieldOptions, Label, WireKind};
    use crate::value::Message;

    fn ctx() -> CodecContext<'static> {
        use std::sync::OnceLock;
        static EMPTY: OnceLock<Message> = OnceLock::new();
        CodecContext::top_level(EMPTY.get_or_init(Message::new), true, 0)
    }

    fn field(label: Label, packed: bool) -> FieldDescriptor {
        let mut f = FieldDescriptorBuilder::new(1, "color");
        f.wire_kind(WireKind::Enum).label(label).options(FieldOptions {
            enum_count: Some(4),
            packed_enum: packed,
            ..Default::default()
        });
        f.build().unwrap()
    }

    #[test]
    fn packed_mode_round_trips() {
        let f = field(Label::Required, true);
        let codec = EnumCodec;
        let mut bits = codec.encode(&f, &FieldValue::Enum(2), &ctx()).unwrap();
        assert_eq!(bits.len(), 2);
        let decoded = codec.decode(&f, &mut bits, &ctx()).unwrap().unwrap();
        assert_eq!(decoded.as_enum(), Some(2));
    }

    #[test]
    fn packed_optional_round_trips_absent() {
        let f = field(Label::Optional, true);
        let codec = EnumCodec;
        let mut absent = codec.encode_empty(&f).unwrap();
        assert!(codec.decode(&f, &mut absent, &ctx()).unwrap().is_none());
    }

    fn field_with_count(label: Label, enum_count: u32) -> FieldDescriptor {
        let mut f = FieldDescriptorBuilder::new(1, "color");
        f.wire_kind(WireKind::Enum).label(label).options(FieldOptions {
            enum_count: Some(enum_count),
            packed_enum: true,
            ..Default::default()
        });
        f.build().unwrap()
    }

    #[test]
    fn packed_unknown_code_above_a_non_power_of_two_count_decodes_to_none_when_optional() {
        // enum_count = 3 fits in 2 bits, leaving code 3 unused by any
        // enumerator and also serving as the reserved null code.
        let f = field_with_count(Label::Optional, 3);
        let codec = EnumCodec;
        let mut bits = BitBuffer::new();
        bits.push_uint(3, 2);
        assert!(codec.decode(&f, &mut bits, &ctx()).unwrap().is_none());
    }

    #[test]
    fn packed_unknown_code_above_a_non_power_of_two_count_decodes_to_none_when_required() {
        // required fields get no reserved null code of their own, but an
        // out-of-range wire value still isn't a valid enumerator.
        let f = field_with_count(Label::Required, 3);
        let codec = EnumCodec;
        let mut bits = BitBuffer::new();
        bits.push_uint(3, 2);
        assert!(codec.decode(&f, &mut bits, &ctx()).unwrap().is_none());
    }

    #[test]
    fn unpacked_mode_delegates_to_numeric() {
        let f = field(Label::Required, false);
        let codec = EnumCodec;
        let mut bits = codec.encode(&f, &FieldValue::Enum(3), &ctx()).unwrap();
        let decoded = codec.decode(&f, &mut bits, &ctx()).unwrap().unwrap();
        assert_eq!(decoded.as_enum(), Some(3));
        assert_eq!(codec.size(&f, &FieldValue::Enum(3)).unwrap(), codec.max_size(&f).unwrap());
    }
}
