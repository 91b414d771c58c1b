//! Message codec (spec §4.9): head phase (fields with `in_head = true`,
//! in declared order) byte-padded, then body phase (remaining fields, in
//! declared order). Nested messages are appended with no delimiter —
//! their own `max_bytes` budget statically bounds their size, so nothing
//! else is needed to find where one ends.

use std::sync::Arc;

use crate::bitbuf::BitBuffer;
use crate::result::{Error, Result};
use crate::schema::{FieldDescriptor, Label, MessageDescriptor};
use crate::value::{FieldValue, Message};

use super::registry::FieldCodecTable;
use super::repeated::RepeatedCodec;
use super::{CodecContext, FieldCodec, NullStrategy};

/// Structural hash of a descriptor (spec §4.12): folds in every field's
/// own `hash_contribution`, deterministically, so two engines that loaded
/// the identical schema always compute the identical value, and any
/// change to a field's shape changes it.
pub fn structural_hash(desc: &MessageDescriptor, table: &FieldCodecTable) -> u64 {
    let mut state: u64 = 0xcbf2_9ce4_8422_2325;
    let mix = |state: &mut u64, bytes: &[u8]| {
        for &b in bytes {
            *state ^= b as u64;
            *state = state.wrapping_mul(0x0000_0100_0000_01B3);
        }
    };
    mix(&mut state, desc.name().as_bytes());
    for field in desc.fields() {
        mix(&mut state, field.name().as_bytes());
        mix(&mut state, &[field.is_required() as u8, field.is_optional() as u8, field.is_repeated() as u8]);
        if let Some(codec) = table.get(*field.index()) {
            mix(&mut state, &codec.hash_contribution(field));
        }
    }
    state
}

fn dotted(prefix: &str, field: &FieldDescriptor) -> String {
    field.dotted_path(prefix)
}

/// Orchestrates one message descriptor's encode/decode/size against an
/// already-built [`FieldCodecTable`].
pub struct MessageCodec {
    descriptor: MessageDescriptor,
    table: FieldCodecTable,
    hash: u64,
}

impl MessageCodec {
    pub fn build(descriptor: &MessageDescriptor) -> Result<Self> {
        let version = descriptor.codec_version()?;
        let table = FieldCodecTable::build(descriptor.fields(), version)?;
        let hash = structural_hash(descriptor, &table);
        Ok(Self {
            descriptor: descriptor.clone(),
            table,
            hash,
        })
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    fn check_required(&self, message: &Message, prefix: &str) -> Result<()> {
        let mut missing = Vec::new();
        for field in self.descriptor.fields() {
            if field.is_required() && !message.is_set(*field.index()) {
                missing.push(dotted(prefix, field));
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Uninitialized { paths: missing })
        }
    }

    fn encode_field(&self, field: &FieldDescriptor, message: &Message, ctx: &CodecContext) -> Result<BitBuffer> {
        if field.options().omit {
            return Ok(BitBuffer::new());
        }
        let value = message.get(*field.index());

        if field.is_repeated() {
            let codec = self.singular_codec(field)?;
            let repeated = RepeatedCodec::new(box_clone(codec));
            let values = value.and_then(FieldValue::as_repeated).unwrap_or(&[]);
            return repeated.encode_repeated(field, values, ctx);
        }

        let codec = self.singular_codec(field)?;
        match value {
            Some(v) => codec.encode(field, v, ctx),
            None if field.is_optional() => codec.encode_empty(field),
            None => Err(Error::Uninitialized {
                paths: vec![field.name().clone()],
            }),
        }
    }

    fn decode_field(&self, field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Option<FieldValue>> {
        if field.options().omit {
            return Ok(None);
        }

        if field.is_repeated() {
            let codec = self.singular_codec(field)?;
            let repeated = RepeatedCodec::new(box_clone(codec));
            let values = repeated.decode_repeated(field, bits, ctx)?;
            return Ok(Some(FieldValue::Repeated(values)));
        }

        let codec = self.singular_codec(field)?;
        codec.decode(field, bits, ctx)
    }

    fn singular_codec(&self, field: &FieldDescriptor) -> Result<&Arc<dyn FieldCodec>> {
        self.table
            .get(*field.index())
            .ok_or_else(|| Error::Schema(format!("no codec resolved for field `{}`", field.name())))
    }

    /// Encodes head and body separately, without the leading identifier
    /// byte(s) — [`crate::engine::Engine`] prepends those once per
    /// top-level call and needs the head on its own as the crypto nonce
    /// (spec §4.15). The head is already padded to a byte boundary; the
    /// body is left exactly as many bits as its fields produced.
    pub fn encode_split(&self, message: &Message, ctx: &CodecContext) -> Result<(BitBuffer, BitBuffer)> {
        self.check_required(message, "")?;
        let mut head = BitBuffer::new();
        for field in self.descriptor.head_fields() {
            head.append(&self.encode_field(field, message, ctx)?);
        }
        head.pad_to_byte();
        let mut body = BitBuffer::new();
        for field in self.descriptor.body_fields() {
            body.append(&self.encode_field(field, message, ctx)?);
        }
        let max_bits = self.descriptor.options().max_bytes as usize * 8;
        if head.len() + body.len() > max_bits {
            return Err(Error::Capacity {
                id: self.descriptor.options().id.unwrap_or(0),
                needed_bits: head.len() + body.len(),
                max_bytes: self.descriptor.options().max_bytes,
            });
        }
        Ok((head, body))
    }

    /// Encodes head then body into one contiguous buffer — used for nested
    /// message fields (spec §4.9: "the inner codec's encoded bitstring is
    /// appended to the outer's bit position"), where there's no separate
    /// byte-level head/body split to preserve.
    pub fn encode_body_only(&self, message: &Message, ctx: &CodecContext) -> Result<BitBuffer> {
        let (mut head, body) = self.encode_split(message, ctx)?;
        head.append(&body);
        Ok(head)
    }

    pub fn decode_body_only(&self, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Message> {
        let mut message = Message::new();
        let mut head_consumed = 0usize;
        for field in self.descriptor.head_fields() {
            let before = bits.len();
            if let Some(v) = self.decode_field(field, bits, ctx)? {
                message.set(*field.index(), v);
            }
            head_consumed += before.saturating_sub(bits.len());
        }
        let padding = (8 - head_consumed % 8) % 8;
        if padding > 0 {
            bits.take_front(padding)?;
        }
        for field in self.descriptor.body_fields() {
            if let Some(v) = self.decode_field(field, bits, ctx)? {
                message.set(*field.index(), v);
            }
        }
        self.check_required(&message, "")?;
        Ok(message)
    }

    /// Worst-case body size in bytes: head fields' max bits padded to a
    /// byte boundary, plus body fields' max bits, rounded up.
    pub fn max_body_bytes(&self) -> Result<u32> {
        let head_bits: usize = self.descriptor.head_fields().map(|f| self.field_max_bits(f)).sum::<Result<usize>>()?;
        let head_bytes = (head_bits + 7) / 8;
        let body_bits: usize = self.descriptor.body_fields().map(|f| self.field_max_bits(f)).sum::<Result<usize>>()?;
        Ok((head_bytes + (body_bits + 7) / 8) as u32)
    }

    /// Best-case body size in bytes (every optional/repeated field
    /// absent/empty).
    pub fn min_body_bytes(&self) -> Result<u32> {
        let head_bits: usize = self
            .descriptor
            .head_fields()
            .map(|f| self.field_min_bits(f))
            .sum::<Result<usize>>()?;
        let head_bytes = (head_bits + 7) / 8;
        let body_bits: usize = self
            .descriptor
            .body_fields()
            .map(|f| self.field_min_bits(f))
            .sum::<Result<usize>>()?;
        Ok((head_bytes + (body_bits + 7) / 8) as u32)
    }

    /// Worst-/best-case bit width for one field, dispatched uniformly
    /// through its resolved [`FieldCodec`] — message-typed fields go
    /// through exactly the same path as every other wire kind, via
    /// [`MessageFieldCodec`], so there's no separate bit-counting formula
    /// to keep in sync with [`RepeatedCodec`]'s layout.
    fn field_min_bits(&self, field: &FieldDescriptor) -> Result<usize> {
        let codec = self.singular_codec(field)?;
        match field.label() {
            Label::Repeated => {
                let repeated = RepeatedCodec::new(box_clone(codec));
                repeated.min_size_repeated(field)
            }
            _ => codec.min_size(field),
        }
    }

    pub fn field_max_bits(&self, field: &FieldDescriptor) -> Result<usize> {
        let codec = self.singular_codec(field)?;
        match field.label() {
            Label::Repeated => {
                let repeated = RepeatedCodec::new(box_clone(codec));
                repeated.max_size_repeated(field)
            }
            _ => codec.max_size(field),
        }
    }
}

/// Adapts a nested [`MessageDescriptor`] into a singular [`FieldCodec`], so
/// message-typed fields — required, optional, or repeated — are dispatched
/// through exactly the same [`RepeatedCodec`]/presence machinery as every
/// other wire kind, rather than a hand-rolled count-prefixed scheme.
///
/// There's no reserved bit pattern to steal a "null" sentinel from (a
/// message has no fixed width), so absence is always represented with a
/// leading presence bit (spec §4.9, §4.8's "any codec with no reserved code
/// of its own") — paid only when the field (or, inside a repeated field,
/// the element view `RepeatedCodec` drives it through) is actually
/// `Optional`; a `Required` message field costs nothing beyond its nested
/// encoding, matching `DCCLMessage::Serialize`'s embedded-submessage
/// handling in `examples/original_source/src/dccl.cpp`.
pub(crate) struct MessageFieldCodec {
    nested: MessageCodec,
}

impl MessageFieldCodec {
    pub fn new(field: &FieldDescriptor) -> Result<Self> {
        let nested_desc = field
            .message()
            .as_ref()
            .ok_or_else(|| Error::Schema(format!("message-typed field `{}` has no nested descriptor", field.name())))?;
        Ok(Self {
            nested: MessageCodec::build(nested_desc)?,
        })
    }

    fn as_message<'a>(field: &FieldDescriptor, value: &'a FieldValue) -> Result<&'a Message> {
        value
            .as_message()
            .ok_or_else(|| Error::Schema(format!("field `{}` expects a message value", field.name())))
    }
}

impl FieldCodec for MessageFieldCodec {
    fn validate(&self, _field: &FieldDescriptor) -> Result<()> {
        Ok(())
    }

    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::PresenceBit
    }

    fn encode_empty(&self, _field: &FieldDescriptor) -> Result<BitBuffer> {
        let mut buf = BitBuffer::with_capacity(1);
        buf.push_uint(0, 1);
        Ok(buf)
    }

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer> {
        let m = Self::as_message(field, value)?;
        let child_ctx = ctx.nested(m, self.nested.hash());
        let body = self.nested.encode_body_only(m, &child_ctx)?;
        if field.is_required() {
            return Ok(body);
        }
        let mut buf = BitBuffer::with_capacity(1 + body.len());
        buf.push_uint(1, 1);
        buf.append(&body);
        Ok(buf)
    }

    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Option<FieldValue>> {
        if !field.is_required() && bits.take_uint(1)? == 0 {
            return Ok(None);
        }
        let empty = Message::new();
        let child_ctx = ctx.nested(&empty, self.nested.hash());
        Ok(Some(FieldValue::Message(self.nested.decode_body_only(bits, &child_ctx)?)))
    }

    fn size_empty(&self, _field: &FieldDescriptor) -> Result<usize> {
        Ok(1)
    }

    fn size(&self, field: &FieldDescriptor, value: &FieldValue) -> Result<usize> {
        let m = Self::as_message(field, value)?;
        let ctx = CodecContext::top_level(m, false, self.nested.hash());
        let body_len = self.nested.encode_body_only(m, &ctx)?.len();
        Ok(if field.is_required() { body_len } else { 1 + body_len })
    }

    fn min_size(&self, field: &FieldDescriptor) -> Result<usize> {
        if field.is_required() {
            Ok(self.nested.min_body_bytes()? as usize * 8)
        } else {
            Ok(1)
        }
    }

    fn max_size(&self, field: &FieldDescriptor) -> Result<usize> {
        let per = self.nested.max_body_bytes()? as usize * 8;
        Ok(if field.is_required() { per } else { 1 + per })
    }

    fn hash_contribution(&self, _field: &FieldDescriptor) -> Vec<u8> {
        let mut out = b"message".to_vec();
        out.extend_from_slice(&self.nested.hash().to_be_bytes());
        out
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        format!("message<{}>", field.message().as_ref().map(|m| m.name().as_str()).unwrap_or("?"))
    }
}

/// `FieldCodec` trait objects aren't `Clone`; `RepeatedCodec` needs an
/// owned `Box`, so this re-resolves through a cheap `Arc` clone instead of
/// requiring `Clone` on every codec impl.
fn box_clone(codec: &Arc<dyn FieldCodec>) -> Box<dyn FieldCodec> {
    ArcCodec::boxed(codec.clone())
}

struct ArcCodec(Arc<dyn FieldCodec>);

impl ArcCodec {
    fn boxed(inner: Arc<dyn FieldCodec>) -> Box<dyn FieldCodec> {
        Box::new(ArcCodec(inner))
    }
}

impl FieldCodec for ArcCodec {
    fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        self.0.validate(field)
    }

    fn null_strategy(&self) -> super::NullStrategy {
        self.0.null_strategy()
    }

    fn encode_empty(&self, field: &FieldDescriptor) -> Result<BitBuffer> {
        self.0.encode_empty(field)
    }

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer> {
        self.0.encode(field, value, ctx)
    }

    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Option<FieldValue>> {
        self.0.decode(field, bits, ctx)
    }

    fn size_empty(&self, field: &FieldDescriptor) -> Result<usize> {
        self.0.size_empty(field)
    }

    fn size(&self, field: &FieldDescriptor, value: &FieldValue) -> Result<usize> {
        self.0.size(field, value)
    }

    fn min_size(&self, field: &FieldDescriptor) -> Result<usize> {
        self.0.min_size(field)
    }

    fn max_size(&self, field: &FieldDescriptor) -> Result<usize> {
        self.0.max_size(field)
    }

    fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8> {
        self.0.hash_contribution(field)
    }

    fn info(&self, field: &FieldDescriptor) -> String {
        self.0.info(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        FieldDescriptorBuilder, FieldOptions, MessageDescriptorBuilder, MessageOptions, WireKind,
    };

    fn point_descriptor() -> MessageDescriptor {
        let mut x = FieldDescriptorBuilder::new(1, "x");
        x.wire_kind(WireKind::Int32).label(Label::Required).options(FieldOptions {
            min: Some(0.0),
            max: Some(100.0),
            precision: 0,
            ..Default::default()
        });
        let mut builder = MessageDescriptorBuilder::new("Point");
        builder.add_field(x.build().unwrap()).options(MessageOptions {
            max_bytes: 2,
            codec_version: Some(crate::schema::CodecVersion::V3),
            ..Default::default()
        });
        builder.build().unwrap()
    }

    fn point(x: i64) -> Message {
        let mut m = Message::new();
        m.set(1, FieldValue::I64(x));
        m
    }

    fn field_with(label: Label, nested: MessageDescriptor) -> FieldDescriptor {
        let mut f = FieldDescriptorBuilder::new(1, "location");
        f.wire_kind(WireKind::Message).label(label).nested_message(nested);
        f.build().unwrap()
    }

    fn ctx() -> CodecContext<'static> {
        use std::sync::OnceLock;
        static EMPTY: OnceLock<Message> = OnceLock::new();
        CodecContext::top_level(EMPTY.get_or_init(Message::new), true, 0)
    }

    #[test]
    fn required_nested_message_costs_only_its_body() {
        let f = field_with(Label::Required, point_descriptor());
        let codec = MessageFieldCodec::new(&f).unwrap();
        let value = FieldValue::Message(point(7));
        let bits = codec.encode(&f, &value, &ctx()).unwrap();
        assert_eq!(bits.len(), codec.size(&f, &value).unwrap());
    }

    #[test]
    fn optional_nested_message_round_trips_present_and_absent() {
        let f = field_with(Label::Optional, point_descriptor());
        let codec = MessageFieldCodec::new(&f).unwrap();

        let value = FieldValue::Message(point(9));
        let mut present = codec.encode(&f, &value, &ctx()).unwrap();
        assert_eq!(present.len(), codec.size(&f, &value).unwrap());
        let decoded = codec.decode(&f, &mut present, &ctx()).unwrap().unwrap();
        assert_eq!(decoded.as_message().unwrap().get(1).and_then(FieldValue::as_f64), Some(9.0));

        let mut absent = codec.encode_empty(&f).unwrap();
        assert_eq!(absent.len(), 1);
        assert!(codec.decode(&f, &mut absent, &ctx()).unwrap().is_none());
    }

    #[test]
    fn building_a_message_field_with_no_nested_descriptor_is_a_schema_error() {
        let mut f = FieldDescriptorBuilder::new(1, "location");
        f.wire_kind(WireKind::Message).label(Label::Required);
        assert!(matches!(f.build(), Err(Error::Schema(_))));
    }
}
