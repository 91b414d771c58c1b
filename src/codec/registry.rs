//! Codec registry (spec §4, "Codec-version families" design note): maps a
//! field's `codec` option (or, if unset, its message's `codec_version`
//! default) plus its wire kind to a [`FieldCodec`] instance.
//!
//! v2/v3/v4 are frozen, independent tables — on purpose. A new version
//! family is added by appending a table, never by mutating an existing
//! one, so a schema compiled against `codec_version = 2` keeps decoding
//! the same way forever even as v4 defaults evolve.

use std::collections::BTreeMap;

use crate::result::{Error, Result};
use crate::schema::{CodecVersion, FieldDescriptor, WireKind};

use super::boolean::BoolCodec;
use super::bytes::{LengthPrefixedCodec, VarBytesCodec};
use super::enums::EnumCodec;
use super::hash::HashCodec;
use super::message::MessageFieldCodec;
use super::numeric::NumericCodec;
use super::presence::PresenceCodec;
use super::static_codec::StaticCodec;
use super::time::TimeCodec;
use super::FieldCodec;

/// Name of the codec every version family falls back to for a wire kind
/// when the field doesn't name one explicitly (spec §4, "default codec").
/// `WireKind::Message` never reaches this function — `resolve` builds a
/// [`MessageFieldCodec`] for it directly, since a message has no fixed
/// width to name a table entry by.
fn default_codec_name(version: CodecVersion, wire_kind: WireKind) -> &'static str {
    match (version, wire_kind) {
        // v4 switches the string/bytes default to the presence-bit,
        // non-padded var_bytes codec (`codecs4/field_codec_default.h`:
        // `using DefaultBytesCodec = v3::VarBytesCodec;` /
        // `using DefaultStringCodec = v3::VarBytesCodec;`); v2/v3 keep the
        // fixed-width, length-prefixed codec.
        (CodecVersion::V4, WireKind::String | WireKind::Bytes) => "dccl.var_bytes",
        (_, WireKind::String) => "dccl.default.string",
        (_, WireKind::Bytes) => "dccl.default.bytes",
        (_, WireKind::Bool) => "dccl.default.bool",
        (_, WireKind::Enum) => "dccl.default.enum",
        (_, WireKind::Message) => unreachable!("message fields are dispatched to MessageFieldCodec before this is called"),
        (CodecVersion::V2, _) => "dccl.default2",
        (CodecVersion::V3, _) => "dccl.default3",
        (CodecVersion::V4, _) => "dccl.default3",
    }
}

/// Builds the base (non-presence-wrapped) codec for one field, honoring
/// an explicit `codec` option if set.
fn build_base(field: &FieldDescriptor, version: CodecVersion) -> Result<Box<dyn FieldCodec>> {
    let name = field
        .options()
        .codec
        .clone()
        .unwrap_or_else(|| default_codec_name(version, *field.wire_kind()).to_string());
    build_base_named(&name, field)
}

fn build_base_named(name: &str, field: &FieldDescriptor) -> Result<Box<dyn FieldCodec>> {
    match name {
        "dccl.default2" | "dccl.default3" => Ok(Box::new(NumericCodec)),
        "dccl.default.bool" => Ok(Box::new(BoolCodec)),
        "dccl.default.enum" => Ok(Box::new(EnumCodec)),
        "dccl.default.string" | "dccl.default.bytes" => Ok(Box::new(LengthPrefixedCodec)),
        "dccl.var_bytes" => Ok(Box::new(VarBytesCodec)),
        "dccl.default.static" => Ok(Box::new(StaticCodec)),
        "dccl.time2" => Ok(Box::new(TimeCodec)),
        "dccl.hash" => Ok(Box::new(HashCodec)),
        other => Err(Error::Schema(format!("unknown codec `{other}` for field `{}`", field.name()))),
    }
}

/// Resolves the full codec for one field, including the `dccl.presence`
/// decorator when the field names it explicitly via its `codec` option.
/// `dccl.presence` isn't itself a base codec — it says "wrap whatever
/// this field's wire kind would otherwise get in a leading presence
/// bit" (spec's registry table lists it as a decorator, not an entry
/// keyed to a single wire kind).
pub fn resolve(field: &FieldDescriptor, version: CodecVersion) -> Result<Box<dyn FieldCodec>> {
    if *field.wire_kind() == WireKind::Message {
        // A message has no fixed width to reserve a null code from, so it
        // always carries its own built-in presence bit (see
        // `MessageFieldCodec`'s docs) rather than going through the
        // `dccl.presence` decorator path below.
        let codec = MessageFieldCodec::new(field)?;
        codec.validate(field)?;
        return Ok(Box::new(codec));
    }
    if field.options().codec.as_deref() == Some("dccl.presence") {
        if !field.is_optional() && !field.is_repeated() {
            return Err(Error::Schema(format!(
                "field `{}` names dccl.presence but isn't optional or repeated",
                field.name()
            )));
        }
        let inner_name = default_codec_name(version, *field.wire_kind());
        let base = build_base_named(inner_name, field)?;
        let decorated = PresenceCodec::new(base, field)?;
        decorated.validate(field)?;
        return Ok(Box::new(decorated));
    }
    let base = build_base(field, version)?;
    base.validate(field)?;
    Ok(base)
}

/// Per-message-version-family codec cache, keyed by field index, built
/// once at `Engine::load` time (spec §4.3, "validation must occur at load
/// time") and reused for every subsequent encode/decode.
#[derive(Default)]
pub struct FieldCodecTable {
    codecs: BTreeMap<u32, std::sync::Arc<dyn FieldCodec>>,
}

impl FieldCodecTable {
    pub fn build(fields: &[FieldDescriptor], version: CodecVersion) -> Result<Self> {
        let mut codecs = BTreeMap::new();
        for field in fields {
            let codec: std::sync::Arc<dyn FieldCodec> = resolve(field, version)?.into();
            codecs.insert(*field.index(), codec);
        }
        Ok(Self { codecs })
    }

    pub fn get(&self, index: u32) -> Option<&std::sync::Arc<dyn FieldCodec>> {
        self.codecs.get(&index)
    }
}
