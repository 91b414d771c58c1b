//! Message/field descriptors: the crate's own minimal schema IR (spec §3,
//! "Schema IR" design note, option (b)). An embedder that already has a
//! protobuf-style descriptor pool is expected to build these from it; the
//! engine never reaches back into that pool itself.

use std::collections::BTreeMap;

use derive_getters::Getters;

use crate::result::{Error, Result};

/// The wire kind a field carries, independent of how many bits it ends up
/// using once bounds are applied (spec §3, "Field descriptor").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Double,
    Float,
    Bool,
    String,
    Bytes,
    Enum,
    Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Required,
    Optional,
    Repeated,
}

/// Schema version family selecting a frozen default-codec table (spec §4,
/// "Codec-version families" design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecVersion {
    V2,
    V3,
    V4,
}

pub type FieldIndex = u32;

/// Per-field options (spec §6, "Schema options").
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub codec: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub precision: i32,
    pub max_length: Option<u32>,
    pub max_repeat: Option<u32>,
    pub in_head: bool,
    pub packed_enum: bool,
    pub static_value: Option<String>,
    pub omit: bool,
    pub codec_group: Option<String>,
    /// Declared enumerator count, required for `WireKind::Enum` fields.
    pub enum_count: Option<u32>,
}

#[derive(Debug, Clone, Getters)]
pub struct FieldDescriptor {
    index: FieldIndex,
    name: String,
    wire_kind: WireKind,
    label: Label,
    options: FieldOptions,
    /// Present only for `WireKind::Message` fields.
    message: Option<MessageDescriptor>,
}

impl FieldDescriptor {
    pub fn is_required(&self) -> bool {
        self.label == Label::Required
    }

    pub fn is_optional(&self) -> bool {
        self.label == Label::Optional
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn dotted_path(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{prefix}.{}", self.name)
        }
    }

    /// A copy of this field with its label forced to `label`, everything
    /// else unchanged. Used to drive a singular field codec over a
    /// differently-shaped view of the same field — e.g. a `Repeated`
    /// field's individual slots are encoded as if `Optional` (spec §4.3's
    /// repeated protocol reserves each slot's null/presence representation
    /// exactly like a true optional field would), or a `dccl.presence`
    /// field's inner codec is driven as `Required` (§4.8) so it doesn't
    /// also reserve its own null code on top of the presence bit.
    pub fn with_label(&self, label: Label) -> Result<FieldDescriptor> {
        let mut builder = FieldDescriptorBuilder::new(self.index, self.name.clone());
        builder.wire_kind(self.wire_kind).label(label).options(self.options.clone());
        if let Some(nested) = &self.message {
            builder.nested_message(nested.clone());
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageOptions {
    pub id: Option<u32>,
    pub max_bytes: u32,
    pub codec_version: Option<CodecVersion>,
    pub codec: Option<String>,
    pub codec_group: Option<String>,
    pub unit_system: Option<String>,
}

#[derive(Debug, Clone, Getters)]
pub struct MessageDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
    options: MessageOptions,
}

impl MessageDescriptor {
    pub fn field(&self, index: FieldIndex) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.index == index)
    }

    pub fn head_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.options.in_head)
    }

    pub fn body_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.options.in_head)
    }

    pub fn codec_version(&self) -> Result<CodecVersion> {
        self.options
            .codec_version
            .ok_or_else(|| Error::Schema(format!("message `{}` is missing codec_version", self.name)))
    }
}

/// Builds a [`FieldDescriptor`] in the teacher's fluent-setter idiom
/// (`&mut self -> &mut Self`, terminal `build()`).
#[derive(Debug, Default)]
pub struct FieldDescriptorBuilder {
    index: FieldIndex,
    name: String,
    wire_kind: Option<WireKind>,
    label: Label2,
    options: FieldOptions,
    message: Option<MessageDescriptor>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Label2(Option<Label>);

impl FieldDescriptorBuilder {
    pub fn new(index: FieldIndex, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn wire_kind(&mut self, kind: WireKind) -> &mut Self {
        self.wire_kind = Some(kind);
        self
    }

    pub fn label(&mut self, label: Label) -> &mut Self {
        self.label.0 = Some(label);
        self
    }

    pub fn options(&mut self, options: FieldOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn nested_message(&mut self, message: MessageDescriptor) -> &mut Self {
        self.message = Some(message);
        self
    }

    pub fn build(self) -> Result<FieldDescriptor> {
        let wire_kind = self
            .wire_kind
            .ok_or_else(|| Error::Schema(format!("field `{}` is missing a wire kind", self.name)))?;
        let label = self
            .label
            .0
            .ok_or_else(|| Error::Schema(format!("field `{}` is missing a label", self.name)))?;
        if label == Label::Repeated && self.options.max_repeat.is_none() {
            return Err(Error::Schema(format!(
                "repeated field `{}` is missing max_repeat",
                self.name
            )));
        }
        if let (Some(min), Some(max)) = (self.options.min, self.options.max) {
            if min > max {
                return Err(Error::Schema(format!(
                    "field `{}` has min ({min}) greater than max ({max})",
                    self.name
                )));
            }
        }
        if wire_kind == WireKind::Message && self.message.is_none() {
            return Err(Error::Schema(format!(
                "message-typed field `{}` has no nested descriptor",
                self.name
            )));
        }
        Ok(FieldDescriptor {
            index: self.index,
            name: self.name,
            wire_kind,
            label,
            options: self.options,
            message: self.message,
        })
    }
}

#[derive(Debug, Default)]
pub struct MessageDescriptorBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    options: MessageOptions,
}

impl MessageDescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_field(&mut self, field: FieldDescriptor) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn options(&mut self, options: MessageOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<MessageDescriptor> {
        if self.options.max_bytes == 0 {
            return Err(Error::Schema(format!("message `{}` is missing max_bytes", self.name)));
        }
        let mut seen = BTreeMap::new();
        for field in &self.fields {
            if seen.insert(field.index, ()).is_some() {
                return Err(Error::Schema(format!(
                    "message `{}` declares field index {} more than once",
                    self.name, field.index
                )));
            }
        }
        Ok(MessageDescriptor {
            name: self.name,
            fields: self.fields,
            options: self.options,
        })
    }
}
