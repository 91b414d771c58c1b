//! Type helper (spec §4.2): the one place reflection crosses into the
//! codec layer. Every codec elsewhere is generic over [`FieldValue`]; only
//! [`Message::get`]/[`Message::set`]/[`Message::append`] know how a
//! concrete field index maps to a concrete value.

use std::collections::BTreeMap;

use crate::schema::FieldIndex;

/// One decoded (or about-to-be-encoded) field value. This is DCCL's
/// analogue of a protobuf `Value` — generic enough to hold anything a
/// built-in codec produces, without the engine depending on an external
/// reflection library.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    /// Enum wire value: the declared enumerator's integer tag.
    Enum(i32),
    Message(Message),
    Repeated(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::I64(v) => Some(*v as f64),
            FieldValue::U64(v) => Some(*v as f64),
            FieldValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        match self {
            FieldValue::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            FieldValue::Message(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_repeated(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Repeated(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

/// A message instance: the thing callers construct before `encode()` and
/// receive back from `decode()`. Caller-owned for the duration of one
/// call; the engine never retains it (spec §3, "Lifecycles").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    fields: BTreeMap<FieldIndex, FieldValue>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: FieldIndex) -> Option<&FieldValue> {
        self.fields.get(&index)
    }

    pub fn set(&mut self, index: FieldIndex, value: FieldValue) {
        self.fields.insert(index, value);
    }

    pub fn unset(&mut self, index: FieldIndex) {
        self.fields.remove(&index);
    }

    pub fn is_set(&self, index: FieldIndex) -> bool {
        self.fields.contains_key(&index)
    }

    pub fn append(&mut self, index: FieldIndex, value: FieldValue) {
        match self.fields.get_mut(&index) {
            Some(FieldValue::Repeated(items)) => items.push(value),
            _ => {
                self.fields.insert(index, FieldValue::Repeated(vec![value]));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldIndex, &FieldValue)> {
        self.fields.iter()
    }
}
