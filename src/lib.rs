//! `dccl`: a schema-driven, bit-packed binary codec engine for
//! extreme-low-bandwidth links.
//!
//! A schema is described with [`schema::MessageDescriptorBuilder`] and
//! [`schema::FieldDescriptorBuilder`], loaded into an [`engine::Engine`],
//! and then used to [`engine::Engine::encode`]/[`engine::Engine::decode`]
//! [`value::Message`] values to and from their packed wire form. See
//! [`engine::Engine`] for the façade most callers want; `codec` and its
//! submodules hold the per-wire-kind implementations the engine dispatches
//! to, and `bitbuf` the MSB-first bit buffer everything else is built on.

pub mod bitbuf;
pub mod codec;
pub mod crypto;
pub mod engine;
pub mod result;
pub mod schema;
pub mod value;

#[cfg(feature = "dylib-plugins")]
pub mod plugin;

pub use bitbuf::BitBuffer;
pub use engine::Engine;
pub use result::{Error, Result};
pub use schema::{
    CodecVersion, FieldDescriptor, FieldDescriptorBuilder, FieldIndex, FieldOptions, Label, MessageDescriptor,
    MessageDescriptorBuilder, MessageOptions, WireKind,
};
pub use value::{FieldValue, Message};
