//! Field-codec base & traits (spec §4.3) and the built-in codec library
//! (spec §4.4–§4.13).
//!
//! `FieldCodec` is the contract every singular (required or
//! reserved-code-optional) field codec satisfies. Repeated fields are
//! handled by [`repeated::RepeatedCodec`], a decorator rather than a
//! `FieldCodec` impl, since the spec gives them a distinct method set
//! (`encode_repeated`/`decode_repeated`/...) instead of folding them into
//! the singular contract.

pub mod boolean;
pub mod bytes;
pub mod enums;
pub mod hash;
pub mod identifier;
pub mod message;
pub mod numeric;
pub mod presence;
pub mod registry;
pub mod repeated;
pub mod static_codec;
pub mod time;

use crate::bitbuf::BitBuffer;
use crate::result::Result;
use crate::schema::FieldDescriptor;
use crate::value::{FieldValue, Message};

/// Ambient context threaded through every codec call (spec §9, "Ambient
/// 'current message' during codec dispatch"): an explicit parameter
/// instead of global/thread-local state, so a `Codec` instance stays
/// `Send` and the thread-safety hazard the spec calls out never exists in
/// the first place.
pub struct CodecContext<'a> {
    /// The top-level message being encoded or decoded.
    pub root: &'a Message,
    /// Enclosing submessages, outermost first, innermost last. Empty at
    /// the top level.
    pub stack: Vec<&'a Message>,
    /// Encode behavior on out-of-range numeric/string input: reject
    /// (`OutOfRange`) vs. clamp/truncate with a debug log.
    pub strict: bool,
    /// Structural hash of the message currently being processed, used by
    /// [`hash::HashCodec`] (spec §4.12).
    pub message_hash: u64,
}

impl<'a> CodecContext<'a> {
    pub fn top_level(root: &'a Message, strict: bool, message_hash: u64) -> Self {
        Self {
            root,
            stack: Vec::new(),
            strict,
            message_hash,
        }
    }

    pub fn nested(&self, child_root: &'a Message, child_hash: u64) -> CodecContext<'a> {
        let mut stack = self.stack.clone();
        stack.push(self.root);
        CodecContext {
            root: child_root,
            stack,
            strict: self.strict,
            message_hash: child_hash,
        }
    }

    /// The message at the top of the context (the caller's sibling-field
    /// scope): the innermost enclosing message, or `root` if there is none.
    pub fn current(&self) -> &'a Message {
        self.root
    }
}

/// How a codec represents "field was left unset" on the wire (spec §9,
/// Open Question: reserved-null code vs. presence-bit, and which version
/// families use which — see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullStrategy {
    /// One extra representable value is reserved to mean "absent"
    /// (numeric, bool, enum).
    ReservedCode,
    /// A leading presence bit indicates absence (the `dccl.presence`
    /// decorator, and `dccl.var_bytes`).
    PresenceBit,
    /// The codec has no concept of absence (static, hash, identifier, and
    /// any codec only ever used on required fields).
    None,
}

/// The common contract every singular field codec satisfies (spec §4.3).
///
/// `pre_encode`/`post_decode` (spec's WireType/FieldType split) are folded
/// into `encode`/`decode` directly rather than exposed as separate trait
/// methods: this crate's [`FieldValue`] already *is* the single currency
/// between the schema's field type and the wire's encoding type, so the
/// conversion each codec needs (enum tag ↔ packed index, timestamp ↔
/// seconds-of-day, ...) is an internal concern of that codec's
/// `encode`/`decode` bodies rather than a separately dispatched step.
pub trait FieldCodec: Send + Sync {
    /// Checked once at load time (spec §4.3: "Validation must occur at
    /// load time").
    fn validate(&self, field: &FieldDescriptor) -> Result<()>;

    /// How this codec represents an absent optional field.
    fn null_strategy(&self) -> NullStrategy {
        NullStrategy::None
    }

    /// Encodes the "field was not set" case.
    fn encode_empty(&self, field: &FieldDescriptor) -> Result<BitBuffer>;

    fn encode(&self, field: &FieldDescriptor, value: &FieldValue, ctx: &CodecContext) -> Result<BitBuffer>;

    /// Decodes one field. `Ok(None)` signals `NullValue` (spec §4.3): the
    /// message codec must suppress assignment rather than treat this as
    /// an error.
    fn decode(&self, field: &FieldDescriptor, bits: &mut BitBuffer, ctx: &CodecContext) -> Result<Option<FieldValue>>;

    fn size_empty(&self, field: &FieldDescriptor) -> Result<usize>;

    fn size(&self, field: &FieldDescriptor, value: &FieldValue) -> Result<usize>;

    fn min_size(&self, field: &FieldDescriptor) -> Result<usize>;

    fn max_size(&self, field: &FieldDescriptor) -> Result<usize>;

    /// Bytes this codec contributes to the enclosing descriptor's
    /// structural hash (spec §4.3, "Hashing is deterministic").
    fn hash_contribution(&self, field: &FieldDescriptor) -> Vec<u8>;

    /// One-line human description for `Engine::describe` (spec §4.14).
    fn info(&self, field: &FieldDescriptor) -> String;
}
