//! Crate-wide error type and `Result` alias.
//!
//! Mirrors the abstract error taxonomy of spec §7: each variant is raised
//! from exactly one façade entry point (`load`, `encode`, `decode`, ...),
//! never recovered from locally except the two documented escape hatches
//! (`NullValue`, handled internally by codecs, and the non-strict numeric
//! clamp, which logs via `tracing` and continues).

use thiserror::Error;

pub type Result<A, E = Error> = std::result::Result<A, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("message {id} would need {needed_bits} bits, exceeding its {max_bytes}-byte budget")]
    Capacity { id: u32, needed_bits: usize, max_bytes: u32 },

    #[error("id {id} is already registered to a different descriptor")]
    IdCollision { id: u32 },

    #[error("field `{field}` value is out of range [{min}, {max}]: {value}")]
    OutOfRange { field: String, value: f64, min: f64, max: f64 },

    #[error("required field(s) not set: {}", .paths.join(", "))]
    Uninitialized { paths: Vec<String> },

    #[error("decode requested {requested} bits but only {available} were available")]
    Underflow { requested: usize, available: usize },

    #[error("no descriptor is registered for id {id}")]
    UnknownId { id: u32 },

    #[error("schema hash mismatch on field `{field}`: expected {expected:#x}, received {received:#x}")]
    HashMismatch { field: String, expected: u64, received: u64 },

    #[error("crypto operation requested but no provider is compiled in (enable the `crypto` feature)")]
    CryptoUnavailable,

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid UTF-8 in string field: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
