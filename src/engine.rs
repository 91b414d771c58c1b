//! The engine façade (spec §4.14): `load`/`unload`, `encode`/`decode`,
//! `size`/`max_size`/`min_size`, `id`, the crypto and plugin-mount hooks,
//! and `describe` (the one piece of the external CLI's `display_proto`
//! the spec folds into the core, §2 item 7).
//!
//! Grounded in `dccl::Codec` (`examples/original_source/src/dccl.cpp`):
//! its `encode`/`decode`/`load`/`size`/`info`/`set_crypto_passphrase`/
//! `load_library` map one-to-one onto the methods below, with the id/head/
//! body sequencing (spec §2's control-flow paragraph) kept identical.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::bitbuf::BitBuffer;
use crate::codec::identifier::{decode_id, encode_id, id_size_bits};
use crate::codec::message::MessageCodec;
use crate::codec::CodecContext;
use crate::crypto::CryptoLayer;
use crate::result::{Error, Result};
use crate::schema::MessageDescriptor;
use crate::value::Message;

#[cfg(feature = "dylib-plugins")]
use crate::plugin::PluginHandle;

/// One registered message: its descriptor, its pre-built codec (field
/// table + structural hash), kept together so `encode`/`decode`/`size`
/// never rebuild either (spec §3, "Registered codec factories live for
/// engine lifetime").
struct Registration {
    descriptor: MessageDescriptor,
    codec: MessageCodec,
}

/// Single-threaded codec engine (spec §5: "single-threaded with respect to
/// a given `Codec` instance"). `&mut self` on every mutating call means the
/// borrow checker — not documentation — enforces "one engine per thread".
pub struct Engine {
    id_codec_name: String,
    registrations: BTreeMap<u32, Registration>,
    crypto: CryptoLayer,
    #[cfg(feature = "dylib-plugins")]
    plugins: Vec<(String, PluginHandle)>,
    /// Strict mode for every encode/decode call this engine makes (spec
    /// §4.4: reject vs. clamp out-of-range values). One engine covers one
    /// policy; run two engines for mixed strict/non-strict traffic.
    strict: bool,
    /// Wrap width for [`Self::describe`]'s pretty-printing (spec §3,
    /// "Engine state ... console width").
    console_width: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            id_codec_name: "dccl.default.id".to_string(),
            registrations: BTreeMap::new(),
            crypto: CryptoLayer::default(),
            #[cfg(feature = "dylib-plugins")]
            plugins: Vec::new(),
            strict: true,
            console_width: 80,
        }
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn set_console_width(&mut self, width: usize) {
        self.console_width = width.max(1);
    }

    /// Swaps the id codec in use. Only `"dccl.default.id"` (1/2-byte
    /// short/long form, spec §4.13) is built in; alternate id codecs are a
    /// named-plugin concern, same as any other codec. Per spec §4.13,
    /// switching implicitly unloads every registered message, since
    /// previously computed head-bit-offsets assumed the old id codec's
    /// width.
    pub fn set_id_codec(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name != "dccl.default.id" {
            return Err(Error::Schema(format!("unknown id codec `{name}`")));
        }
        if name != self.id_codec_name {
            self.id_codec_name = name;
            self.registrations.clear();
        }
        Ok(())
    }

    /// Validates `descriptor`, sizes it, and registers it under its
    /// declared id (spec §4.14 `load`). Returns the descriptor's
    /// structural hash. Fails with [`Error::IdCollision`] if the id is
    /// already bound to a structurally different descriptor (re-loading
    /// the identical one is a no-op success, matching
    /// `dccl::Codec::load`'s `desc != id2desc_.find(...)` check, relaxed
    /// to structural rather than pointer equality since this IR has no
    /// stable descriptor identity to compare).
    pub fn load(&mut self, descriptor: MessageDescriptor) -> Result<u64> {
        let id = descriptor
            .options()
            .id
            .ok_or_else(|| Error::Schema(format!("message `{}` is missing dccl.id", descriptor.name())))?;
        let codec = MessageCodec::build(&descriptor)?;
        let hash = codec.hash();

        let max_body_bytes = codec.max_body_bytes()?;
        let id_bits = id_size_bits(id);
        let needed_bits = id_bits + max_body_bytes as usize * 8;
        let max_bytes = descriptor.options().max_bytes;
        if needed_bits > max_bytes as usize * 8 {
            return Err(Error::Capacity {
                id,
                needed_bits,
                max_bytes,
            });
        }

        if let Some(existing) = self.registrations.get(&id) {
            if existing.codec.hash() != hash {
                return Err(Error::IdCollision { id });
            }
            debug!(id, "message already registered with an identical structural hash");
            return Ok(hash);
        }

        info!(id, name = descriptor.name(), hash, "loaded DCCL message");
        self.registrations.insert(id, Registration { descriptor, codec });
        Ok(hash)
    }

    pub fn unload(&mut self, id: u32) -> Result<()> {
        self.registrations
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::UnknownId { id })
    }

    pub fn is_loaded(&self, id: u32) -> bool {
        self.registrations.contains_key(&id)
    }

    fn registration(&self, id: u32) -> Result<&Registration> {
        self.registrations.get(&id).ok_or(Error::UnknownId { id })
    }

    /// Peeks the id off the front of a frame without decoding the body
    /// (spec §4.14 `id(bytes)`): reads just enough of the prefix to
    /// resolve the short/long-form discriminator.
    pub fn id(&self, bytes: &[u8]) -> Result<u32> {
        let mut bits = BitBuffer::from_byte_string(bytes);
        decode_id(&mut bits)
    }

    /// Encodes `msg` under `id`'s registered descriptor: id prefix, then
    /// head bits (byte-padded), then body bits, then (if a key is set and
    /// `id` isn't exempt) body encryption keyed on the head bytes (spec §2
    /// control flow; grounded in `dccl::Codec::encode`).
    pub fn encode(&self, id: u32, msg: &Message) -> Result<Vec<u8>> {
        let reg = self.registration(id)?;
        let ctx = CodecContext::top_level(msg, self.strict, reg.codec.hash());
        let (head, mut body) = reg.codec.encode_split(msg, &ctx)?;
        body.pad_to_byte();
        let head = head.to_byte_string()?;
        let mut body = body.to_byte_string()?;

        self.crypto.encrypt_body(id, &head, &mut body);

        let mut out = encode_id(id)?.to_byte_string()?;
        out.extend_from_slice(&head);
        out.extend_from_slice(&body);

        let max_bytes = reg.descriptor.options().max_bytes as usize;
        if out.len() > max_bytes {
            return Err(Error::Capacity {
                id,
                needed_bits: out.len() * 8,
                max_bytes: reg.descriptor.options().max_bytes,
            });
        }
        Ok(out)
    }

    /// Decodes one message from the front of `bytes`, returning the
    /// message id, the populated [`Message`], and the number of bytes
    /// consumed (so the streaming variant can advance a shared buffer;
    /// spec §4.14 `decode`/`decode_inplace`).
    pub fn decode(&self, bytes: &[u8]) -> Result<(u32, Message, usize)> {
        let id = self.id(bytes)?;
        let reg = self.registration(id)?;
        let id_bits = id_size_bits(id);
        let id_byte_len = id_bits / 8;

        let head_bits: usize = reg.descriptor.head_fields().map(|f| reg.codec.field_max_bits(f)).sum::<Result<usize>>()?;
        let head_byte_len = (head_bits + 7) / 8;

        if bytes.len() < id_byte_len + head_byte_len {
            return Err(Error::Underflow {
                requested: (id_byte_len + head_byte_len) * 8,
                available: bytes.len() * 8,
            });
        }
        let head = &bytes[id_byte_len..id_byte_len + head_byte_len];
        let mut body = bytes[id_byte_len + head_byte_len..].to_vec();
        self.crypto.decrypt_body(id, head, &mut body);

        let mut frame = BitBuffer::from_byte_string(head);
        frame.append(&BitBuffer::from_byte_string(&body));

        let empty = Message::new();
        let ctx = CodecContext::top_level(&empty, self.strict, reg.codec.hash());
        let message = reg.codec.decode_body_only(&mut frame, &ctx)?;
        let consumed = id_byte_len + head_byte_len + body.len();
        Ok((id, message, consumed))
    }

    /// `size(msg)` (spec §4.14): the exact encoded length, in bytes, for
    /// the given message — i.e. `encode(id, msg).len()` without retaining
    /// the bytes.
    pub fn size(&self, id: u32, msg: &Message) -> Result<usize> {
        let reg = self.registration(id)?;
        let ctx = CodecContext::top_level(msg, self.strict, reg.codec.hash());
        let (head, body) = reg.codec.encode_split(msg, &ctx)?;
        let head_bytes = head.len() / 8;
        let body_bytes = (body.len() + 7) / 8;
        Ok(id_size_bits(id) / 8 + head_bytes + body_bytes)
    }

    pub fn max_size(&self, id: u32) -> Result<usize> {
        let reg = self.registration(id)?;
        Ok(id_size_bits(id) / 8 + reg.codec.max_body_bytes()? as usize)
    }

    pub fn min_size(&self, id: u32) -> Result<usize> {
        let reg = self.registration(id)?;
        Ok(id_size_bits(id) / 8 + reg.codec.min_body_bytes()? as usize)
    }

    /// Writes `encode(id, msg)` to `writer` in one call (spec §4.14
    /// `decode_inplace`'s encode-side counterpart): a thin convenience over
    /// [`Self::encode`] for callers driving a socket or serial port instead
    /// of building a `Vec<u8>` themselves.
    pub fn encode_to_writer<W: std::io::Write>(&self, id: u32, msg: &Message, writer: &mut W) -> Result<()> {
        let bytes = self.encode(id, msg)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Reads up to `max_len` bytes from `reader` and decodes one message
    /// from them (spec §4.14 `decode_inplace`: "the streaming variant
    /// consumes exactly one message's bytes from the front of a buffer").
    /// Since a DCCL frame carries no outer length prefix, the caller is
    /// expected to pass the registered message's [`Self::max_size`] (or a
    /// known exact frame length) as `max_len`; bytes beyond what
    /// [`Self::decode`] actually consumes are left unread in `reader`'s
    /// underlying source only if the caller reads exactly `consumed` bytes
    /// at a time upstream — this call itself always drains `max_len` bytes.
    pub fn decode_from_reader<R: std::io::Read>(&self, reader: &mut R, max_len: usize) -> Result<(u32, Message, usize)> {
        let mut buf = vec![0u8; max_len];
        reader.read_exact(&mut buf)?;
        self.decode(&buf)
    }

    /// Derives a crypto key from `passphrase` and exempts `skip_ids` from
    /// body encryption (spec §4.14/§4.15). Always succeeds; with the
    /// `crypto` feature off this only records the key and logs a warning,
    /// per spec's documented footgun.
    pub fn set_crypto_passphrase(&mut self, passphrase: &str, skip_ids: impl IntoIterator<Item = u32>) -> Result<()> {
        self.crypto.set_passphrase(passphrase, skip_ids)
    }

    /// Renders field name, wire kind, bit range, and codec name for a
    /// loaded descriptor, wrapped to [`Self::set_console_width`] (spec
    /// §4.14 `info`, grounded in `dccl::Codec::info`'s header/body dump).
    pub fn describe(&self, id: u32) -> Result<String> {
        let reg = self.registration(id)?;
        let mut out = String::new();
        let allowed_bytes = reg.descriptor.options().max_bytes;
        out.push_str(&format!("= {} (id={id}) =\n", reg.descriptor.name()));
        out.push_str(&format!(
            "max size: {} bytes / {} bits; allowed: {} bytes\n",
            self.max_size(id)?,
            self.max_size(id)? * 8,
            allowed_bytes
        ));
        out.push_str("== head ==\n");
        for field in reg.descriptor.head_fields() {
            self.describe_field(&mut out, id, field)?;
        }
        out.push_str("== body ==\n");
        for field in reg.descriptor.body_fields() {
            self.describe_field(&mut out, id, field)?;
        }
        Ok(out)
    }

    fn describe_field(&self, out: &mut String, id: u32, field: &crate::schema::FieldDescriptor) -> Result<()> {
        let reg = self.registration(id)?;
        let bits = reg.codec.field_max_bits(field)?;
        let line = format!("  {} [{bits} bits]", field.name());
        for chunk in wrap_line(&line, self.console_width) {
            out.push_str(&chunk);
            out.push('\n');
        }
        Ok(())
    }

    #[cfg(feature = "dylib-plugins")]
    /// Opens a `cdylib` exporting `dccl3_load`/`dccl3_unload`, calling
    /// `dccl3_load(self)` immediately (spec §4.14/§6 plugin ABI).
    pub fn load_library(&mut self, path: &str) -> Result<()> {
        let handle = PluginHandle::open(path, self as *mut Engine)?;
        self.plugins.push((path.to_string(), handle));
        Ok(())
    }

    #[cfg(feature = "dylib-plugins")]
    /// Closes a previously mounted plugin, calling its `dccl3_unload` hook
    /// first. Libraries are otherwise closed in LIFO order at `Drop` time
    /// (spec §5).
    pub fn unload_library(&mut self, path: &str) -> Result<()> {
        let idx = self
            .plugins
            .iter()
            .position(|(p, _)| p == path)
            .ok_or_else(|| Error::Plugin(format!("no plugin mounted at `{path}`")))?;
        let (_, handle) = self.plugins.remove(idx);
        handle.close(self as *mut Engine);
        Ok(())
    }
}

#[cfg(feature = "dylib-plugins")]
impl Drop for Engine {
    fn drop(&mut self) {
        while let Some((_, handle)) = self.plugins.pop() {
            handle.close(std::ptr::null_mut());
        }
    }
}

fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if line.len() <= width {
        return vec![line.to_string()];
    }
    line.as_bytes()
        .chunks(width)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}
