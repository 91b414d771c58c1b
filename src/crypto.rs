//! Optional payload encryption (spec §4.15): AES-CTR over the body bytes,
//! keyed by a passphrase-derived 256-bit key, with the per-message IV/nonce
//! derived as `SHA-256(head bytes)` — grounded in `dccl::Codec::encrypt`/
//! `decrypt` (`examples/original_source/src/dccl.cpp`), which does the same
//! with Crypto++'s `SHA256`/`CTR_Mode<AES>`.
//!
//! The head stays in the clear: the id codec must be parseable before any
//! decryption happens, and the head doubles as the cipher's nonce. Gated
//! behind the `crypto` feature; with it off, [`CryptoLayer::encrypt_body`]/
//! [`CryptoLayer::decrypt_body`] are no-ops that warn once a key has been
//! set, exactly the footgun spec §4.15 requires documented rather than
//! hidden behind a compile error.

use std::collections::BTreeSet;

use tracing::warn;

use crate::result::Result;

/// Holds the derived key and the set of message ids exempted from
/// encryption (spec §4.14, `set_crypto_passphrase(pw, skip_ids)`).
#[derive(Default)]
pub struct CryptoLayer {
    key: Option<[u8; 32]>,
    skip_ids: BTreeSet<u32>,
}

impl CryptoLayer {
    /// Derives a 32-byte key via SHA-256 of `passphrase` (spec §4.15: "SHA-256
    /// key derivation"). Always succeeds, even with the `crypto` feature off —
    /// the key is recorded either way, only its use at encode/decode time is
    /// gated.
    pub fn set_passphrase(&mut self, passphrase: &str, skip_ids: impl IntoIterator<Item = u32>) -> Result<()> {
        self.key = Some(derive_key(passphrase));
        self.skip_ids = skip_ids.into_iter().collect();
        if !cfg!(feature = "crypto") {
            warn!("crypto provider not compiled in; body will not be encrypted (enable the `crypto` feature)");
        }
        Ok(())
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    fn active_for(&self, id: u32) -> bool {
        self.key.is_some() && !self.skip_ids.contains(&id)
    }

    /// Encrypts `body` in place, keyed on `head` as nonce, unless `id` is
    /// exempted or no key/provider is available.
    pub fn encrypt_body(&self, id: u32, head: &[u8], body: &mut [u8]) {
        if !self.active_for(id) {
            return;
        }
        #[cfg(feature = "crypto")]
        {
            apply_ctr(self.key.as_ref().unwrap(), head, body);
        }
        #[cfg(not(feature = "crypto"))]
        {
            let _ = (head, body);
        }
    }

    /// Inverse of [`Self::encrypt_body`]; AES-CTR is its own inverse given
    /// the same key/nonce stream, so this is the identical call.
    pub fn decrypt_body(&self, id: u32, head: &[u8], body: &mut [u8]) {
        self.encrypt_body(id, head, body);
    }
}

fn derive_key(passphrase: &str) -> [u8; 32] {
    #[cfg(feature = "crypto")]
    {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        key
    }
    #[cfg(not(feature = "crypto"))]
    {
        // No provider compiled in: still produce a stable, deterministic
        // (if cryptographically useless) value so `CryptoLayer` doesn't
        // need an `Option` in its no-crypto shape too.
        let mut key = [0u8; 32];
        for (i, b) in passphrase.bytes().enumerate() {
            key[i % 32] ^= b;
        }
        key
    }
}

#[cfg(feature = "crypto")]
fn apply_ctr(key: &[u8; 32], head: &[u8], body: &mut [u8]) {
    use aes::Aes256;
    use ctr::cipher::{KeyIvInit, StreamCipher};
    use ctr::Ctr128BE;
    use sha2::{Digest, Sha256};

    let iv = Sha256::digest(head);
    let mut cipher = Ctr128BE::<Aes256>::new(key.into(), (&iv[..16]).into());
    cipher.apply_keystream(body);
}
