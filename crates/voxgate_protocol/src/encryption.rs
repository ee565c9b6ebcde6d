//! Authenticated payload encryption.
//!
//! Both ciphers are per-call scoped: a fresh IV/nonce is drawn for every
//! encryption, so no cipher state survives between frames and the functions
//! are safe to invoke from any thread.
//!
//! Output layouts on the wire:
//!
//! - AES-256-CBC-PKCS7: `IV(16) || ciphertext`
//! - ChaCha20-Poly1305: `nonce(12) || tag(16) || ciphertext`

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::prelude::*;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY_LEN: usize = 32;
const AES_IV_LEN: usize = 16;
const AES_BLOCK: usize = 16;
const CHACHA_NONCE_LEN: usize = 12;
const CHACHA_TAG_LEN: usize = 16;

/// The supported payload ciphers.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum EncryptionKind {
    #[default]
    None,
    #[serde(rename = "AES256")]
    Aes256,
    ChaCha20Poly1305,
}

/// A symmetric payload key.
///
/// Non-`None` ciphers use 32-byte keys; the `None` cipher's key is the
/// empty byte sequence. The raw bytes are kept out of `Debug` output.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct EncryptionKey(Vec<u8>);

impl EncryptionKey {
    /// The empty key used with [`EncryptionKind::None`].
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Generates a fresh key for the given cipher. The `None` kind yields
    /// the empty key.
    pub fn generate(kind: EncryptionKind) -> Self {
        match kind {
            EncryptionKind::None => Self::empty(),
            EncryptionKind::Aes256 | EncryptionKind::ChaCha20Poly1305 => {
                let mut bytes = vec![0; KEY_LEN];
                OsRng.fill_bytes(&mut bytes);
                Self(bytes)
            }
        }
    }

    /// Parses a key from its base64 form, as carried in the server config.
    pub fn from_base64(encoded: &str) -> Result<Self, ProtocolError> {
        BASE64_STANDARD
            .decode(encoded.trim())
            .map(Self)
            .map_err(|e| ProtocolError::Malformed(format!("invalid base64 key: {e}")))
    }

    /// The base64 form of this key.
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn expect_len(&self, kind: EncryptionKind) -> Result<&[u8], ProtocolError> {
        if self.0.len() != KEY_LEN {
            return Err(ProtocolError::Malformed(format!(
                "{kind:?} requires a {KEY_LEN}-byte key, got {} bytes",
                self.0.len()
            )));
        }

        Ok(&self.0)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey({} bytes)", self.0.len())
    }
}

/// Encrypts `plaintext` under `key`.
///
/// A fresh IV/nonce is drawn per call, so two encryptions of identical
/// plaintext under the same key yield different outputs.
pub fn encrypt(
    kind: EncryptionKind,
    key: &EncryptionKey,
    plaintext: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    match kind {
        EncryptionKind::None => Ok(plaintext.to_vec()),
        EncryptionKind::Aes256 => {
            let key = key.expect_len(kind)?;

            let mut iv = [0; AES_IV_LEN];
            OsRng.fill_bytes(&mut iv);

            let cipher = Aes256CbcEnc::new_from_slices(key, &iv)
                .map_err(ProtocolError::malformed)?;
            let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

            let mut out = Vec::with_capacity(AES_IV_LEN + ciphertext.len());
            out.extend_from_slice(&iv);
            out.extend_from_slice(&ciphertext);

            Ok(out)
        }
        EncryptionKind::ChaCha20Poly1305 => {
            let key = key.expect_len(kind)?;

            let mut nonce = [0; CHACHA_NONCE_LEN];
            OsRng.fill_bytes(&mut nonce);

            let cipher = ChaCha20Poly1305::new_from_slice(key)
                .map_err(ProtocolError::malformed)?;
            let sealed = cipher
                .encrypt(Nonce::from_slice(&nonce), plaintext)
                .map_err(|_| ProtocolError::Unauthenticated)?;

            // The AEAD implementation appends the tag; the wire layout
            // carries it up front, between the nonce and the ciphertext.
            let (body, tag) = sealed.split_at(sealed.len() - CHACHA_TAG_LEN);

            let mut out = Vec::with_capacity(CHACHA_NONCE_LEN + sealed.len());
            out.extend_from_slice(&nonce);
            out.extend_from_slice(tag);
            out.extend_from_slice(body);

            Ok(out)
        }
    }
}

/// Decrypts `data` that was produced by [`encrypt`] under the same key.
///
/// A key other than the encrypting one fails with
/// [`ProtocolError::Unauthenticated`]: a tag mismatch for the AEAD cipher,
/// a padding failure for CBC. Plausible garbage is never returned.
pub fn decrypt(
    kind: EncryptionKind,
    key: &EncryptionKey,
    data: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    match kind {
        EncryptionKind::None => Ok(data.to_vec()),
        EncryptionKind::Aes256 => {
            let key = key.expect_len(kind)?;

            if data.len() < AES_IV_LEN + AES_BLOCK || (data.len() - AES_IV_LEN) % AES_BLOCK != 0 {
                return Err(ProtocolError::Malformed(format!(
                    "AES payload of {} bytes is not an IV plus whole blocks",
                    data.len()
                )));
            }

            let (iv, ciphertext) = data.split_at(AES_IV_LEN);

            let cipher = Aes256CbcDec::new_from_slices(key, iv)
                .map_err(ProtocolError::malformed)?;

            cipher
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| ProtocolError::Unauthenticated)
        }
        EncryptionKind::ChaCha20Poly1305 => {
            let key = key.expect_len(kind)?;

            if data.len() < CHACHA_NONCE_LEN + CHACHA_TAG_LEN {
                return Err(ProtocolError::Malformed(format!(
                    "AEAD payload of {} bytes is shorter than nonce plus tag",
                    data.len()
                )));
            }

            let (nonce, rest) = data.split_at(CHACHA_NONCE_LEN);
            let (tag, body) = rest.split_at(CHACHA_TAG_LEN);

            // Reassemble into the ciphertext-then-tag order the AEAD
            // implementation verifies.
            let mut sealed = Vec::with_capacity(rest.len());
            sealed.extend_from_slice(body);
            sealed.extend_from_slice(tag);

            let cipher = ChaCha20Poly1305::new_from_slice(key)
                .map_err(ProtocolError::malformed)?;

            cipher
                .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
                .map_err(|_| ProtocolError::Unauthenticated)
        }
    }
}
