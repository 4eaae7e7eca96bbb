//! Symmetric encryption of session cookie payloads.
//!
//! Token layout, base64url without padding:
//!
//! ```text
//! nonce (12 bytes) || ChaCha20-Poly1305 ciphertext + tag (16 bytes)
//! ```
//!
//! The cipher key is the SHA-256 digest of the configured secret.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Not base64, too short, or not UTF-8 once opened.
    #[error("malformed session token")]
    Malformed,

    /// Tampered token or wrong key.
    #[error("session token failed verification")]
    Verification,

    #[error("session encryption failed")]
    Encryption,

    #[error("invalid session payload: {0}")]
    Payload(String),
}

/// Encrypts and decrypts opaque session strings under one secret.
#[derive(Clone)]
pub struct SessionCodec {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(secret_key: &str) -> Self {
        let digest = Sha256::digest(secret_key.as_bytes());
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(digest.as_slice())),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Encryption)?;

        let mut token = Vec::with_capacity(NONCE_LEN + sealed.len());
        token.extend_from_slice(nonce.as_slice());
        token.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError> {
        let raw = URL_SAFE_NO_PAD
            .decode(ciphertext.as_bytes())
            .map_err(|_| CodecError::Malformed)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::Malformed);
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let opened = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CodecError::Verification)?;
        String::from_utf8(opened).map_err(|_| CodecError::Malformed)
    }
}

pub fn encrypt(secret_key: &str, plaintext: &str) -> Result<String, CodecError> {
    SessionCodec::new(secret_key).encrypt(plaintext)
}

pub fn decrypt(secret_key: &str, ciphertext: &str) -> Result<String, CodecError> {
    SessionCodec::new(secret_key).decrypt(ciphertext)
}
