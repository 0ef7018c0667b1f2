// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-GCM body envelope.
//!
//! Wire format: `{"data": "<standard base64 of ciphertext || 16-byte tag>"}`.
//! The nonce is not transmitted; both sides use the configured process-wide
//! nonce.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use axum::body::Bytes;
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Serialized envelope size for a plaintext of `plaintext_len` bytes.
pub const fn sealed_len(plaintext_len: usize) -> usize {
    // `{"data":"` + padded base64 of ciphertext||tag + `"}`
    11 + (plaintext_len + TAG_SIZE).div_ceil(3) * 4
}

/// Encrypted body envelope, used in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EncryptedEnvelope {
    /// Base64 AEAD ciphertext with appended tag
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("encryption failed")]
    Encrypt,

    #[error("body is not an encrypted envelope: {0}")]
    MalformedEnvelope(String),

    #[error("envelope data is not valid base64")]
    InvalidBase64,

    #[error("ciphertext is {0} bytes, shorter than the authentication tag")]
    Truncated(usize),

    #[error("authentication failed")]
    Decrypt,
}

impl CipherError {
    pub fn is_encryption_side(&self) -> bool {
        matches!(self, CipherError::Encrypt)
    }
}

impl From<CipherError> for ApiError {
    fn from(err: CipherError) -> Self {
        if err.is_encryption_side() {
            ApiError::encryption()
        } else {
            ApiError::decryption()
        }
    }
}

/// Stateless envelope transform over a shared key and nonce.
#[derive(Clone)]
pub struct BodyCipher {
    aead: Aes256Gcm,
    nonce: [u8; NONCE_SIZE],
}

impl std::fmt::Debug for BodyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyCipher").finish_non_exhaustive()
    }
}

impl BodyCipher {
    pub fn new(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE]) -> Self {
        Self {
            aead: Aes256Gcm::new(&Key::<Aes256Gcm>::from(*key)),
            nonce: *nonce,
        }
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope, CipherError> {
        let ciphertext = self
            .aead
            .encrypt(&Nonce::from(self.nonce), plaintext)
            .map_err(|_| CipherError::Encrypt)?;
        Ok(EncryptedEnvelope {
            data: Base64::encode_string(&ciphertext),
        })
    }

    pub fn open(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, CipherError> {
        let ciphertext =
            Base64::decode_vec(&envelope.data).map_err(|_| CipherError::InvalidBase64)?;
        if ciphertext.len() < TAG_SIZE {
            return Err(CipherError::Truncated(ciphertext.len()));
        }
        self.aead
            .decrypt(&Nonce::from(self.nonce), ciphertext.as_slice())
            .map_err(|_| CipherError::Decrypt)
    }

    /// Wrap a raw body as a serialized envelope. Empty bodies are returned
    /// unchanged.
    pub fn seal_body(&self, body: Bytes) -> Result<Bytes, CipherError> {
        if body.is_empty() {
            return Ok(body);
        }
        let envelope = self.seal(&body)?;
        serde_json::to_vec(&envelope)
            .map(Bytes::from)
            .map_err(|_| CipherError::Encrypt)
    }

    /// Parse a serialized envelope and recover the plaintext.
    pub fn open_body(&self, body: &[u8]) -> Result<Vec<u8>, CipherError> {
        let envelope: EncryptedEnvelope = serde_json::from_slice(body)
            .map_err(|e| CipherError::MalformedEnvelope(e.to_string()))?;
        self.open(&envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn cipher() -> BodyCipher {
        BodyCipher::new(&[0x42; KEY_SIZE], &[0x24; NONCE_SIZE])
    }

    fn tampered(envelope: &EncryptedEnvelope, index: usize) -> EncryptedEnvelope {
        let mut raw = Base64::decode_vec(&envelope.data).unwrap();
        raw[index] ^= 0x01;
        EncryptedEnvelope {
            data: Base64::encode_string(&raw),
        }
    }

    #[test]
    fn body_round_trip() {
        let cipher = cipher();
        for plaintext in [
            &b"x"[..],
            br#"{"email":"a@b.c","password":"secret"}"#,
            &[0u8; 1024],
        ] {
            let sealed = cipher.seal_body(Bytes::copy_from_slice(plaintext)).unwrap();
            assert_eq!(cipher.open_body(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn sealed_len_matches_serialized_envelope() {
        let cipher = cipher();
        for len in [1, 2, 3, 4, 47, 1000, 4096] {
            let sealed = cipher.seal_body(Bytes::from(vec![b'a'; len])).unwrap();
            assert_eq!(sealed.len(), sealed_len(len), "plaintext of {len} bytes");
        }
    }

    #[test]
    fn sealed_body_is_an_envelope() {
        let sealed = cipher().seal_body(Bytes::from_static(b"{}")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&sealed).unwrap();
        let data = value["data"].as_str().unwrap();
        assert_eq!(Base64::decode_vec(data).unwrap().len(), 2 + TAG_SIZE);
    }

    #[test]
    fn every_flipped_byte_is_detected() {
        let cipher = cipher();
        let envelope = cipher.seal(b"attack at dawn").unwrap();
        let len = Base64::decode_vec(&envelope.data).unwrap().len();

        for index in 0..len {
            assert_eq!(
                cipher.open(&tampered(&envelope, index)),
                Err(CipherError::Decrypt),
                "flip at byte {index} went unnoticed"
            );
        }
    }

    #[test]
    fn empty_body_passes_through() {
        let sealed = cipher().seal_body(Bytes::new()).unwrap();
        assert!(sealed.is_empty());
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let envelope = cipher().seal(b"hello").unwrap();
        let other = BodyCipher::new(&[0x43; KEY_SIZE], &[0x24; NONCE_SIZE]);
        assert_eq!(other.open(&envelope), Err(CipherError::Decrypt));
    }

    #[test]
    fn rejects_non_envelope_input() {
        let cipher = cipher();
        assert!(matches!(
            cipher.open_body(br#"{"email":"a@b.c"}"#),
            Err(CipherError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            cipher.open_body(b"not json"),
            Err(CipherError::MalformedEnvelope(_))
        ));
        assert_eq!(
            cipher.open_body(br#"{"data":"%%%"}"#),
            Err(CipherError::InvalidBase64)
        );
        assert_eq!(
            cipher.open_body(br#"{"data":"AAAA"}"#),
            Err(CipherError::Truncated(3))
        );
    }

    #[test]
    fn errors_map_to_stage_specific_codes() {
        let encrypt = ApiError::from(CipherError::Encrypt);
        assert_eq!(encrypt.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(encrypt.code, "ENCRYPTION_ERROR");

        let decrypt = ApiError::from(CipherError::Decrypt);
        assert_eq!(decrypt.status, StatusCode::BAD_REQUEST);
        assert_eq!(decrypt.code, "DECRYPTION_ERROR");
    }
}
