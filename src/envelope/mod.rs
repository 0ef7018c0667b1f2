// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Body Envelope
//!
//! AES-256-GCM transform between plaintext JSON bodies and the
//! `{"data": "<base64>"}` envelope.
//!
//! ## Components
//!
//! - [`BodyCipher`]: seal/open primitives over the configured key and nonce
//! - [`encrypt_bodies`]: pipeline stage sealing inbound and outbound JSON
//! - [`Decrypted`]: extractor handlers use to open the sealed request body
//!
//! ## Nonce
//!
//! A single nonce is configured per process and used for every message, and
//! it is not carried in the envelope. Reusing a nonce under one key leaks the
//! XOR of plaintexts and weakens the GCM tag. Moving to per-message nonces
//! requires a wire format change that carries the nonce.

pub mod cipher;
pub mod extractor;
pub mod middleware;

pub use cipher::{BodyCipher, CipherError, EncryptedEnvelope, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use extractor::Decrypted;
pub use middleware::encrypt_bodies;
