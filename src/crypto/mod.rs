// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Share Cryptography
//!
//! Two primitives back every share link:
//!
//! - [`token`] - unguessable 256-bit link tokens, hex encoded
//! - [`cipher`] - AES-256-GCM sealing of the shared payload at rest
//!
//! Both draw randomness from `ring::rand::SystemRandom` (the OS CSPRNG).
//! Neither ever suspends; they are safe to call from request handlers.

pub mod cipher;
pub mod token;

pub use cipher::{CipherError, ContentCipher, EncryptionKey, SealedPayload, KEY_LEN};
pub use token::{TokenError, TokenGenerator, TOKEN_BYTES, TOKEN_HEX_LEN};
