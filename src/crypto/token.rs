// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Share link token generation.

use ring::rand::{SecureRandom, SystemRandom};

/// Number of random bytes behind each token.
pub const TOKEN_BYTES: usize = 32;

/// Length of the hex-encoded token.
pub const TOKEN_HEX_LEN: usize = TOKEN_BYTES * 2;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("system random source unavailable")]
    RandomUnavailable,
}

/// Generates unguessable share tokens from the system CSPRNG.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    rng: SystemRandom,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    /// Draw 32 fresh random bytes and hex-encode them (64 lowercase chars).
    pub fn generate(&self) -> Result<String, TokenError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| TokenError::RandomUnavailable)?;
        Ok(hex::encode(bytes))
    }

    /// Whether `candidate` has the shape of a token this generator produces.
    ///
    /// Used by the public endpoints to reject garbage before touching storage.
    pub fn is_well_formed(candidate: &str) -> bool {
        candidate.len() == TOKEN_HEX_LEN
            && candidate
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn token_is_64_lowercase_hex() {
        let token = TokenGenerator::new().generate().unwrap();
        assert_eq!(token.len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert!(TokenGenerator::is_well_formed(&token));
    }

    #[test]
    fn tokens_do_not_collide() {
        let generator = TokenGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generator.generate().unwrap()));
        }
    }

    #[test]
    fn well_formed_rejects_bad_shapes() {
        assert!(!TokenGenerator::is_well_formed(""));
        assert!(!TokenGenerator::is_well_formed("abc"));
        assert!(!TokenGenerator::is_well_formed(&"A".repeat(64)));
        assert!(!TokenGenerator::is_well_formed(&"g".repeat(64)));
        assert!(!TokenGenerator::is_well_formed(&"a".repeat(65)));
        assert!(TokenGenerator::is_well_formed(&"0f".repeat(32)));
    }
}
