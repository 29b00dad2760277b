//! Reproducible short identifiers.
//!
//! Tokens are derived from SHA-256 in counter mode over a seed string, so
//! the same seed and length produce the same token on every platform and
//! every run. They are used to build data-product names that differ between
//! users but stay stable across re-runs (and therefore re-ingestion).

use sha2::{Digest, Sha256};

/// Characters a token is drawn from.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of the alphabet size that fits in a byte.
/// Bytes at or above this are rejected to keep the draw uniform.
const REJECT_AT: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Seed used when no user identity is available.
pub const DEFAULT_SEED: &str = "obsflow";

/// Length of the user token embedded in generated observation IDs.
pub const USER_TOKEN_LEN: usize = 7;

/// Generate a deterministic alphanumeric token of `len` characters.
///
/// A missing seed falls back to [`DEFAULT_SEED`]. Never fails; `len == 0`
/// yields an empty string.
pub fn rnd_token(seed: Option<&str>, len: usize) -> String {
    let seed = seed.unwrap_or(DEFAULT_SEED);
    let mut token = String::with_capacity(len);
    let mut counter: u64 = 0;

    while token.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        hasher.update(counter.to_le_bytes());

        for byte in hasher.finalize() {
            if byte >= REJECT_AT {
                continue;
            }
            token.push(ALPHABET[byte as usize % ALPHABET.len()] as char);
            if token.len() == len {
                break;
            }
        }
        counter += 1;
    }

    token
}

/// Read the invoking user's identity from the process environment.
///
/// Only the binary should call this; library code takes the seed as an
/// explicit parameter.
pub fn user_identity() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|user| !user.is_empty())
}
