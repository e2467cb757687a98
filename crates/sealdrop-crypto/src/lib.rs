//! sealdrop-crypto: client-side encryption for sealdrop transfers
//!
//! Encrypt-then-chunk: the whole file is sealed once under a fresh per-file
//! key, and the resulting envelope is what gets split and uploaded.
//!
//! Envelope format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: AES-256-GCM ciphertext][16 bytes: tag]
//! ```
//!
//! Nothing in this crate logs or persists key material.

pub mod cipher;
pub mod keys;

pub use cipher::{decrypt, encrypt};
pub use keys::{generate_key, Key};

/// Size of a file key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
