//! sealdrop-chunks: fixed-size piece splitting and SHA-256 integrity digests
//!
//! # Overview
//! - `digest`: SHA-256 fingerprints of piece bytes (tamper detection only)
//! - `split`: walk a payload in fixed windows, number pieces from 1, and
//!   join them back in numeric order

pub mod digest;
pub mod split;

// Convenience re-exports for the most common operations
pub use digest::Digest;
pub use split::{piece_count, reassemble, split, verify_blob, verify_piece, PieceSet};
