//! Fixed-size piece splitting and reassembly
//!
//! A payload is walked left to right in `max_piece_size` windows. Each
//! window becomes a piece numbered from 1; only the last one may be short.
//! Pieces are addressed by number, never by byte offset, and each carries
//! the SHA-256 of its bytes so it can be verified on its own.

use rayon::prelude::*;
use sealdrop_core::{PieceId, SealError, SealResult};
use std::collections::BTreeMap;

use crate::digest::Digest;

/// Result of [`split`]: piece bytes and their digests, keyed by the same ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PieceSet {
    pub pieces: BTreeMap<PieceId, Vec<u8>>,
    pub digests: BTreeMap<PieceId, Digest>,
}

impl PieceSet {
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

/// Number of pieces [`split`] produces for a payload of `len` bytes.
pub fn piece_count(len: usize, max_piece_size: usize) -> SealResult<usize> {
    if max_piece_size == 0 {
        return Err(SealError::InvalidChunkSize(max_piece_size));
    }
    Ok(len.div_ceil(max_piece_size))
}

/// Split `payload` into numbered pieces of at most `max_piece_size` bytes.
///
/// An empty payload yields an empty set. Digests are computed in parallel.
pub fn split(payload: &[u8], max_piece_size: usize) -> SealResult<PieceSet> {
    let count = piece_count(payload.len(), max_piece_size)?;
    if u32::try_from(count).is_err() {
        return Err(SealError::InvalidChunkSize(max_piece_size));
    }

    let windows: Vec<(PieceId, &[u8])> = payload
        .chunks(max_piece_size)
        .zip(1u32..)
        .filter_map(|(window, n)| PieceId::new(n).map(|id| (id, window)))
        .collect();

    let digests = windows
        .par_iter()
        .map(|(id, window)| (*id, Digest::of(window)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    let pieces = windows
        .into_iter()
        .map(|(id, window)| (id, window.to_vec()))
        .collect();

    Ok(PieceSet { pieces, digests })
}

/// Concatenate pieces in ascending numeric id order.
///
/// The set must be contiguous from piece 1: a gap fails with `MissingPiece`
/// naming the first absent id instead of producing a silently short payload.
/// An empty set reassembles to an empty payload.
pub fn reassemble<B: AsRef<[u8]>>(pieces: &BTreeMap<PieceId, B>) -> SealResult<Vec<u8>> {
    let total: usize = pieces.values().map(|p| p.as_ref().len()).sum();
    let mut assembled = Vec::with_capacity(total);

    let mut expected = PieceId::first();
    for (id, bytes) in pieces {
        if *id != expected {
            return Err(SealError::MissingPiece(expected));
        }
        assembled.extend_from_slice(bytes.as_ref());
        // An id equal to u32::MAX is necessarily the last key in the map
        expected = id.next().unwrap_or(expected);
    }

    Ok(assembled)
}

/// Check a fetched piece against the digest recorded for it.
pub fn verify_piece(id: PieceId, bytes: &[u8], expected: &Digest) -> SealResult<()> {
    check(Some(id), bytes, expected)
}

/// Check a whole (unsplit) blob against its recorded digest.
pub fn verify_blob(bytes: &[u8], expected: &Digest) -> SealResult<()> {
    check(None, bytes, expected)
}

fn check(piece: Option<PieceId>, bytes: &[u8], expected: &Digest) -> SealResult<()> {
    let actual = Digest::of(bytes);
    if actual == *expected {
        Ok(())
    } else {
        Err(SealError::DigestMismatch {
            piece,
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        })
    }
}
