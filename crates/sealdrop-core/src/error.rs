use thiserror::Error;

use crate::types::PieceId;

pub type SealResult<T> = Result<T, SealError>;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("entropy unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("malformed envelope: {len} bytes is shorter than the nonce")]
    MalformedEnvelope { len: usize },

    #[error("authentication failed: wrong key, corrupted data, or tampering")]
    AuthenticationFailed,

    #[error("invalid chunk size: {0} (must be > 0)")]
    InvalidChunkSize(usize),

    #[error("{} digest mismatch: expected {expected}, got {actual}", piece_label(.piece))]
    DigestMismatch {
        piece: Option<PieceId>,
        expected: String,
        actual: String,
    },

    #[error("piece set is not contiguous: piece {0} is missing")]
    MissingPiece(PieceId),

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn piece_label(piece: &Option<PieceId>) -> String {
    match piece {
        Some(id) => format!("piece {id}"),
        None => "file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_mismatch_names_the_piece() {
        let err = SealError::DigestMismatch {
            piece: PieceId::new(3),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert_eq!(
            err.to_string(),
            "piece 3 digest mismatch: expected aa, got bb"
        );
    }

    #[test]
    fn digest_mismatch_without_piece_is_whole_file() {
        let err = SealError::DigestMismatch {
            piece: None,
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(err.to_string().starts_with("file digest mismatch"));
    }
}
