//! Transfer manifest: the self-describing record of one upload.
//!
//! JSON wire format (optional fields are omitted when not applicable):
//! ```json
//! {
//!   "filename": "report.pdf",
//!   "encrypted": true,
//!   "key": "<base64 256-bit key>",
//!   "chunked": true,
//!   "chunk_ids": { "1": "<ref>", "2": "<ref>" },
//!   "chunk_hashes": { "1": "<sha256 hex>", "2": "<sha256 hex>" }
//! }
//! ```
//! Unchunked manifests carry `file_id` + `file_hash` instead of the maps.
//! A manifest is built once, after every blob is stored, and never updated.

use sealdrop_chunks::Digest;
use sealdrop_core::{PieceId, SealError, SealResult};
use sealdrop_crypto::Key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the stored bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// The whole (possibly encrypted) payload is one blob.
    Single { file_id: String, file_hash: Digest },
    /// The payload was split; ids are contiguous from 1.
    Chunked {
        chunk_ids: BTreeMap<PieceId, String>,
        chunk_hashes: BTreeMap<PieceId, Digest>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferManifest {
    filename: String,
    key: Option<Key>,
    layout: Layout,
}

/// Flat serialized form; Go-style `omitempty` semantics on read and write.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestWire {
    filename: String,
    encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    chunked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk_ids: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk_hashes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_hash: Option<String>,
}

fn malformed(msg: impl Into<String>) -> SealError {
    SealError::MalformedManifest(msg.into())
}

fn present(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

fn present_map(m: Option<BTreeMap<String, String>>) -> Option<BTreeMap<String, String>> {
    m.filter(|m| !m.is_empty())
}

fn parse_digest(what: &str, hex: &str) -> SealResult<Digest> {
    Digest::from_hex(hex).map_err(|e| malformed(format!("{what}: {e}")))
}

fn check_contiguous<V>(map: &BTreeMap<PieceId, V>) -> SealResult<()> {
    let mut expected = PieceId::first();
    for id in map.keys() {
        if *id != expected {
            return Err(malformed(format!("piece {expected} is missing")));
        }
        expected = id.next().unwrap_or(expected);
    }
    Ok(())
}

impl TransferManifest {
    /// Manifest for a payload stored as one blob.
    pub fn single(filename: &str, key: Option<Key>, file_id: String, file_hash: Digest) -> Self {
        Self {
            filename: filename.to_string(),
            key,
            layout: Layout::Single { file_id, file_hash },
        }
    }

    /// Manifest for a split payload.
    ///
    /// Both maps must cover the same ids, contiguous from 1.
    pub fn chunked(
        filename: &str,
        key: Option<Key>,
        chunk_ids: BTreeMap<PieceId, String>,
        chunk_hashes: BTreeMap<PieceId, Digest>,
    ) -> SealResult<Self> {
        if chunk_ids.is_empty() {
            return Err(malformed("chunked manifest has no pieces"));
        }
        if !chunk_ids.keys().eq(chunk_hashes.keys()) {
            return Err(malformed("chunk_ids and chunk_hashes cover different pieces"));
        }
        check_contiguous(&chunk_ids)?;

        Ok(Self {
            filename: filename.to_string(),
            key,
            layout: Layout::Chunked {
                chunk_ids,
                chunk_hashes,
            },
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.layout, Layout::Chunked { .. })
    }

    /// Number of stored data blobs (1 when unchunked).
    pub fn piece_count(&self) -> usize {
        match &self.layout {
            Layout::Single { .. } => 1,
            Layout::Chunked { chunk_ids, .. } => chunk_ids.len(),
        }
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Serialize to pretty-printed JSON bytes
    pub fn to_bytes(&self) -> SealResult<Vec<u8>> {
        serde_json::to_vec_pretty(&self.to_wire())
            .map_err(|e| SealError::Other(anyhow::anyhow!("serializing manifest: {e}")))
    }

    /// Deserialize and validate; inconsistent documents are `MalformedManifest`.
    pub fn from_bytes(data: &[u8]) -> SealResult<Self> {
        let wire: ManifestWire =
            serde_json::from_slice(data).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
        Self::from_wire(wire)
    }

    fn to_wire(&self) -> ManifestWire {
        let mut wire = ManifestWire {
            filename: self.filename.clone(),
            encrypted: self.key.is_some(),
            key: self.key.as_ref().map(Key::to_base64),
            ..Default::default()
        };

        match &self.layout {
            Layout::Single { file_id, file_hash } => {
                wire.file_id = Some(file_id.clone());
                wire.file_hash = Some(file_hash.to_hex());
            }
            Layout::Chunked {
                chunk_ids,
                chunk_hashes,
            } => {
                wire.chunked = true;
                wire.chunk_ids = Some(
                    chunk_ids
                        .iter()
                        .map(|(id, r)| (id.to_string(), r.clone()))
                        .collect(),
                );
                wire.chunk_hashes = Some(
                    chunk_hashes
                        .iter()
                        .map(|(id, d)| (id.to_string(), d.to_hex()))
                        .collect(),
                );
            }
        }
        wire
    }

    fn from_wire(wire: ManifestWire) -> SealResult<Self> {
        let key = match (wire.encrypted, present(wire.key)) {
            (true, Some(encoded)) => Some(
                Key::from_base64(&encoded).map_err(|e| malformed(format!("key: {e}")))?,
            ),
            (true, None) => return Err(malformed("encrypted manifest has no key")),
            (false, Some(_)) => return Err(malformed("unencrypted manifest carries a key")),
            (false, None) => None,
        };

        let file_id = present(wire.file_id);
        let file_hash = present(wire.file_hash);
        let chunk_ids = present_map(wire.chunk_ids);
        let chunk_hashes = present_map(wire.chunk_hashes);

        if wire.chunked {
            if file_id.is_some() || file_hash.is_some() {
                return Err(malformed(
                    "chunked manifest also carries single-file fields",
                ));
            }
            let Some(chunk_ids) = chunk_ids else {
                return Err(malformed("chunked manifest has no chunk_ids"));
            };
            let Some(chunk_hashes) = chunk_hashes else {
                return Err(malformed("chunked manifest has no chunk_hashes"));
            };

            let ids = chunk_ids
                .into_iter()
                .map(|(k, r)| {
                    let id = k
                        .parse::<PieceId>()
                        .map_err(|e| malformed(format!("chunk_ids: {e}")))?;
                    if r.is_empty() {
                        return Err(malformed(format!("chunk_ids: piece {id} has no reference")));
                    }
                    Ok((id, r))
                })
                .collect::<SealResult<BTreeMap<_, _>>>()?;
            let hashes = chunk_hashes
                .into_iter()
                .map(|(k, h)| {
                    let id = k
                        .parse::<PieceId>()
                        .map_err(|e| malformed(format!("chunk_hashes: {e}")))?;
                    Ok((id, parse_digest(&format!("chunk_hashes[{id}]"), &h)?))
                })
                .collect::<SealResult<BTreeMap<_, _>>>()?;

            Self::chunked(&wire.filename, key, ids, hashes)
        } else {
            if chunk_ids.is_some() || chunk_hashes.is_some() {
                return Err(malformed(
                    "unchunked manifest also carries chunk fields",
                ));
            }
            let Some(file_id) = file_id else {
                return Err(malformed("unchunked manifest has no file_id"));
            };
            let Some(file_hash) = file_hash else {
                return Err(malformed("unchunked manifest has no file_hash"));
            };
            let file_hash = parse_digest("file_hash", &file_hash)?;

            Ok(Self::single(&wire.filename, key, file_id, file_hash))
        }
    }
}
