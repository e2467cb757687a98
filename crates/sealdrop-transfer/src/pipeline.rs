//! Upload and download pipelines over an [`ObjectStore`]
//!
//! Upload: optional encrypt → split when larger than the chunk size →
//! store pieces concurrently → build the manifest from the collected
//! references → store the manifest. The manifest reference is the handle
//! for everything else.
//!
//! Download: fetch and validate the manifest → fetch pieces concurrently,
//! verifying each digest as it arrives → reassemble → optional decrypt.
//!
//! Piece workers run on a `JoinSet` bounded by a `Semaphore` and report
//! back over an mpsc channel. The first failure aborts the remaining
//! workers, so an upload never stores a manifest for a partial set and a
//! download never reassembles unverified bytes.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use sealdrop_chunks::{reassemble, split, verify_blob, verify_piece, Digest};
use sealdrop_core::config::TransferConfig;
use sealdrop_core::{PieceId, SealError, SealResult};
use sealdrop_crypto::{decrypt, encrypt, generate_key};
use sealdrop_storage::ObjectStore;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::manifest::{Layout, TransferManifest};

/// Progress callback type (done, total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Name used when a manifest filename has no usable final component.
const FALLBACK_FILENAME: &str = "download";

#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Encrypt the payload under a fresh per-file key before storing
    pub encrypt: bool,
    /// Split threshold and piece size, in bytes
    pub chunk_size: usize,
    /// Maximum piece transfers in flight
    pub concurrency: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

impl TransferOptions {
    pub fn from_config(cfg: &TransferConfig) -> Self {
        Self {
            encrypt: cfg.encrypt_default,
            chunk_size: cfg.chunk_size_bytes(),
            concurrency: cfg.effective_concurrency(),
        }
    }
}

/// Result of a completed upload
#[derive(Debug)]
pub struct UploadOutcome {
    /// Reference of the stored manifest; share this (or a link to it)
    pub manifest_ref: String,
    pub manifest: TransferManifest,
    /// Plaintext size
    pub bytes: u64,
    /// Bytes actually handed to the store (envelope overhead included)
    pub stored_bytes: u64,
    pub pieces: usize,
}

/// Result of a completed, verified download
#[derive(Debug)]
pub struct DownloadOutcome {
    pub filename: String,
    pub data: Vec<u8>,
    pub manifest: TransferManifest,
}

/// A download written to disk
#[derive(Debug)]
pub struct SavedFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub manifest: TransferManifest,
}

/// Store `data` under `filename` and return the manifest reference.
///
/// Nothing is written for the manifest unless every piece was stored.
pub async fn upload_bytes(
    store: &Arc<dyn ObjectStore>,
    filename: &str,
    data: &[u8],
    opts: &TransferOptions,
    progress: Option<&ProgressFn>,
) -> Result<UploadOutcome> {
    if opts.chunk_size == 0 {
        return Err(SealError::InvalidChunkSize(0).into());
    }

    let key = if opts.encrypt {
        Some(generate_key().context("generating file key")?)
    } else {
        None
    };

    let payload: Cow<'_, [u8]> = match &key {
        Some(key) => Cow::Owned(encrypt(data, key).context("encrypting payload")?),
        None => Cow::Borrowed(data),
    };
    let stored_bytes = payload.len() as u64;

    let manifest = if payload.len() > opts.chunk_size {
        let set = split(&payload, opts.chunk_size)?;
        debug!(
            filename,
            pieces = set.len(),
            chunk_size = opts.chunk_size,
            "payload split"
        );
        let refs = put_pieces(store, set.pieces, opts.concurrency, progress).await?;
        TransferManifest::chunked(filename, key, refs, set.digests)?
    } else {
        let file_hash = Digest::of(&payload);
        let file_id = store
            .put(Bytes::copy_from_slice(&payload))
            .await
            .context("uploading payload")?;
        if let Some(cb) = progress {
            cb(1, 1, "stored 1/1");
        }
        TransferManifest::single(filename, key, file_id, file_hash)
    };

    let manifest_ref = store
        .put(Bytes::from(manifest.to_bytes()?))
        .await
        .context("uploading manifest")?;

    info!(
        filename,
        manifest = %manifest_ref,
        encrypted = manifest.is_encrypted(),
        chunked = manifest.is_chunked(),
        pieces = manifest.piece_count(),
        bytes = data.len(),
        stored_bytes,
        "uploaded"
    );

    Ok(UploadOutcome {
        manifest_ref,
        pieces: manifest.piece_count(),
        manifest,
        bytes: data.len() as u64,
        stored_bytes,
    })
}

/// Read `path` and upload it under its basename.
pub async fn upload_file(
    store: &Arc<dyn ObjectStore>,
    path: &Path,
    opts: &TransferOptions,
    progress: Option<&ProgressFn>,
) -> Result<UploadOutcome> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no usable file name in {}", path.display()))?;

    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading: {}", path.display()))?;

    upload_bytes(store, filename, &data, opts, progress).await
}

/// Fetch and validate a manifest without touching any data blobs.
pub async fn fetch_manifest(
    store: &Arc<dyn ObjectStore>,
    manifest_ref: &str,
) -> Result<TransferManifest> {
    let raw = store
        .get(manifest_ref)
        .await
        .with_context(|| format!("fetching manifest {manifest_ref}"))?;

    TransferManifest::from_bytes(&raw).with_context(|| format!("parsing manifest {manifest_ref}"))
}

/// Fetch, verify and (if needed) decrypt the payload behind a manifest.
pub async fn download_bytes(
    store: &Arc<dyn ObjectStore>,
    manifest_ref: &str,
    opts: &TransferOptions,
    progress: Option<&ProgressFn>,
) -> Result<DownloadOutcome> {
    let manifest = fetch_manifest(store, manifest_ref).await?;

    let payload = match manifest.layout() {
        Layout::Single { file_id, file_hash } => {
            let blob = store
                .get(file_id)
                .await
                .with_context(|| format!("fetching payload {file_id}"))?;
            verify_blob(&blob, file_hash)?;
            if let Some(cb) = progress {
                cb(1, 1, "verified 1/1");
            }
            blob.to_vec()
        }
        Layout::Chunked {
            chunk_ids,
            chunk_hashes,
        } => {
            let pieces =
                get_pieces(store, chunk_ids, chunk_hashes, opts.concurrency, progress).await?;
            reassemble(&pieces)?
        }
    };

    let data = match manifest.key() {
        Some(key) => decrypt(&payload, key).context("decrypting payload")?,
        None => payload,
    };

    info!(
        filename = manifest.filename(),
        manifest = %manifest_ref,
        encrypted = manifest.is_encrypted(),
        pieces = manifest.piece_count(),
        bytes = data.len(),
        "downloaded"
    );

    Ok(DownloadOutcome {
        filename: manifest.filename().to_string(),
        data,
        manifest,
    })
}

/// Download into `dir`, named after the manifest's filename.
///
/// Only the final path component of that name is used, so a manifest can
/// never place a file outside `dir`. The write is tmp-then-rename.
pub async fn download_to_dir(
    store: &Arc<dyn ObjectStore>,
    manifest_ref: &str,
    dir: &Path,
    opts: &TransferOptions,
    progress: Option<&ProgressFn>,
) -> Result<SavedFile> {
    let outcome = download_bytes(store, manifest_ref, opts, progress).await?;
    let name = safe_filename(&outcome.filename);

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating dir: {}", dir.display()))?;

    let path = dir.join(&name);
    let tmp = dir.join(format!(".{name}.sealdrop_tmp"));
    tokio::fs::write(&tmp, &outcome.data)
        .await
        .with_context(|| format!("writing tmp: {}", tmp.display()))?;
    tokio::fs::rename(&tmp, &path)
        .await
        .with_context(|| format!("renaming to: {}", path.display()))?;

    Ok(SavedFile {
        path,
        bytes: outcome.data.len() as u64,
        manifest: outcome.manifest,
    })
}

/// Reduce an untrusted filename to a single safe path component.
pub fn safe_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => FALLBACK_FILENAME.to_string(),
        other => other.to_string(),
    }
}

/// Store every piece; returns references keyed by piece id.
async fn put_pieces(
    store: &Arc<dyn ObjectStore>,
    pieces: BTreeMap<PieceId, Vec<u8>>,
    concurrency: usize,
    progress: Option<&ProgressFn>,
) -> Result<BTreeMap<PieceId, String>> {
    let total = pieces.len();
    let limit = Arc::new(Semaphore::new(concurrency.max(1)));
    let (tx, mut rx) = mpsc::channel::<(PieceId, usize, SealResult<String>)>(total.max(1));
    let mut workers = JoinSet::new();

    for (id, bytes) in pieces {
        let store = Arc::clone(store);
        let limit = Arc::clone(&limit);
        let tx = tx.clone();
        workers.spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else {
                return;
            };
            let size = bytes.len();
            let result = store.put(Bytes::from(bytes)).await;
            let _ = tx.send((id, size, result)).await;
        });
    }
    drop(tx);

    let mut refs = BTreeMap::new();
    while let Some((id, size, result)) = rx.recv().await {
        match result {
            Ok(reference) => {
                debug!(piece = %id, %reference, size, "piece stored");
                refs.insert(id, reference);
                if let Some(cb) = progress {
                    cb(
                        refs.len() as u64,
                        total as u64,
                        &format!("stored {}/{total}", refs.len()),
                    );
                }
            }
            Err(e) => {
                workers.abort_all();
                return Err(anyhow::Error::new(e).context(format!("uploading piece {id}")));
            }
        }
    }

    while let Some(joined) = workers.join_next().await {
        joined.context("piece upload worker failed")?;
    }

    if refs.len() != total {
        bail!("stored {} of {total} pieces", refs.len());
    }
    Ok(refs)
}

/// Fetch every piece, verifying each against its digest before accepting it.
async fn get_pieces(
    store: &Arc<dyn ObjectStore>,
    chunk_ids: &BTreeMap<PieceId, String>,
    chunk_hashes: &BTreeMap<PieceId, Digest>,
    concurrency: usize,
    progress: Option<&ProgressFn>,
) -> Result<BTreeMap<PieceId, Bytes>> {
    let total = chunk_ids.len();
    let limit = Arc::new(Semaphore::new(concurrency.max(1)));
    let (tx, mut rx) = mpsc::channel::<(PieceId, SealResult<Bytes>)>(total.max(1));
    let mut workers = JoinSet::new();

    for (id, reference) in chunk_ids {
        let Some(expected) = chunk_hashes.get(id).copied() else {
            bail!(SealError::MalformedManifest(format!(
                "piece {id} has no recorded digest"
            )));
        };
        let id = *id;
        let reference = reference.clone();
        let store = Arc::clone(store);
        let limit = Arc::clone(&limit);
        let tx = tx.clone();
        workers.spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else {
                return;
            };
            let result = store
                .get(&reference)
                .await
                .and_then(|bytes| verify_piece(id, &bytes, &expected).map(|()| bytes));
            let _ = tx.send((id, result)).await;
        });
    }
    drop(tx);

    let mut pieces = BTreeMap::new();
    while let Some((id, result)) = rx.recv().await {
        match result {
            Ok(bytes) => {
                debug!(piece = %id, size = bytes.len(), "piece verified");
                pieces.insert(id, bytes);
                if let Some(cb) = progress {
                    cb(
                        pieces.len() as u64,
                        total as u64,
                        &format!("verified {}/{total}", pieces.len()),
                    );
                }
            }
            Err(e) => {
                workers.abort_all();
                return Err(anyhow::Error::new(e).context(format!("downloading piece {id}")));
            }
        }
    }

    while let Some(joined) = workers.join_next().await {
        joined.context("piece download worker failed")?;
    }

    if pieces.len() != total {
        bail!("fetched {} of {total} pieces", pieces.len());
    }
    Ok(pieces)
}
