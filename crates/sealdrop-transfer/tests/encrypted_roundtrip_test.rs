//! Integration test: encrypted transfers and integrity failures
//!
//! Covers the encrypt-then-chunk path and every way a download must refuse
//! to hand back bytes: tampered pieces, inconsistent manifests, wrong keys
//! and storage failures mid-transfer.

use async_trait::async_trait;
use bytes::Bytes;
use proptest::prelude::*;
use sealdrop_core::{PieceId, SealError, SealResult};
use sealdrop_crypto::{generate_key, NONCE_SIZE, TAG_SIZE};
use sealdrop_storage::{ObjectStore, OpendalStore};
use sealdrop_transfer::{download_bytes, upload_bytes, Layout, TransferManifest, TransferOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn encrypted(chunk_size: usize) -> TransferOptions {
    TransferOptions {
        encrypt: true,
        chunk_size,
        concurrency: 4,
    }
}

fn pseudo_random(len: usize) -> Vec<u8> {
    (0u64..len as u64)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 5)) as u8)
        .collect()
}

fn seal_error(err: &anyhow::Error) -> &SealError {
    err.downcast_ref::<SealError>()
        .unwrap_or_else(|| panic!("expected a SealError, got: {err:#}"))
}

/// Wraps a store and counts calls; can fail the Nth put.
struct Instrumented {
    inner: OpendalStore,
    puts: AtomicUsize,
    gets: AtomicUsize,
    fail_put_at: Option<usize>,
}

impl Instrumented {
    fn new(fail_put_at: Option<usize>) -> Self {
        Self {
            inner: OpendalStore::memory().unwrap(),
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            fail_put_at,
        }
    }
}

#[async_trait]
impl ObjectStore for Instrumented {
    async fn put(&self, data: Bytes) -> SealResult<String> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_put_at == Some(n) {
            return Err(SealError::Storage("upload failed: 402 Payment Required".into()));
        }
        self.inner.put(data).await
    }

    async fn get(&self, reference: &str) -> SealResult<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(reference).await
    }

    async fn health(&self) -> SealResult<()> {
        self.inner.health().await
    }

    fn describe(&self) -> String {
        format!("instrumented {}", self.inner.describe())
    }
}

/// Overwrite the blob stored under `reference` in place.
async fn overwrite(store: &OpendalStore, reference: &str, data: Vec<u8>) {
    store
        .operator()
        .write(&store.blob_path(reference), data)
        .await
        .unwrap();
}

#[tokio::test]
async fn encrypted_single_roundtrip() {
    let mem = OpendalStore::memory().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(mem.clone());
    let original = b"secret: the quick brown fox jumps over the lazy dog";

    let upload = upload_bytes(&store, "secret.txt", original, &encrypted(1 << 20), None)
        .await
        .expect("encrypted upload");

    assert!(upload.manifest.is_encrypted());
    assert!(upload.manifest.key().is_some());
    assert_eq!(
        upload.stored_bytes,
        (NONCE_SIZE + original.len() + TAG_SIZE) as u64
    );

    // The stored blob is ciphertext, not the plaintext
    let Layout::Single { file_id, .. } = upload.manifest.layout() else {
        panic!("expected single layout");
    };
    let stored = store.get(file_id).await.unwrap();
    assert!(!stored
        .windows(original.len())
        .any(|w| w == original.as_slice()));

    let download = download_bytes(&store, &upload.manifest_ref, &encrypted(1 << 20), None)
        .await
        .expect("encrypted download");
    assert_eq!(download.data, original);
}

#[tokio::test]
async fn encrypted_chunked_roundtrip() {
    let store: Arc<dyn ObjectStore> = Arc::new(OpendalStore::memory().unwrap());
    let original = pseudo_random(50_000);

    let upload = upload_bytes(&store, "big.bin", &original, &encrypted(8192), None)
        .await
        .unwrap();

    // Chunking applies to the envelope, not the plaintext
    let envelope_len = NONCE_SIZE + original.len() + TAG_SIZE;
    assert_eq!(upload.pieces, envelope_len.div_ceil(8192));
    assert!(upload.manifest.is_chunked());

    let download = download_bytes(&store, &upload.manifest_ref, &encrypted(8192), None)
        .await
        .unwrap();
    assert_eq!(download.data, original);
}

#[tokio::test]
async fn tampered_piece_fails_with_digest_mismatch() {
    let mem = OpendalStore::memory().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(mem.clone());
    let original = pseudo_random(30_000);

    let upload = upload_bytes(&store, "t.bin", &original, &encrypted(10_000), None)
        .await
        .unwrap();

    let Layout::Chunked { chunk_ids, .. } = upload.manifest.layout() else {
        panic!("expected chunked layout");
    };
    let target = PieceId::new(2).unwrap();
    let reference = &chunk_ids[&target];
    let mut bytes = store.get(reference).await.unwrap().to_vec();
    bytes[17] ^= 0x01;
    overwrite(&mem, reference, bytes).await;

    let err = download_bytes(&store, &upload.manifest_ref, &encrypted(10_000), None)
        .await
        .unwrap_err();
    match seal_error(&err) {
        SealError::DigestMismatch { piece, .. } => assert_eq!(*piece, Some(target)),
        other => panic!("expected DigestMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn tampered_single_blob_fails_with_digest_mismatch() {
    let mem = OpendalStore::memory().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(mem.clone());

    let upload = upload_bytes(&store, "s.txt", b"short secret", &encrypted(1024), None)
        .await
        .unwrap();
    let Layout::Single { file_id, .. } = upload.manifest.layout() else {
        panic!("expected single layout");
    };
    overwrite(&mem, file_id, vec![0u8; 40]).await;

    let err = download_bytes(&store, &upload.manifest_ref, &encrypted(1024), None)
        .await
        .unwrap_err();
    assert!(matches!(
        seal_error(&err),
        SealError::DigestMismatch { piece: None, .. }
    ));
}

#[tokio::test]
async fn wrong_key_in_manifest_fails_authentication() {
    let store: Arc<dyn ObjectStore> = Arc::new(OpendalStore::memory().unwrap());
    let upload = upload_bytes(&store, "k.txt", b"keyed payload", &encrypted(1024), None)
        .await
        .unwrap();

    // Same blob and digest, different key
    let Layout::Single { file_id, file_hash } = upload.manifest.layout().clone() else {
        panic!("expected single layout");
    };
    let forged = TransferManifest::single("k.txt", Some(generate_key().unwrap()), file_id, file_hash);
    let forged_ref = store
        .put(Bytes::from(forged.to_bytes().unwrap()))
        .await
        .unwrap();

    let err = download_bytes(&store, &forged_ref, &encrypted(1024), None)
        .await
        .unwrap_err();
    assert!(matches!(seal_error(&err), SealError::AuthenticationFailed));
}

#[tokio::test]
async fn malformed_manifest_rejected_before_any_piece_fetch() {
    let instrumented = Arc::new(Instrumented::new(None));
    let store: Arc<dyn ObjectStore> = instrumented.clone();

    let bad = serde_json::json!({
        "filename": "x.bin",
        "encrypted": true,
        "chunked": true,
        "chunk_ids": { "1": "aa", "2": "bb" },
        "chunk_hashes": { "1": "00", "2": "00" }
    });
    let manifest_ref = store
        .put(Bytes::from(serde_json::to_vec(&bad).unwrap()))
        .await
        .unwrap();

    let err = download_bytes(&store, &manifest_ref, &encrypted(1024), None)
        .await
        .unwrap_err();
    assert!(matches!(seal_error(&err), SealError::MalformedManifest(_)));
    assert_eq!(
        instrumented.gets.load(Ordering::SeqCst),
        1,
        "only the manifest itself may be fetched"
    );
}

#[tokio::test]
async fn failed_piece_upload_never_writes_manifest() {
    // 4 pieces; the third put fails
    let instrumented = Arc::new(Instrumented::new(Some(3)));
    let store: Arc<dyn ObjectStore> = instrumented.clone();
    let opts = TransferOptions {
        encrypt: false,
        chunk_size: 100,
        concurrency: 1,
    };

    let err = upload_bytes(&store, "partial.bin", &pseudo_random(400), &opts, None)
        .await
        .unwrap_err();
    assert!(matches!(seal_error(&err), SealError::Storage(_)));
    assert!(
        instrumented.puts.load(Ordering::SeqCst) <= 4,
        "no manifest put may follow a failed piece"
    );
}

#[tokio::test]
async fn missing_piece_blob_fails_download() {
    let mem = OpendalStore::memory().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(mem.clone());

    let upload = upload_bytes(&store, "m.bin", &pseudo_random(3000), &encrypted(1000), None)
        .await
        .unwrap();
    let Layout::Chunked { chunk_ids, .. } = upload.manifest.layout() else {
        panic!("expected chunked layout");
    };
    let reference = &chunk_ids[&PieceId::new(1).unwrap()];
    mem.operator()
        .delete(&mem.blob_path(reference))
        .await
        .unwrap();

    let err = download_bytes(&store, &upload.manifest_ref, &encrypted(1000), None)
        .await
        .unwrap_err();
    assert!(matches!(seal_error(&err), SealError::Storage(_)));
}

#[tokio::test]
async fn each_upload_uses_a_fresh_key() {
    let store: Arc<dyn ObjectStore> = Arc::new(OpendalStore::memory().unwrap());
    let a = upload_bytes(&store, "same.txt", b"same", &encrypted(1024), None)
        .await
        .unwrap();
    let b = upload_bytes(&store, "same.txt", b"same", &encrypted(1024), None)
        .await
        .unwrap();

    assert_ne!(a.manifest.key(), b.manifest.key());
    assert_ne!(a.manifest_ref, b.manifest_ref);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_encrypted_roundtrip(
        data in proptest::collection::vec(any::<u8>(), 0..20_000),
        chunk_size in 64usize..8192,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let restored = rt.block_on(async {
            let store: Arc<dyn ObjectStore> = Arc::new(OpendalStore::memory().unwrap());
            let upload = upload_bytes(&store, "p.bin", &data, &encrypted(chunk_size), None)
                .await
                .unwrap();
            download_bytes(&store, &upload.manifest_ref, &encrypted(chunk_size), None)
                .await
                .unwrap()
                .data
        });
        prop_assert_eq!(restored, data);
    }
}
