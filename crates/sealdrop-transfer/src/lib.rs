//! sealdrop-transfer: transfer manifests and the upload/download pipeline
//!
//! - `manifest`: the JSON record that makes a transfer retrievable
//! - `pipeline`: encrypt, split, store concurrently, and the reverse
//! - `link`: shareable download links around a manifest reference

pub mod link;
pub mod manifest;
pub mod pipeline;

pub use link::{extract_reference, render_link};
pub use manifest::{Layout, TransferManifest};
pub use pipeline::{
    download_bytes, download_to_dir, fetch_manifest, upload_bytes, upload_file, DownloadOutcome,
    ProgressFn, SavedFile, TransferOptions, UploadOutcome,
};
