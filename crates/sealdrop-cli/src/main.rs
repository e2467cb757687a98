//! sealdrop: encrypted, chunked file drops over Swarm or S3
//!
//! Commands:
//!   upload <file>               - encrypt (optional), split, store; print a link
//!   download <ref-or-link>      - fetch, verify, decrypt, save
//!   inspect <ref-or-link>       - show what a manifest describes
//!   health                      - check the storage backend is reachable
//!   config show                 - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use sealdrop_core::config::{Backend, SealConfig};
use sealdrop_storage::{build_from_config, check_health, ObjectStore, S3Credentials, SwarmStore};
use sealdrop_transfer::{
    download_to_dir, extract_reference, fetch_manifest, render_link, upload_file, Layout,
    ProgressFn, TransferOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sealdrop",
    version,
    about = "Encrypted, chunked file drops",
    long_about = "sealdrop: encrypt files client-side, split them into verifiable pieces, \
                  and share them through a Swarm gateway or S3-compatible bucket"
)]
struct Cli {
    /// Path to sealdrop configuration file
    #[arg(
        long,
        short = 'c',
        env = "SEALDROP_CONFIG",
        default_value = "~/.config/sealdrop/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "SEALDROP_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "SEALDROP_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a file and print its manifest reference and download link
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Encrypt before upload (overrides transfer.encrypt_default)
        #[arg(long, conflicts_with = "no_encrypt")]
        encrypt: bool,
        /// Upload in the clear (overrides transfer.encrypt_default)
        #[arg(long)]
        no_encrypt: bool,
        /// Split threshold and piece size in MiB (overrides transfer.chunk_size_mb)
        #[arg(long)]
        chunk_size_mb: Option<usize>,
        /// Concurrent piece uploads (overrides transfer.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Download a transfer by manifest reference or download link
    Download {
        /// Manifest reference, or a link containing `download=<reference>`
        reference: String,
        /// Output directory (default: transfer.download_dir)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Concurrent piece downloads (overrides transfer.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show a manifest without downloading any data
    Inspect {
        /// Manifest reference, or a link containing `download=<reference>`
        reference: String,
    },

    /// Check that the configured storage backend is reachable
    Health,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = SealConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "sealdrop starting"
    );

    match cli.command {
        Commands::Upload {
            file,
            encrypt,
            no_encrypt,
            chunk_size_mb,
            concurrency,
        } => {
            let encrypt = match (encrypt, no_encrypt) {
                (true, _) => true,
                (_, true) => false,
                _ => config.transfer.encrypt_default,
            };
            cmd_upload(&config, &file, encrypt, chunk_size_mb, concurrency).await
        }
        Commands::Download {
            reference,
            out,
            concurrency,
        } => cmd_download(&config, &reference, out.as_deref(), concurrency).await,
        Commands::Inspect { reference } => cmd_inspect(&config, &reference).await,
        Commands::Health => cmd_health(&config).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays clean for references and links
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Storage backend ───────────────────────────────────────────────────────────

/// Build the configured object store.
///
/// S3 credentials come from AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY
/// (or the SEALDROP_-prefixed equivalents); Swarm needs none.
fn build_store(config: &SealConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.storage.backend {
        Backend::Swarm => {
            let store =
                SwarmStore::from_config(&config.storage).context("building swarm client")?;
            Ok(Arc::new(store))
        }
        Backend::S3 => {
            let creds = s3_credentials_from_env()?;
            let store = build_from_config(&config.storage, &creds)
                .context("building storage operator")?;
            Ok(Arc::new(store))
        }
    }
}

fn s3_credentials_from_env() -> Result<S3Credentials> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
        .or_else(|_| std::env::var("SEALDROP_ACCESS_KEY_ID"))
        .context(
            "S3 credentials not set\n\
             Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.\n\
             Example:\n\
             \texport AWS_ACCESS_KEY_ID=your-key\n\
             \texport AWS_SECRET_ACCESS_KEY=your-secret",
        )?;
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .or_else(|_| std::env::var("SEALDROP_SECRET_ACCESS_KEY"))
        .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;

    Ok(S3Credentials {
        access_key_id,
        secret_access_key,
    })
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

/// Accept a bare manifest reference or a download link.
fn resolve_reference(input: &str) -> Result<String> {
    let reference = extract_reference(input)
        .with_context(|| format!("no manifest reference found in {input:?}"))?;
    if reference != input.trim() {
        println!("Extracted reference from link: {reference}");
    }
    Ok(reference)
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

const BAR_TEMPLATE: &str = "{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_callback(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

// ── `sealdrop upload` ─────────────────────────────────────────────────────────

async fn cmd_upload(
    config: &SealConfig,
    file: &Path,
    encrypt: bool,
    chunk_size_mb: Option<usize>,
    concurrency: Option<usize>,
) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("not a file: {}", file.display());
    }

    let mut transfer = config.transfer.clone();
    if let Some(mb) = chunk_size_mb {
        if mb == 0 {
            anyhow::bail!("--chunk-size-mb must be greater than 0");
        }
        transfer.chunk_size_mb = mb;
    }
    if let Some(n) = concurrency {
        transfer.concurrency = n;
    }
    let opts = TransferOptions {
        encrypt,
        ..TransferOptions::from_config(&transfer)
    };

    let store = build_store(config)?;
    let pb = make_progress_bar("upload");
    let progress = progress_callback(&pb);

    let started = Instant::now();
    let result = upload_file(&store, file, &opts, Some(&progress))
        .await
        .with_context(|| format!("uploading: {}", file.display()));
    let elapsed = started.elapsed();

    let outcome = match result {
        Ok(outcome) => {
            pb.finish_with_message("done");
            outcome
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e);
        }
    };

    println!("Uploaded: {}", file.display());
    println!("  manifest:  {}", outcome.manifest_ref);
    println!("  encrypted: {}", outcome.manifest.is_encrypted());
    println!("  chunked:   {}", outcome.manifest.is_chunked());
    println!("  pieces:    {}", outcome.pieces);
    println!("  size:      {}", fmt_bytes(outcome.bytes));
    println!("  stored:    {}", fmt_bytes(outcome.stored_bytes));
    println!("  time:      {}", fmt_duration(elapsed));
    println!("  speed:     {}", fmt_speed(outcome.bytes, elapsed));
    println!();
    println!("Download link:");
    println!(
        "{}",
        render_link(&config.transfer.download_link, &outcome.manifest_ref)
    );

    Ok(())
}

// ── `sealdrop download` ───────────────────────────────────────────────────────

async fn cmd_download(
    config: &SealConfig,
    input: &str,
    out: Option<&Path>,
    concurrency: Option<usize>,
) -> Result<()> {
    let reference = resolve_reference(input)?;
    let dir = expand_tilde(out.unwrap_or(config.transfer.download_dir.as_path()));

    let mut opts = TransferOptions::from_config(&config.transfer);
    if let Some(n) = concurrency {
        opts.concurrency = n.max(1);
    }

    let store = build_store(config)?;
    let pb = make_progress_bar("download");
    let progress = progress_callback(&pb);

    let started = Instant::now();
    let result = download_to_dir(&store, &reference, &dir, &opts, Some(&progress))
        .await
        .with_context(|| format!("downloading manifest {reference}"));
    let elapsed = started.elapsed();

    let saved = match result {
        Ok(saved) => {
            pb.finish_with_message("verified");
            saved
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e);
        }
    };

    println!("Downloaded: {}", saved.manifest.filename());
    println!("  saved to:  {}", saved.path.display());
    println!("  encrypted: {}", saved.manifest.is_encrypted());
    println!("  pieces:    {}", saved.manifest.piece_count());
    println!("  size:      {}", fmt_bytes(saved.bytes));
    println!("  time:      {}", fmt_duration(elapsed));
    println!("  speed:     {}", fmt_speed(saved.bytes, elapsed));

    Ok(())
}

// ── `sealdrop inspect` ────────────────────────────────────────────────────────

async fn cmd_inspect(config: &SealConfig, input: &str) -> Result<()> {
    let reference = resolve_reference(input)?;
    let store = build_store(config)?;

    let manifest = fetch_manifest(&store, &reference).await?;

    println!("Manifest: {reference}");
    println!("  filename:  {}", manifest.filename());
    println!("  encrypted: {}", manifest.is_encrypted());
    println!("  chunked:   {}", manifest.is_chunked());
    println!("  pieces:    {}", manifest.piece_count());

    match manifest.layout() {
        Layout::Single { file_id, file_hash } => {
            println!("  file:      {file_id}");
            println!("  sha256:    {file_hash}");
        }
        Layout::Chunked {
            chunk_ids,
            chunk_hashes,
        } => {
            for (id, piece_ref) in chunk_ids {
                let digest = chunk_hashes
                    .get(id)
                    .map(|d| d.to_hex())
                    .unwrap_or_default();
                println!("  [{id:>4}] {piece_ref}  sha256:{digest}");
            }
        }
    }

    Ok(())
}

// ── `sealdrop health` ─────────────────────────────────────────────────────────

async fn cmd_health(config: &SealConfig) -> Result<()> {
    let store = build_store(config)?;
    check_health(store.as_ref())
        .await
        .with_context(|| format!("{} is not reachable", store.describe()))?;
    println!("ok: {}", store.describe());
    Ok(())
}

// ── `sealdrop config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &SealConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = config.to_toml().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Formatting ────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn fmt_speed(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "n/a".to_string();
    }
    format!("{}/s", fmt_bytes((bytes as f64 / secs) as u64))
}

fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs >= 1 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{}ms", d.as_millis())
    }
}
