///
/// This module implements the full CLI interface for imgsync—handling command
/// parsing, argument validation, main entrypoints, and user-visible invocations.
///
/// All core business logic (inventories, planning, manifests) lives in the
/// [`imgsync-core`] crate. This module is strictly for CLI glue, ergonomic
/// argument exposure, and orchestration.
///
/// ## Features
/// - Entry struct [`Cli`] defines all user-facing options and subcommands (see below).
/// - Subcommand routing (`sync`, `upload`, `check`) and argument validation.
/// - Async entrypoint (`run`) for programmatic invocation and integration testing.
/// - Logging, tracing, and structured error output at CLI level.
///
/// ## How To Use
/// - For command-line users: use the installed `imgsync` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// ## Extending
/// When adding features or subcommands, update [`Commands`] below
/// and keep all non-trivial business logic inside `imgsync-core`.
///
/// ---
///
/// [`Cli`]: struct.Cli.html
/// [`run`]: fn.run.html
/// [`Commands`]: enum.Commands.html
use crate::load_config::load_config;
use crate::report::{render_flat_summary, render_summary};
use crate::storage::BucketClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imgsync_core::flat::synchronise_flat;
use imgsync_core::synchronise::{synchronise, SyncOptions};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// CLI for imgsync: publish local image assets and the URL manifest apps
/// embed to reach them.
#[derive(Parser)]
#[clap(
    name = "imgsync",
    version,
    about = "Upload local image assets to a public bucket and emit a URL manifest"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronise every local image asset to the bucket using the given config file
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Treat the assets directory as one flat folder instead of a tree
        #[clap(long)]
        flat: bool,
        /// Uploads in flight at once
        #[clap(long, default_value_t = 1)]
        concurrency: usize,
    },
    /// Upload a single file and print its public URL
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Destination key, e.g. images/backgrounds/login_bg.png
        #[clap(long)]
        dest: Option<String>,
    },
    /// List what the bucket currently holds under a prefix
    Check {
        /// Key prefix to list
        #[clap(long, default_value = "images")]
        prefix: String,
        /// Also print the public URL of each object
        #[clap(long)]
        urls: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            flat,
            concurrency,
        } => run_sync(config, flat, concurrency, cancel).await,
        Commands::Upload { file, dest } => run_upload(file, dest).await,
        Commands::Check { prefix, urls } => run_check(prefix, urls).await,
    }
}

async fn run_sync(
    config_path: PathBuf,
    flat: bool,
    concurrency: usize,
    cancel: CancellationToken,
) -> Result<()> {
    let config = load_config(config_path)?;
    tracing::info!(
        command = "sync",
        bucket = %config.bucket,
        flat,
        concurrency,
        "Starting synchronisation process"
    );
    let store = BucketClient::from_env_for_bucket(&config.bucket)
        .context("Failed to construct bucket client from environment")?;
    let manifest_path = config.manifest_path_for(flat);
    let options = SyncOptions {
        concurrency,
        cancel,
    };

    if flat {
        match synchronise_flat(&store, &config.sync, &options).await {
            Ok(report) => {
                print!("{}", report.manifest.to_code_fragment());
                println!();
                print!("{}", render_flat_summary(&report, &manifest_path));
                report.manifest.write_json(&manifest_path)?;
                tracing::info!(
                    command = "sync",
                    uploaded = report.uploaded_count(),
                    failed = report.failed_count(),
                    "Synchronisation complete"
                );
                conclude(report.failed_count(), report.cancelled)
            }
            Err(e) => {
                tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                Err(e.into())
            }
        }
    } else {
        match synchronise(&store, &config.sync, &options).await {
            Ok(report) => {
                // The fragment and summary print before the manifest is
                // persisted; a failed write still leaves them on stdout.
                print!("{}", report.manifest.to_code_fragment());
                println!();
                print!("{}", report.manifest.to_helper_fragment());
                print!("{}", render_summary(&report, &manifest_path));
                report.manifest.write_json(&manifest_path)?;
                tracing::info!(
                    command = "sync",
                    uploaded = report.uploaded_count(),
                    failed = report.failed_count(),
                    "Synchronisation complete"
                );
                conclude(report.failed_count(), report.cancelled)
            }
            Err(e) => {
                tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                Err(e.into())
            }
        }
    }
}

/// A run that uploaded everything still exits non-zero when assets failed or
/// the run was interrupted, so CI pipelines notice.
fn conclude(failed: usize, cancelled: bool) -> Result<()> {
    if failed > 0 {
        anyhow::bail!("{failed} uploads failed");
    }
    if cancelled {
        anyhow::bail!("run cancelled before completion");
    }
    Ok(())
}

async fn run_upload(file: PathBuf, dest: Option<String>) -> Result<()> {
    let store =
        BucketClient::from_env().context("Failed to construct bucket client from environment")?;
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("{file:?} has no usable file name"))?;
    let key = dest.unwrap_or_else(|| format!("images/backgrounds/{file_name}"));
    tracing::info!(command = "upload", file = ?file, key = %key, "Uploading single file");
    let stored = store.upload_file(&file, &key).await?;
    println!("Uploaded {} to {}", file.display(), stored.key);
    println!("Public URL: {}", stored.public_url);
    Ok(())
}

async fn run_check(prefix: String, urls: bool) -> Result<()> {
    let store =
        BucketClient::from_env().context("Failed to construct bucket client from environment")?;
    tracing::info!(command = "check", prefix = %prefix, "Listing bucket contents");
    let keys = store.list_objects(&prefix).await?;
    for key in &keys {
        if urls {
            println!("{key}  {}", store.public_url(key));
        } else {
            println!("{key}");
        }
    }
    println!("{} objects under {:?}", keys.len(), prefix);
    Ok(())
}
