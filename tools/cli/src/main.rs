//! Sealpost CLI - Command line interface for encrypted document upload.
//!
//! This tool encrypts a PDF locally, uploads it to the summarization
//! backend, and follows the streamed progress until the summary and PHI
//! verification report arrive.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;

use sealpost_client::{
    format_elapsed, seal, EnvelopeFormat, Phase, StaticToken, UploadConfig, UploadSession,
};
use sealpost_common::{AuthToken, Document, MediaType};

#[derive(Parser)]
#[command(name = "sealpost")]
#[command(about = "Sealpost - Encrypted document upload with streamed summaries")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt and upload a PDF, then wait for the summary.
    Upload {
        /// PDF file to upload.
        #[arg(short, long)]
        file: PathBuf,

        /// Upload endpoint URL.
        #[arg(short, long)]
        endpoint: Url,

        /// Bearer token (falls back to the SEALPOST_TOKEN environment variable).
        #[arg(short, long)]
        token: Option<String>,

        /// Send the document as raw base64 instead of a pre-encrypted envelope.
        #[arg(long)]
        raw: bool,
    },

    /// Encrypt a file locally and print the envelope JSON to stdout.
    Encrypt {
        /// File to encrypt.
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Upload {
            file,
            endpoint,
            token,
            raw,
        } => cmd_upload(&file, endpoint, token, raw).await,

        Commands::Encrypt { file } => cmd_encrypt(&file),
    }
}

/// Resolve the bearer token from the flag or the environment.
fn resolve_token(flag: Option<String>) -> Result<AuthToken> {
    let value = match flag {
        Some(value) => value,
        None => std::env::var("SEALPOST_TOKEN")
            .context("No token given and SEALPOST_TOKEN is not set")?,
    };
    AuthToken::new(value).context("Token must not be empty")
}

/// Read a PDF document from disk.
fn read_document(path: &PathBuf) -> Result<Document> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Document::new(bytes, MediaType::pdf()).context("Invalid document")
}

/// Encrypt and upload a document, following progress until the summary.
async fn cmd_upload(
    file: &PathBuf,
    endpoint: Url,
    token: Option<String>,
    raw: bool,
) -> Result<()> {
    let token = resolve_token(token)?;
    let document = read_document(file)?;
    info!("Uploading {} ({} bytes)", file.display(), document.len());

    let format = if raw {
        EnvelopeFormat::RawBase64
    } else {
        EnvelopeFormat::PreEncrypted
    };
    let config = UploadConfig::new(endpoint).with_format(format);
    let session = UploadSession::new(config, Arc::new(StaticToken::new(token)));

    let handle = session.begin(document);
    let monitor = handle.monitor();

    // Mirror the streamed progress on stderr while waiting
    let progress = tokio::spawn(async move {
        let mut last = String::new();
        loop {
            let state = monitor.state().await;
            if state.phase.is_terminal() {
                break;
            }
            if state.phase == Phase::Uploading && state.last_progress != last {
                last = state.last_progress.clone();
                eprintln!("[{}] {}", format_elapsed(state.elapsed_seconds), last);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    });

    let outcome = handle.join().await.context("Upload failed")?;
    progress.abort();

    println!("REPORT SUMMARY");
    println!("{}", outcome.summary);
    if !outcome.phi_verification.is_empty() {
        println!();
        println!("PHI verification:");
        for (check, passed) in &outcome.phi_verification {
            println!("  {} {}", if *passed { "PASS" } else { "FAIL" }, check);
        }
    }
    println!();
    println!(
        "Processing completed in {}",
        format_elapsed(outcome.elapsed_seconds)
    );

    Ok(())
}

/// Encrypt a local file and print the envelope JSON.
fn cmd_encrypt(file: &PathBuf) -> Result<()> {
    let document = read_document(file)?;

    let sealed = seal(&document, EnvelopeFormat::PreEncrypted).context("Encryption failed")?;
    let json = serde_json::to_string_pretty(&sealed.envelope)?;
    println!("{}", json);

    Ok(())
}
