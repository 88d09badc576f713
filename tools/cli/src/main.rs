//! Forager CLI - Command line access to any supported storage backend.
//!
//! Paths carry their backend as a protocol prefix, so the same commands work
//! on local files, S3 buckets, Dropbox and HTTP(S) endpoints.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use forager_common::ByteRange;
use forager_storage::{Forager, ForagerConfig, ReadOptions};

#[derive(Parser)]
#[command(name = "forager")]
#[command(about = "Forager - Uniform access to local, object and cloud storage")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: the user config directory, then the
    /// environment).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file to stdout.
    Cat {
        /// Path to read, e.g. s3://bucket/key.
        path: String,

        /// Byte range in header form, e.g. "bytes=0-99".
        #[arg(short, long)]
        range: Option<String>,
    },

    /// Write a file from an argument or stdin.
    Write {
        /// Path to write.
        path: String,

        /// Content to write. Stdin is used when absent.
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Copy a file, possibly across backends.
    Cp {
        /// Source path.
        input: String,

        /// Destination path.
        output: String,
    },

    /// List a directory.
    Ls {
        /// Directory to list.
        dir: String,

        /// List files in all subdirectories.
        #[arg(short, long)]
        recursive: bool,

        /// Print the listing as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Remove a file.
    Rm {
        /// Path to remove.
        path: String,
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
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config =
        ForagerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let forager = Forager::new(config);

    match cli.command {
        Commands::Cat { path, range } => cmd_cat(&forager, &path, range.as_deref()).await,
        Commands::Write { path, data } => cmd_write(&forager, &path, data).await,
        Commands::Cp { input, output } => cmd_cp(&forager, &input, &output).await,
        Commands::Ls {
            dir,
            recursive,
            json,
        } => cmd_ls(&forager, &dir, recursive, json).await,
        Commands::Rm { path } => cmd_rm(&forager, &path).await,
    }
}

async fn cmd_cat(forager: &Forager, path: &str, range: Option<&str>) -> Result<()> {
    let options = match range {
        Some(header) => ReadOptions {
            range: Some(ByteRange::from_header_value(header).context("Invalid range")?),
        },
        None => ReadOptions::default(),
    };

    let mut stream = forager
        .create_read_stream_with(path, options)
        .await
        .with_context(|| format!("Failed to open {}", path))?;

    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("Failed to read {}", path))?;
        stdout.write_all(&chunk).await.context("Failed to write to stdout")?;
    }
    stdout.flush().await.context("Failed to write to stdout")?;

    Ok(())
}

async fn cmd_write(forager: &Forager, path: &str, data: Option<String>) -> Result<()> {
    let content = match data {
        Some(text) => text.into_bytes(),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read stdin")?;
            buf
        }
    };

    let size = content.len();
    forager
        .write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path))?;

    info!("Wrote {} ({} bytes)", path, size);
    Ok(())
}

async fn cmd_cp(forager: &Forager, input: &str, output: &str) -> Result<()> {
    forager
        .copy_file(input, output)
        .await
        .with_context(|| format!("Failed to copy {} to {}", input, output))?;

    info!("Copied {} to {}", input, output);
    Ok(())
}

async fn cmd_ls(forager: &Forager, dir: &str, recursive: bool, json: bool) -> Result<()> {
    let contents = forager
        .list(dir, recursive)
        .await
        .with_context(|| format!("Failed to list {}", dir))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&contents)?);
        return Ok(());
    }

    if contents.is_empty() {
        println!("Directory is empty.");
    } else {
        println!("Contents of {}:", dir);
        for item in contents {
            if item.is_directory() {
                println!("  [DIR]  {}/", item.path);
            } else {
                let size_str = item.size.map(|s| format!("{} bytes", s)).unwrap_or_default();
                println!("  [FILE] {} ({})", item.path, size_str);
            }
        }
    }

    Ok(())
}

async fn cmd_rm(forager: &Forager, path: &str) -> Result<()> {
    forager
        .remove(path)
        .await
        .with_context(|| format!("Failed to remove {}", path))?;

    info!("Removed {}", path);
    Ok(())
}
