//! Image cache operator tool
//!
//! Inspects and edits an on-disk image cache store: print statistics, read,
//! write or invalidate single entries.

use clap::{Args, Parser, Subcommand};
use image_cache::{load_config, CacheSession, ImageCacheError, LogicalKey, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "image-cache", version, about = "Inspect and edit an image cache store")]
struct Cli {
    /// Store directory, overriding IMAGE_CACHE_DIR
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print store statistics as JSON
    Stats,
    /// Write the payload stored for a key
    Get {
        #[command(flatten)]
        key: KeyArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Store a file's contents under a key
    Put {
        #[command(flatten)]
        key: KeyArgs,

        #[arg(short, long)]
        input: PathBuf,
    },
    /// Remove the entry for a key
    Invalidate {
        #[command(flatten)]
        key: KeyArgs,
    },
}

#[derive(Args)]
struct KeyArgs {
    /// Source identity, e.g. a media path
    #[arg(long)]
    identity: String,

    /// Source modification time
    #[arg(long, allow_hyphen_values = true)]
    modified_at: i64,

    /// Artifact variant
    #[arg(long, default_value = "1")]
    kind: i32,
}

impl From<KeyArgs> for LogicalKey {
    fn from(args: KeyArgs) -> Self {
        LogicalKey::new(args.identity, args.modified_at, args.kind)
    }
}

fn main() -> Result<ExitCode> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("image_cache=info".parse()?)
        .add_directive("fingerprint_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    };

    let cli = Cli::parse();

    let mut config = load_config();
    if let Some(dir) = cli.dir {
        config.dir = dir;
    }
    info!("Cache dir: {:?}", config.dir);
    info!(
        "Max cache size: {} entries, {} MB",
        config.max_entries,
        config.max_bytes / (1024 * 1024)
    );

    let session = CacheSession::open(config)?;
    if !session.is_open() {
        return Err(ImageCacheError::Config(
            "cache store could not be opened".to_string(),
        ));
    }

    let code = match cli.command {
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&session.stats())?);
            ExitCode::SUCCESS
        }
        Command::Get { key, out } => {
            let key = LogicalKey::from(key);
            match session.get(&key) {
                Some(payload) => {
                    match out {
                        Some(path) => std::fs::write(path, &payload)?,
                        None => std::io::stdout().write_all(&payload)?,
                    }
                    ExitCode::SUCCESS
                }
                None => {
                    info!(identity = %key.identity, "Not cached");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Put { key, input } => {
            let payload = std::fs::read(&input)?;
            session.put(&LogicalKey::from(key), &payload);
            session.flush();
            ExitCode::SUCCESS
        }
        Command::Invalidate { key } => {
            session.invalidate(&LogicalKey::from(key));
            session.flush();
            ExitCode::SUCCESS
        }
    };

    session.close();
    Ok(code)
}
