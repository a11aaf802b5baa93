//! assetpack
//!
//! Command-line access to asset packages

use anyhow::{bail, Context, Result};
use asset_pack::{list_entries, AssetVersion, PackageBuilder, PackageConfig, PackageStore};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "assetpack")]
#[command(about = "Create, inspect and extract binary asset packages")]
struct Args {
    /// Package base path (without .eph/.epb extension)
    #[arg(short = 'p', long)]
    package: PathBuf,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty package, truncating existing files
    Create,

    /// Add files to the package
    Add {
        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Asset key (single file only, defaults to the file name)
        #[arg(short = 'k', long)]
        key: Option<String>,

        /// Explicit version (defaults to the file's modification time)
        #[arg(short = 'v', long)]
        version: Option<u32>,
    },

    /// Extract an asset to a file, or to stdout
    Get {
        key: String,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// List assets
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show package summary
    Info,

    /// Logically remove assets
    Remove {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Reclaim unreferenced bundle space
    Compact,

    /// Check every asset's bounds, checksum and payload
    Verify,
}

fn open_store(args: &Args, config: PackageConfig) -> Result<PackageStore> {
    PackageBuilder::new()
        .path(&args.package)
        .config(config)
        .open()
        .with_context(|| format!("Failed to open package {:?}", args.package))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PackageConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => PackageConfig::default(),
    };

    match &args.command {
        Command::Create => {
            PackageBuilder::new()
                .path(&args.package)
                .config(config)
                .create()
                .with_context(|| format!("Failed to create package {:?}", args.package))?;
            info!("Created package {:?}", args.package);
        }

        Command::Add {
            files,
            key,
            version,
        } => {
            if key.is_some() && files.len() > 1 {
                bail!("--key can only be used with a single file");
            }
            let store = open_store(&args, config)?;
            let version = version.map_or(AssetVersion::FileTime, AssetVersion::Explicit);

            for file in files {
                let asset_key = match key {
                    Some(key) => key.clone(),
                    None => file
                        .file_name()
                        .and_then(|name| name.to_str())
                        .map(str::to_string)
                        .with_context(|| format!("No usable file name in {:?}", file))?,
                };
                let record = store
                    .add_asset_from_file(file, &asset_key, version)
                    .with_context(|| format!("Failed to add {:?} as {}", file, asset_key))?;
                println!(
                    "added {} ({} -> {} bytes)",
                    asset_key, record.original_size, record.compressed_size
                );
            }
        }

        Command::Get { key, output } => {
            let store = open_store(&args, config)?;
            match output {
                Some(path) => store
                    .get_asset_to_file(path, key)
                    .with_context(|| format!("Failed to extract {} to {:?}", key, path))?,
                None => {
                    let data = store
                        .get_asset_to_memory(key)
                        .with_context(|| format!("Failed to read {}", key))?;
                    std::io::stdout().write_all(&data)?;
                }
            }
        }

        Command::List { json } => {
            let store = open_store(&args, config)?;
            let entries = list_entries(&store);
            if *json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            for entry in entries {
                let when = entry
                    .timestamp
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| format!("v{}", entry.version));
                println!(
                    "{:>10} {:>10} {:>6.1}%  {:<16} {}",
                    entry.original_size,
                    entry.compressed_size,
                    entry.ratio() * 100.0,
                    when,
                    entry.key
                );
            }
        }

        Command::Info => {
            let store = open_store(&args, config)?;
            let header = store.metadata_header();
            let entries = list_entries(&store);
            let live: u64 = entries.iter().map(|e| e.compressed_size as u64).sum();
            let original: u64 = entries.iter().map(|e| e.original_size as u64).sum();
            let bundle_len = store.bundle_len()?;

            println!("format tag:      {}", header.format_tag);
            println!("assets:          {}", header.asset_count);
            println!("original bytes:  {}", original);
            println!("bundle bytes:    {}", bundle_len);
            println!("unreferenced:    {}", bundle_len.saturating_sub(live));
        }

        Command::Remove { keys } => {
            let store = open_store(&args, config)?;
            for key in keys {
                store
                    .remove_asset(key)
                    .with_context(|| format!("Failed to remove {}", key))?;
                println!("removed {}", key);
            }
        }

        Command::Compact => {
            let store = open_store(&args, config)?;
            let stats = store.compact().context("Compaction failed")?;
            println!(
                "compacted {} -> {} bytes ({} runs removed)",
                stats.bundle_len_before, stats.bundle_len_after, stats.runs_removed
            );
        }

        Command::Verify => {
            let store = open_store(&args, config)?;
            store.verify().context("Verification failed")?;
            println!("ok: {} assets verified", store.asset_count());
        }
    }

    Ok(())
}
