//! filedict CLI
//!
//! Command-line tools for inspecting, merging and editing filedict stores.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use filedict::{Config, FileDict, MergeStats, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// filedict CLI
#[derive(Parser, Debug)]
#[command(name = "filedict")]
#[command(about = "Tools for memory-mapped filedict stores")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print byte fill ratio and per-generation bucket usage
    Stats {
        /// Store files to analyse
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Copy every key/value of the source stores into the destination
    Merge {
        /// Destination store (created if missing)
        dest: PathBuf,

        /// Source stores, opened read-only
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Bucket count if the destination has to be created
        #[arg(short, long, default_value = "4096")]
        buckets: u32,
    },

    /// Print the bucket/entry/value nesting of every occupied slot
    Dump {
        /// Store files to dump
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Insert a value under a key
    Insert {
        file: PathBuf,
        key: String,
        value: String,

        /// Skip the insert if the key already holds this value
        #[arg(short, long)]
        unique: bool,

        /// Bucket count if the store has to be created
        #[arg(short, long, default_value = "4096")]
        buckets: u32,
    },

    /// Print every value stored under a key
    Get { file: PathBuf, key: String },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,filedict=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Stats { files } => {
            for (i, file) in files.iter().enumerate() {
                let dict = FileDict::open_readonly(file, Config::default())?;
                if i > 0 {
                    println!("\n");
                }
                print!("{}", dict.stats()?);
                dict.close()?;
            }
        }

        Commands::Merge {
            dest,
            sources,
            buckets,
        } => {
            let config = Config::builder().initial_bucket_count(buckets).build();
            let destination = FileDict::open(&dest, config)?;
            let mut total = MergeStats::default();
            for source in &sources {
                let source = FileDict::open_readonly(source, Config::default())?;
                total += destination.merge_from(&source)?;
                source.close()?;
            }
            destination.close()?;
            println!(
                "merged {} values ({} inserted, {} duplicates skipped, {} oversized skipped, {} keys truncated)",
                total.values_seen,
                total.values_inserted,
                total.duplicates_skipped,
                total.oversized_skipped,
                total.keys_truncated
            );
        }

        Commands::Dump { files } => {
            for file in &files {
                let dict = FileDict::open_readonly(file, Config::default())?;
                dump(&dict)?;
                dict.close()?;
            }
        }

        Commands::Insert {
            file,
            key,
            value,
            unique,
            buckets,
        } => {
            let config = Config::builder().initial_bucket_count(buckets).build();
            let dict = FileDict::open(&file, config)?;
            let outcome = if unique {
                dict.insert_unique(&key, &value)?
            } else {
                dict.insert(&key, &value)?
            };
            match outcome.generation() {
                Some(generation) => println!("stored in generation {}", generation),
                None => println!("already present"),
            }
            dict.close()?;
        }

        Commands::Get { file, key } => {
            let dict = FileDict::open_readonly(&file, Config::default())?;
            for value in dict.values(&key)? {
                println!("{}", value?);
            }
            dict.close()?;
        }
    }
    Ok(())
}

/// Print one store as nested generation/bucket/entry/value blocks
fn dump(dict: &FileDict) -> Result<()> {
    println!("--- {} ---", dict.path().display());

    let mut last_bucket: Option<(u32, u32)> = None;
    for entry in dict.entries() {
        let entry = entry?;
        if last_bucket != Some((entry.generation, entry.bucket)) {
            if last_bucket.is_some() {
                println!();
            }
            println!(
                "================= GENERATION {} BUCKET {} ================",
                entry.generation, entry.bucket
            );
            last_bucket = Some((entry.generation, entry.bucket));
        }
        println!("---------------- ENTRY {} ----------------", entry.slot);
        println!("\"{}\":", entry.key_lossy());
        for value in entry.values_lossy() {
            println!("    {}", value);
        }
    }
    Ok(())
}
