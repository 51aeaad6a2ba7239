//! Globsync: copy files matching globs into a build output directory.
//!
//! # Usage
//!
//! ```text
//! globsync init [--force]
//! globsync sync [PATTERNS..] [--config FILE] [--dir DIR] [--dest DIR]
//!               [--no-clean | --clean-glob GLOB..] [--watch]
//!               [--manifest-file NAME] [--verbose] [--loglevel LEVEL]
//!               [--json-logs] [--json] [--dry-run]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{init::InitArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "globsync",
    version,
    about = "Copy files matching glob patterns into a destination and keep it in sync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter globsync.yaml in the current directory.
    Init(InitArgs),

    /// Copy matching files into the destination, optionally watching for changes.
    Sync(SyncArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
    }
}
