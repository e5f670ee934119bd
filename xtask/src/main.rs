// Desktop/tooling crate — unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::indexing_slicing)]

mod check;
mod stamp;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Bootloader development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stamp an application binary with its metadata header (magic, CRC32,
    /// length, version), producing a blob ready to flash at the
    /// application region base
    Stamp {
        /// Raw application image (the bytes that land after the header)
        input: std::path::PathBuf,
        /// Output path; defaults to the input with a .stamped.bin suffix
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
        /// Version string recorded in the header, up to 8 bytes
        #[arg(short, long, default_value = "dev")]
        version: String,
    },
    /// Check the workspace: host build, clippy, formatting
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stamp {
            input,
            output,
            version,
        } => stamp::run(&input, output.as_deref(), &version),
        Commands::Check => check::run(),
    }
}
