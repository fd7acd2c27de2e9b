//! # lab2hub CLI
//!
//! This is the binary entry point for the `lab2hub` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Turning run-level failures into a non-zero exit code.
//!
//! The reconciliation logic lives in the `lab2hub` library crate; the binary
//! is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
