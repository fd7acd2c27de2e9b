//! # CLI Command Implementations
//!
//! Each subcommand of `lab2hub` lives in its own file with:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and calls into the
//!   `lab2hub` library.

pub mod completions;
pub mod sync;
