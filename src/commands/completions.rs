//! # Completions Command
//!
//! Prints a shell completion script for `lab2hub` to stdout.
//!
//! ```bash
//! lab2hub completions bash > ~/.local/share/bash-completion/completions/lab2hub
//! lab2hub completions zsh > ~/.zfunc/_lab2hub
//! ```

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use std::io;

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the `completions` command.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "lab2hub", &mut io::stdout());
    Ok(())
}
