//! # Error Handling
//!
//! This module defines the centralized error type for `lab2hub`. It uses the
//! `thiserror` library to describe every anticipated failure mode with enough
//! context (repository name, stage, underlying cause) to diagnose a failed
//! run without rerunning it at a higher verbosity.
//!
//! ## Fatal vs. per-repository errors
//!
//! Only a few variants abort a run:
//!
//! - `InventoryFetch`: a forge could not be enumerated. Mirroring against an
//!   incomplete destination inventory would produce false "create" decisions.
//! - `Config`: the configuration is unusable.
//! - `StagingLocked`: another process owns the staging directory.
//!
//! Everything else (`Provision`, `Transport`, `Timeout`, `InvalidName`) is
//! isolated to the repository it happened for. The reconciler records it as a
//! failed outcome and moves on. [`Error::is_fatal`] encodes this split.

use thiserror::Error;

/// Main error type for lab2hub operations
#[derive(Error, Debug)]
pub enum Error {
    /// A forge could not be enumerated (network, auth or decode failure).
    #[error("Inventory fetch error for {forge}: {message}")]
    InventoryFetch { forge: String, message: String },

    /// A destination repository could not be created.
    #[error("Provision error for {name}: {message}")]
    Provision { name: String, message: String },

    /// A git clone, fetch or push failed.
    #[error("Transport error for {name} during {stage}: {message}")]
    Transport {
        name: String,
        stage: String,
        message: String,
    },

    /// A git operation exceeded its deadline and was killed.
    #[error("Timed out after {seconds}s while running {stage} for {name}")]
    Timeout {
        name: String,
        stage: String,
        seconds: u64,
    },

    /// A derived repository name is empty or cannot be used on disk.
    #[error("Invalid repository name {name:?}: {message}")]
    InvalidName { name: String, message: String },

    /// The configuration is incomplete or contradictory.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Another process holds the staging directory lock.
    #[error("Staging directory {path} is locked by another lab2hub process")]
    StagingLocked { path: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Returns true for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InventoryFetch { .. }
                | Error::Config { .. }
                | Error::StagingLocked { .. }
                | Error::Yaml(_)
                | Error::UrlParse(_)
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
