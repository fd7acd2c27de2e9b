//! # Terminal Output
//!
//! Decides whether the run summary uses emoji markers. No ANSI colors are
//! printed; the choice follows the usual color conventions, in order:
//! - `--color=always|never` on the command line
//! - `NO_COLOR` (any value, per https://no-color.org/)
//! - `CLICOLOR=0` and `CLICOLOR_FORCE=1`
//! - `TERM=dumb`
//! - whether stdout is a terminal
//!
//! When emoji are off, plain markers such as `[FAILED]` stand in for them.

use std::env;

/// Output configuration for the run summary.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Emoji markers when true, plain `[MARKER]` text otherwise.
    pub use_emoji: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and the `--color` flag.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_emoji = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_terminal_support(),
        };

        Self { use_emoji }
    }

    fn detect_terminal_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_emoji() -> Self {
        Self { use_emoji: true }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        Self { use_emoji: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Pick the emoji or the plain marker according to `config`.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_emoji {
        emoji_str
    } else {
        plain
    }
}
