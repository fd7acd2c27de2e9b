//! # Run Configuration
//!
//! This module defines [`Config`], the single explicit configuration value
//! handed to every component, and the optional YAML file that can seed it.
//!
//! ## Sources
//!
//! Settings are layered, lowest precedence first:
//!
//! 1.  Built-in defaults ([`Config::default`]).
//! 2.  An optional YAML file ([`from_file`] / [`parse`]), applied with
//!     [`Config::apply_file`].
//! 3.  Environment variables and command-line flags, applied by the CLI.
//!
//! Credentials are deliberately absent from the YAML schema. They are only
//! read from `GITLAB_TOKEN` and `GITHUB_TOKEN` ([`Config::load_tokens_from_env`])
//! and are held in [`Secret`], which never prints its contents.
//!
//! ## Example
//!
//! ```yaml
//! source_url: https://git.neuf.no
//! source_group_id: "5"
//! destination_org: edb-gjengen
//! staging_root: /var/lib/lab2hub/repos
//! jobs: 4
//! timeout_secs: 1800
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Environment variable holding the source forge token.
pub const SOURCE_TOKEN_ENV: &str = "GITLAB_TOKEN";

/// Environment variable holding the destination forge token.
pub const DESTINATION_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// A credential that is never logged.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(Option<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self(None)
        } else {
            Self(Some(value))
        }
    }

    pub fn none() -> Self {
        Self(None)
    }

    /// The raw credential, for building request headers only.
    pub fn expose(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Secret(***)"),
            None => f.write_str("Secret(<unset>)"),
        }
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("***"),
            None => f.write_str("<unset>"),
        }
    }
}

/// Everything one reconciliation pass needs to know.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the source forge, e.g. `https://git.neuf.no`.
    pub source_url: String,
    /// Numeric id or full path of the source group.
    pub source_group_id: String,
    /// Destination organization login.
    pub destination_org: String,
    /// Base URL of the destination forge REST API.
    pub destination_api_url: String,
    /// Directory holding one bare mirror per repository.
    pub staging_root: PathBuf,
    pub source_token: Secret,
    pub destination_token: Secret,
    /// Inspect and report only; never provision or transfer.
    pub dry_run: bool,
    /// Exit non-zero when any repository failed.
    pub fail_on_error: bool,
    /// Stop the run at the first failed repository creation.
    pub abort_on_provision_error: bool,
    /// Maximum number of repositories processed at once.
    pub jobs: usize,
    /// Deadline shared by all git operations for one repository.
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: "https://git.neuf.no".to_string(),
            source_group_id: "5".to_string(),
            destination_org: "edb-gjengen".to_string(),
            destination_api_url: "https://api.github.com".to_string(),
            staging_root: PathBuf::from("repos"),
            source_token: Secret::none(),
            destination_token: Secret::none(),
            dry_run: false,
            fail_on_error: false,
            abort_on_provision_error: false,
            jobs: 1,
            timeout: Duration::from_secs(3600),
        }
    }
}

/// On-disk configuration file schema.
///
/// Every field is optional; absent fields keep the value from the layer
/// below. Unknown keys are rejected so that typos (and attempts to put
/// tokens in the file) are reported instead of silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub source_url: Option<String>,
    pub source_group_id: Option<GroupId>,
    pub destination_org: Option<String>,
    pub destination_api_url: Option<String>,
    pub staging_root: Option<PathBuf>,
    pub fail_on_error: Option<bool>,
    pub abort_on_provision_error: Option<bool>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Group identifiers may be written as numbers or as namespace paths.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum GroupId {
    Numeric(u64),
    Path(String),
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Numeric(id) => write!(f, "{}", id),
            GroupId::Path(path) => f.write_str(path),
        }
    }
}

/// Parse a YAML configuration string.
pub fn parse(yaml: &str) -> Result<ConfigFile> {
    if yaml.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Read and parse a YAML configuration file.
pub fn from_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("cannot read {}: {}", path.display(), e),
        hint: None,
    })?;
    parse(&content)
}

impl Config {
    /// Overlay the values present in `file`.
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.source_url {
            self.source_url = v;
        }
        if let Some(v) = file.source_group_id {
            self.source_group_id = v.to_string();
        }
        if let Some(v) = file.destination_org {
            self.destination_org = v;
        }
        if let Some(v) = file.destination_api_url {
            self.destination_api_url = v;
        }
        if let Some(v) = file.staging_root {
            self.staging_root = v;
        }
        if let Some(v) = file.fail_on_error {
            self.fail_on_error = v;
        }
        if let Some(v) = file.abort_on_provision_error {
            self.abort_on_provision_error = v;
        }
        if let Some(v) = file.jobs {
            self.jobs = v;
        }
        if let Some(v) = file.timeout_secs {
            self.timeout = Duration::from_secs(v);
        }
    }

    /// Read both tokens from the process environment.
    ///
    /// Unset or empty variables leave the corresponding token unset.
    pub fn load_tokens_from_env(&mut self) {
        self.source_token = Secret::new(std::env::var(SOURCE_TOKEN_ENV).unwrap_or_default());
        self.destination_token =
            Secret::new(std::env::var(DESTINATION_TOKEN_ENV).unwrap_or_default());
    }

    /// Check the configuration before anything touches the network.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("source_url", &self.source_url),
            ("destination_api_url", &self.destination_api_url),
        ] {
            let url = Url::parse(value)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config {
                    message: format!("{} must be an http(s) URL, got '{}'", field, value),
                    hint: None,
                });
            }
        }

        if self.source_group_id.trim().is_empty() {
            return Err(Error::Config {
                message: "source_group_id is empty".to_string(),
                hint: Some("pass --gitlab-group-id or set it in the config file".to_string()),
            });
        }

        if self.destination_org.trim().is_empty() {
            return Err(Error::Config {
                message: "destination_org is empty".to_string(),
                hint: Some("pass --github-org-name or set it in the config file".to_string()),
            });
        }

        if self.jobs == 0 {
            return Err(Error::Config {
                message: "jobs must be at least 1".to_string(),
                hint: None,
            });
        }

        if self.timeout.is_zero() {
            return Err(Error::Config {
                message: "timeout must be greater than zero".to_string(),
                hint: None,
            });
        }

        if !self.dry_run && !self.destination_token.is_set() {
            return Err(Error::Config {
                message: "a destination token is required to create and push repositories"
                    .to_string(),
                hint: Some(format!(
                    "export {} or put it in a .env file",
                    DESTINATION_TOKEN_ENV
                )),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> Config {
        Config {
            destination_token: Secret::new("ghp_test"),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults_match_original_deployment() {
        let config = Config::default();
        assert_eq!(config.source_url, "https://git.neuf.no");
        assert_eq!(config.source_group_id, "5");
        assert_eq!(config.destination_org, "edb-gjengen");
        assert_eq!(config.jobs, 1);
        assert!(!config.dry_run);
        assert!(!config.fail_on_error);
    }

    #[test]
    fn test_secret_is_never_printed() {
        let secret = Secret::new("glpat-very-secret");
        assert_eq!(format!("{}", secret), "***");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(secret.expose(), Some("glpat-very-secret"));

        let config = Config {
            source_token: secret,
            ..Config::default()
        };
        assert!(!format!("{:?}", config).contains("very-secret"));
    }

    #[test]
    fn test_empty_secret_is_unset() {
        assert!(!Secret::new("").is_set());
        assert_eq!(format!("{}", Secret::none()), "<unset>");
    }

    #[test]
    fn test_parse_full_file() {
        let file = parse(
            r#"
source_url: https://gitlab.example.org
source_group_id: 42
destination_org: example
staging_root: /srv/mirrors
jobs: 4
timeout_secs: 60
fail_on_error: true
"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_file(file);
        assert_eq!(config.source_url, "https://gitlab.example.org");
        assert_eq!(config.source_group_id, "42");
        assert_eq!(config.destination_org, "example");
        assert_eq!(config.staging_root, PathBuf::from("/srv/mirrors"));
        assert_eq!(config.jobs, 4);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.fail_on_error);
        // Untouched fields keep their defaults
        assert_eq!(config.destination_api_url, "https://api.github.com");
    }

    #[test]
    fn test_parse_group_path() {
        let file = parse("source_group_id: edb/web\n").unwrap();
        assert_eq!(
            file.source_group_id,
            Some(GroupId::Path("edb/web".to_string()))
        );
    }

    #[test]
    fn test_parse_empty_file() {
        let file = parse("   \n").unwrap();
        assert!(file.source_url.is_none());
    }

    #[test]
    fn test_parse_rejects_tokens_in_file() {
        let err = parse("github_token: abc\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_validate_accepts_defaults_with_token() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn test_validate_requires_destination_token_unless_dry_run() {
        let mut config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("GITHUB_TOKEN"));

        config.dry_run = true;
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = valid_config();
        config.source_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::UrlParse(_))));

        let mut config = valid_config();
        config.destination_api_url = "ftp://api.github.com".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.jobs = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.destination_org = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_tokens_from_env() {
        std::env::set_var(SOURCE_TOKEN_ENV, "glpat-1");
        std::env::set_var(DESTINATION_TOKEN_ENV, "");

        let mut config = Config::default();
        config.load_tokens_from_env();
        assert_eq!(config.source_token.expose(), Some("glpat-1"));
        assert!(!config.destination_token.is_set());

        std::env::remove_var(SOURCE_TOKEN_ENV);
        std::env::remove_var(DESTINATION_TOKEN_ENV);
    }
}
