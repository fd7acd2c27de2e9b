//! Sync command implementation
//!
//! One invocation is one reconciliation pass:
//! 1. Build the configuration (defaults, config file, environment, flags)
//! 2. Lock the staging directory
//! 3. Read the GitLab and GitHub inventories
//! 4. Create missing repositories and mirror-push every active one
//! 5. Print the run summary
//!
//! `plan` runs the same command with `--dry-run` forced on.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use log::debug;

use lab2hub::config::{self, Config};
use lab2hub::forge::github::GithubClient;
use lab2hub::forge::gitlab::GitlabClient;
use lab2hub::output::{emoji, OutputConfig};
use lab2hub::reconcile;
use lab2hub::report::LogReporter;
use lab2hub::repository::{GitMirrorTransport, StagingArea};

/// Deadline for each forge API request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Arguments for the sync and plan commands
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Path to a YAML config file
    #[arg(short, long, value_name = "PATH", env = "LAB2HUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Load GITLAB_TOKEN / GITHUB_TOKEN from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Base URL of the GitLab instance
    #[arg(long, value_name = "URL", env = "LAB2HUB_GITLAB_URL")]
    pub gitlab_url: Option<String>,

    /// GitLab group id or path whose public projects are mirrored
    #[arg(long, value_name = "ID", env = "LAB2HUB_GITLAB_GROUP_ID")]
    pub gitlab_group_id: Option<String>,

    /// GitHub organization receiving the mirrors
    #[arg(long, value_name = "ORG", env = "LAB2HUB_GITHUB_ORG_NAME")]
    pub github_org_name: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, value_name = "URL", env = "LAB2HUB_GITHUB_API_URL")]
    pub github_api_url: Option<String>,

    /// Directory holding the bare mirror clones
    #[arg(long, value_name = "PATH", env = "LAB2HUB_STAGING_ROOT")]
    pub staging_root: Option<PathBuf>,

    /// Show what would be done without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Exit with an error when any repository failed
    #[arg(long)]
    pub fail_on_error: bool,

    /// Stop the run when a GitHub repository cannot be created
    #[arg(long)]
    pub abort_on_provision_error: bool,

    /// Number of repositories processed at once
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Time limit in seconds for staging and pushing one repository
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Suppress the summary (logs are still written)
    #[arg(short, long)]
    pub quiet: bool,
}

impl SyncArgs {
    /// Build the run configuration, flags taking precedence.
    pub fn to_config(&self, force_dry_run: bool) -> Result<Config> {
        let mut config = Config::default();

        if let Some(path) = &self.config {
            let file = config::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            config.apply_file(file);
        }

        config.load_tokens_from_env();

        if let Some(v) = &self.gitlab_url {
            config.source_url = v.clone();
        }
        if let Some(v) = &self.gitlab_group_id {
            config.source_group_id = v.clone();
        }
        if let Some(v) = &self.github_org_name {
            config.destination_org = v.clone();
        }
        if let Some(v) = &self.github_api_url {
            config.destination_api_url = v.clone();
        }
        if let Some(v) = &self.staging_root {
            config.staging_root = v.clone();
        }
        if let Some(v) = self.jobs {
            config.jobs = v;
        }
        if let Some(v) = self.timeout {
            config.timeout = Duration::from_secs(v);
        }
        config.dry_run = self.dry_run || force_dry_run;
        config.fail_on_error |= self.fail_on_error;
        config.abort_on_provision_error |= self.abort_on_provision_error;

        Ok(config)
    }
}

fn load_env_file(args: &SyncArgs) -> Result<()> {
    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded {}", path.display()),
            // Tokens may come from the environment alone
            Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("Failed to load .env"),
        },
    }
    Ok(())
}

/// Execute the sync command
pub fn execute(args: SyncArgs, output: &OutputConfig, force_dry_run: bool) -> Result<()> {
    let start_time = Instant::now();

    load_env_file(&args)?;
    let config = args.to_config(force_dry_run)?;
    config.validate()?;
    debug!("Running with {:?}", config);

    let source = GitlabClient::new(&config.source_url, config.source_token.clone(), HTTP_TIMEOUT);
    let destination = GithubClient::new(
        &config.destination_api_url,
        config.destination_token.clone(),
        HTTP_TIMEOUT,
    );

    let staging = StagingArea::new(&config.staging_root);
    let _lock = if config.dry_run {
        None
    } else {
        Some(staging.lock()?)
    };
    let transport = GitMirrorTransport::new(staging);

    let report = match reconcile::sync(&config, &source, &destination, &transport, &LogReporter) {
        Ok(report) => report,
        Err(e) if e.is_fatal() => {
            return Err(anyhow::Error::new(e)
                .context("Run aborted before any repository was touched"));
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !args.quiet {
        println!("{}", report.render(output));
        println!(
            "{} Finished in {:.2}s",
            emoji(output, "⏱️", "[TIME]"),
            start_time.elapsed().as_secs_f64()
        );
    }

    if report.should_fail(config.fail_on_error) {
        let summary = report.summary();
        anyhow::bail!(
            "{} repositories failed, {} not attempted",
            summary.failed,
            summary.not_attempted
        );
    }

    Ok(())
}
