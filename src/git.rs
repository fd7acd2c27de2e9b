//! Thin wrappers around the system `git` binary.
//!
//! Using the system command means authentication works the way it does for
//! the user already:
//! - SSH keys from ~/.ssh/ and a running ssh-agent
//! - Git credential helpers
//! - Any authentication configured in ~/.gitconfig
//!
//! Every invocation runs against a [`Deadline`] shared by all git calls made
//! for one repository. A child still running when it passes is killed and
//! reported as [`Error::Timeout`]; a call made after it passed is not started.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::{Error, Result};

/// Interval between checks on a running git child.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Point in time by which all work on one repository must be finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// The total time this deadline allowed.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left, `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }
}

/// Which repository and stage a git call belongs to, for error context.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub name: &'a str,
    pub stage: &'a str,
    pub deadline: Deadline,
}

impl<'a> Invocation<'a> {
    pub fn new(name: &'a str, stage: &'a str, deadline: Deadline) -> Self {
        Self {
            name,
            stage,
            deadline,
        }
    }

    /// The same invocation for a different stage.
    pub fn stage(self, stage: &'a str) -> Self {
        Self { stage, ..self }
    }

    fn timeout_error(&self) -> Error {
        Error::Timeout {
            name: self.name.to_string(),
            stage: self.stage.to_string(),
            seconds: self.deadline.budget().as_secs(),
        }
    }

    fn transport_error(&self, message: impl Into<String>) -> Error {
        Error::Transport {
            name: self.name.to_string(),
            stage: self.stage.to_string(),
            message: message.into(),
        }
    }
}

/// Captured result of a finished git child.
#[derive(Debug)]
struct GitOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Outcome of [`ensure_remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    /// The remote existed with the requested URL.
    AlreadyExists,
    /// The remote did not exist and was added.
    Created,
    /// The remote existed but pointed elsewhere; its URL was replaced.
    Updated,
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

fn wait_with_deadline(mut child: Child, inv: &Invocation<'_>) -> Result<GitOutput> {
    // Pipes are drained on their own threads so a chatty child cannot block
    // on a full pipe while we poll for its exit.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        match inv.deadline.remaining() {
            Some(left) => thread::sleep(left.min(POLL_INTERVAL)),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(inv.timeout_error());
            }
        }
    };

    Ok(GitOutput {
        success: status.success(),
        code: status.code(),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn run(args: &[&str], repo: Option<&Path>, inv: &Invocation<'_>) -> Result<GitOutput> {
    if inv.deadline.is_expired() {
        return Err(inv.timeout_error());
    }

    let mut command = Command::new("git");
    if let Some(repo) = repo {
        command.arg("-C").arg(repo);
    }
    command
        .args(args)
        // Never block on an interactive credential prompt
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("[{}] git {}", inv.name, args.join(" "));

    let child = command
        .spawn()
        .map_err(|e| inv.transport_error(format!("failed to start git: {}", e)))?;
    wait_with_deadline(child, inv)
}

fn run_checked(args: &[&str], repo: Option<&Path>, inv: &Invocation<'_>) -> Result<String> {
    let output = run(args, repo, inv)?;
    if !output.success {
        return Err(inv.transport_error(explain_failure(&output.stderr)));
    }
    Ok(output.stdout)
}

/// Turn git's stderr into a message, with a hint for common auth failures.
fn explain_failure(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
    {
        format!(
            "{}\n  hint: check that the SSH key or credential helper used by git \
             has access to this repository",
            stderr
        )
    } else {
        stderr.to_string()
    }
}

/// Mirror-clone `url` into a new bare repository at `target`.
///
/// Imports every ref (branches, tags, notes), not just the default branch.
pub fn clone_mirror(url: &str, target: &Path, inv: &Invocation<'_>) -> Result<()> {
    let target = target.to_string_lossy();
    run_checked(&["clone", "--mirror", "--", url, &target], None, inv)?;
    Ok(())
}

/// Fetch from `origin`, deleting local refs that no longer exist upstream.
pub fn fetch_prune(repo: &Path, inv: &Invocation<'_>) -> Result<()> {
    run_checked(&["fetch", "--prune", "origin"], Some(repo), inv)?;
    Ok(())
}

/// Make the destination refs exactly equal to the local refs of `repo`.
pub fn push_mirror(repo: &Path, remote: &str, inv: &Invocation<'_>) -> Result<()> {
    run_checked(&["push", "--mirror", remote], Some(repo), inv)?;
    Ok(())
}

/// Read a single config value, `None` if the key is unset.
pub fn config_value(repo: &Path, key: &str, inv: &Invocation<'_>) -> Result<Option<String>> {
    let output = run(&["config", "--get", key], Some(repo), inv)?;
    match (output.success, output.code) {
        (true, _) => Ok(Some(output.stdout.trim().to_string())),
        // `git config --get` exits 1 when the key is missing
        (false, Some(1)) => Ok(None),
        (false, _) => Err(inv.transport_error(explain_failure(&output.stderr))),
    }
}

/// Point fetch remote `remote` at `url`, creating it if needed.
pub fn ensure_remote(
    repo: &Path,
    remote: &str,
    url: &str,
    inv: &Invocation<'_>,
) -> Result<RemoteStatus> {
    let key = format!("remote.{}.url", remote);
    match config_value(repo, &key, inv)? {
        Some(current) if current == url => Ok(RemoteStatus::AlreadyExists),
        Some(_) => {
            run_checked(&["remote", "set-url", remote, url], Some(repo), inv)?;
            Ok(RemoteStatus::Updated)
        }
        None => {
            run_checked(&["remote", "add", remote, url], Some(repo), inv)?;
            Ok(RemoteStatus::Created)
        }
    }
}

/// Point push-mirror remote `remote` at `url`, creating it if needed.
///
/// The remote is registered with `--mirror=push` and has no fetch refspec,
/// so `git push --mirror` leaves no `refs/remotes/<remote>/*` tracking refs
/// behind in `repo`. A remote that still carries a fetch refspec is
/// repaired and reported as [`RemoteStatus::Updated`], and tracking refs it
/// already left are deleted.
pub fn ensure_push_mirror_remote(
    repo: &Path,
    remote: &str,
    url: &str,
    inv: &Invocation<'_>,
) -> Result<RemoteStatus> {
    let url_key = format!("remote.{}.url", remote);
    let fetch_key = format!("remote.{}.fetch", remote);
    let mirror_key = format!("remote.{}.mirror", remote);

    let current = match config_value(repo, &url_key, inv)? {
        Some(current) => current,
        None => {
            run_checked(
                &["remote", "add", "--mirror=push", remote, url],
                Some(repo),
                inv,
            )?;
            return Ok(RemoteStatus::Created);
        }
    };

    let mut status = RemoteStatus::AlreadyExists;
    if current != url {
        run_checked(&["remote", "set-url", remote, url], Some(repo), inv)?;
        status = RemoteStatus::Updated;
    }
    if config_value(repo, &fetch_key, inv)?.is_some() {
        run_checked(&["config", "--unset-all", &fetch_key], Some(repo), inv)?;
        let prefix = format!("refs/remotes/{}/", remote);
        for (name, _) in list_refs(repo, inv)? {
            if name.starts_with(&prefix) {
                run_checked(&["update-ref", "-d", &name], Some(repo), inv)?;
            }
        }
        status = RemoteStatus::Updated;
    }
    if config_value(repo, &mirror_key, inv)?.as_deref() != Some("true") {
        run_checked(&["config", &mirror_key, "true"], Some(repo), inv)?;
        status = RemoteStatus::Updated;
    }
    Ok(status)
}

/// Whether `repo` is a complete bare mirror clone.
///
/// `git clone --mirror` writes `core.bare` and `remote.origin.mirror` as
/// its final configuration; a directory missing either was not produced by a
/// finished mirror clone and must not be trusted.
pub fn is_mirror_repository(repo: &Path, inv: &Invocation<'_>) -> Result<bool> {
    if !repo.join("HEAD").is_file() {
        return Ok(false);
    }
    let bare = config_value(repo, "core.bare", inv)?;
    let mirror = config_value(repo, "remote.origin.mirror", inv)?;
    Ok(bare.as_deref() == Some("true") && mirror.as_deref() == Some("true"))
}

/// All refs of `repo` as `(refname, object id)` pairs, sorted by name.
pub fn list_refs(repo: &Path, inv: &Invocation<'_>) -> Result<Vec<(String, String)>> {
    let stdout = run_checked(
        &["for-each-ref", "--format=%(refname) %(objectname)"],
        Some(repo),
        inv,
    )?;
    let mut refs: Vec<(String, String)> = stdout
        .lines()
        .filter_map(|line| {
            line.split_once(' ')
                .map(|(name, oid)| (name.to_string(), oid.to_string()))
        })
        .collect();
    refs.sort();
    Ok(refs)
}
