//! # Mirror Transport and Staging Area
//!
//! This module moves repositories from the source forge to the destination
//! forge through a local staging area of bare mirror clones, one per
//! repository name.
//!
//! ## Design
//!
//! The reconciler only talks to the [`MirrorTransport`] trait, which allows
//! the transport to be swapped out in tests. In the application,
//! [`GitMirrorTransport`] is used, which drives the system `git` command
//! through [`crate::git`].
//!
//! The staging area persists across runs:
//!
//! - A name seen for the first time is mirror-cloned into a temporary
//!   `.<name>.git.partial` directory and renamed into place only once the
//!   clone finished, so an interrupted clone never looks like a usable mirror.
//! - A name seen before is validated and updated with a pruning fetch.
//! - A directory that fails validation is discarded and cloned again.
//!
//! Both operations for one repository run against the same
//! [`Deadline`], so the timeout bounds the whole transfer of a repository
//! rather than each git call.
//!
//! [`StagingArea::lock`] takes an exclusive lock on the staging root so
//! that two `lab2hub` processes never mutate the same mirrors.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::git::{self, Deadline, Invocation, RemoteStatus};
use crate::path::staging_dir_name;

/// Remote name under which the destination is registered in every mirror.
pub const DESTINATION_REMOTE: &str = "github";

/// Name of the lock file inside the staging root.
pub const LOCK_FILE_NAME: &str = ".lab2hub.lock";

/// Trait for mirror transfers - allows mocking in tests
pub trait MirrorTransport: Send + Sync {
    /// Bring the staging mirror for `name` up to date with `clone_url`.
    ///
    /// Clones on first use and fetches with pruning afterwards. Repeated
    /// calls converge on the upstream state at call time.
    fn ensure_staged(&self, clone_url: &str, name: &str, deadline: Deadline) -> Result<()>;

    /// Mirror-push the staging repository for `name` to `push_url`.
    ///
    /// Must only be called after [`MirrorTransport::ensure_staged`]
    /// succeeded for the same name. The destination remote is a push
    /// mirror, so pushing adds no refs to the staging repository.
    fn ensure_pushed(
        &self,
        name: &str,
        push_url: &str,
        deadline: Deadline,
    ) -> Result<RemoteStatus>;
}

/// The on-disk directory of bare mirrors.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

/// Exclusive ownership of a staging root; released on drop.
#[derive(Debug)]
pub struct StagingLock {
    file: File,
    path: PathBuf,
}

impl Drop for StagingLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release {}: {}", self.path.display(), e);
        }
    }
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the staging mirror for `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(staging_dir_name(name)?))
    }

    /// Scratch directory a first clone is written to before it is moved
    /// into place.
    fn partial_path_for(&self, name: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(format!(".{}.partial", staging_dir_name(name)?)))
    }

    /// Create the root if needed and lock it against other processes.
    pub fn lock(&self) -> Result<StagingLock> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.try_lock_exclusive().map_err(|_| Error::StagingLocked {
            path: self.root.display().to_string(),
        })?;
        Ok(StagingLock { file, path })
    }
}

/// Default transport backed by the system `git` command.
pub struct GitMirrorTransport {
    staging: StagingArea,
}

impl GitMirrorTransport {
    pub fn new(staging: StagingArea) -> Self {
        Self { staging }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    fn io_error(name: &str, stage: &str, e: std::io::Error) -> Error {
        Error::Transport {
            name: name.to_string(),
            stage: stage.to_string(),
            message: e.to_string(),
        }
    }

    fn clone_fresh(
        &self,
        clone_url: &str,
        name: &str,
        target: &Path,
        deadline: Deadline,
    ) -> Result<()> {
        let inv = Invocation::new(name, "clone", deadline);
        let partial = self.staging.partial_path_for(name)?;

        if partial.exists() {
            debug!("[{}] Removing leftover {}", name, partial.display());
            fs::remove_dir_all(&partial).map_err(|e| Self::io_error(name, "clone", e))?;
        }
        fs::create_dir_all(self.staging.root()).map_err(|e| Self::io_error(name, "clone", e))?;

        debug!("[{}] Cloning {} into bare repo {}", name, clone_url, target.display());
        if let Err(e) = git::clone_mirror(clone_url, &partial, &inv) {
            let _ = fs::remove_dir_all(&partial);
            return Err(e);
        }

        fs::rename(&partial, target).map_err(|e| Self::io_error(name, "clone", e))?;
        Ok(())
    }
}

/// Debug-log the ref count of a fresh clone. Never fails the stage.
fn log_staged_refs(path: &Path, inv: &Invocation<'_>) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    match git::list_refs(path, inv) {
        Ok(refs) => debug!("[{}] Staged {} refs", inv.name, refs.len()),
        Err(e) => debug!("[{}] Cannot count staged refs: {}", inv.name, e),
    }
}

impl MirrorTransport for GitMirrorTransport {
    fn ensure_staged(&self, clone_url: &str, name: &str, deadline: Deadline) -> Result<()> {
        let path = self.staging.path_for(name)?;
        let inv = Invocation::new(name, "fetch", deadline);

        if path.exists() {
            if git::is_mirror_repository(&path, &inv.stage("validate"))? {
                git::ensure_remote(&path, "origin", clone_url, &inv)?;
                debug!("[{}] Fetch from {} (origin) into {}", name, clone_url, path.display());
                git::fetch_prune(&path, &inv)?;
                return Ok(());
            }
            warn!(
                "[{}] {} is not a complete mirror clone, cloning again",
                name,
                path.display()
            );
            fs::remove_dir_all(&path).map_err(|e| Self::io_error(name, "clone", e))?;
        }

        self.clone_fresh(clone_url, name, &path, deadline)?;
        log_staged_refs(&path, &inv.stage("inspect"));
        Ok(())
    }

    fn ensure_pushed(
        &self,
        name: &str,
        push_url: &str,
        deadline: Deadline,
    ) -> Result<RemoteStatus> {
        let path = self.staging.path_for(name)?;
        let inv = Invocation::new(name, "push", deadline);

        if !git::is_mirror_repository(&path, &inv)? {
            return Err(Error::Transport {
                name: name.to_string(),
                stage: "push".to_string(),
                message: format!("{} has not been staged", path.display()),
            });
        }

        let status = git::ensure_push_mirror_remote(&path, DESTINATION_REMOTE, push_url, &inv)?;
        if status != RemoteStatus::AlreadyExists {
            debug!("[{}] Remote {} {:?}", name, DESTINATION_REMOTE, status);
        }

        debug!(
            "[{}] Pushing {} ({}) to {}",
            name,
            path.display(),
            DESTINATION_REMOTE,
            push_url
        );
        git::push_mirror(&path, DESTINATION_REMOTE, &inv)?;
        Ok(status)
    }
}
