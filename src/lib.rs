//! # lab2hub
//!
//! Keeps a GitHub organization a faithful mirror of the public projects of a
//! GitLab group: every branch, tag and other ref is pushed, and destination
//! repositories are created on demand.
//!
//! ## Quick Example
//!
//! ```
//! use lab2hub::inventory::{Inventory, RepositoryRecord};
//! use lab2hub::reconcile::{plan, ActionKind};
//!
//! let source: Inventory = vec![
//!     RepositoryRecord::source("alpha", "https://git.example.org/g/alpha.git", None),
//!     RepositoryRecord::source("beta", "https://git.example.org/g/beta.git", None),
//! ]
//! .into_iter()
//! .collect();
//! let destination: Inventory = vec![
//!     RepositoryRecord::destination("beta", "git@github.com:org/beta.git", true),
//! ]
//! .into_iter()
//! .collect();
//!
//! let actions = plan(&source, &destination);
//! assert_eq!(actions[0].kind, ActionKind::CreateAndMirror);
//! assert_eq!(actions[1].kind, ActionKind::SkipArchived);
//! ```
//!
//! ## Core Concepts
//!
//! - **Inventories (`inventory`)**: name-keyed snapshots of the repositories
//!   each forge knows about, read once per run.
//! - **Forges (`forge`)**: GitLab and GitHub clients, the inventory readers
//!   and the repository provisioner.
//! - **Mirror transport (`repository`, `git`)**: bare mirror clones kept in
//!   a staging directory, refreshed with pruning fetches and mirror-pushed to
//!   the destination.
//! - **Reconciliation (`reconcile`)**: the pure planning step and the
//!   executor that turns a plan into a [`report::RunReport`].
//!
//! ## Execution Flow
//!
//! 1.  Read the source inventory (public projects only).
//! 2.  Read the destination inventory.
//! 3.  Plan one action per source repository.
//! 4.  Create missing repositories, skip archived ones, stage and push the
//!     rest, isolating failures to the repository they happened for.
//! 5.  Report per-status counts and every failure with its reason.

pub mod config;
pub mod error;
pub mod forge;
pub mod git;
pub mod inventory;
pub mod output;
pub mod path;
pub mod reconcile;
pub mod report;
pub mod repository;

#[cfg(test)]
mod path_proptest;
