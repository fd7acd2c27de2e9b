//! # Run Outcomes and Reporting
//!
//! A reconciliation pass produces a [`RunReport`]: one [`Outcome`] per
//! source repository, in plan order. Progress is announced through the
//! [`Reporter`] trait while the run is in flight. The application uses
//! [`LogReporter`], which writes through the `log` facade; tests plug in
//! their own reporter and inspect the calls instead of captured console
//! output.

use std::fmt;

use log::{info, warn};
use serde::Serialize;

use crate::output::{emoji, OutputConfig};

/// The step a repository failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// No usable name could be derived.
    Name,
    /// The destination repository could not be created.
    Provision,
    /// Cloning or fetching into the staging mirror failed.
    Stage,
    /// Pushing the staging mirror failed.
    Push,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Name => "name",
            FailureStage::Provision => "provision",
            FailureStage::Stage => "stage",
            FailureStage::Push => "push",
        })
    }
}

/// What happened to one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    CreatedAndMirrored,
    Mirrored,
    SkippedArchived,
    Failed { stage: FailureStage, reason: String },
    /// The run was aborted before this repository was reached.
    NotAttempted,
}

impl Status {
    pub fn is_failure(&self) -> bool {
        matches!(self, Status::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub name: String,
    #[serde(flatten)]
    pub status: Status,
}

impl Outcome {
    pub fn new(name: &str, status: Status) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

/// Count of outcomes per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub created_and_mirrored: usize,
    pub mirrored: usize,
    pub skipped_archived: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// True when nothing was provisioned or transferred.
    pub dry_run: bool,
    pub source_count: usize,
    pub destination_count: usize,
    pub outcomes: Vec<Outcome>,
}

impl RunReport {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for outcome in &self.outcomes {
            match outcome.status {
                Status::CreatedAndMirrored => summary.created_and_mirrored += 1,
                Status::Mirrored => summary.mirrored += 1,
                Status::SkippedArchived => summary.skipped_archived += 1,
                Status::Failed { .. } => summary.failed += 1,
                Status::NotAttempted => summary.not_attempted += 1,
            }
        }
        summary
    }

    /// Failed outcomes in report order.
    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    pub fn status_of(&self, name: &str) -> Option<&Status> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.status)
    }

    /// Whether the process should exit non-zero under the given policy.
    pub fn should_fail(&self, fail_on_error: bool) -> bool {
        fail_on_error && (self.failures().next().is_some() || self.summary().not_attempted > 0)
    }

    /// Human readable summary for the terminal.
    pub fn render(&self, output: &OutputConfig) -> String {
        let summary = self.summary();
        let verb = if self.dry_run { "would be " } else { "" };
        let mut lines = Vec::new();

        if self.dry_run {
            lines.push(format!(
                "{} Dry run: nothing was created or pushed",
                emoji(output, "🔎", "[DRY-RUN]")
            ));
        }
        lines.push(format!(
            "{} source repositories, {} destination repositories",
            self.source_count, self.destination_count
        ));
        lines.push(format!(
            "   {} {}created and mirrored",
            summary.created_and_mirrored, verb
        ));
        lines.push(format!("   {} {}mirrored", summary.mirrored, verb));
        lines.push(format!(
            "   {} {}skipped (archived)",
            summary.skipped_archived, verb
        ));
        if summary.not_attempted > 0 {
            lines.push(format!("   {} not attempted", summary.not_attempted));
        }
        lines.push(format!("   {} failed", summary.failed));

        for outcome in self.failures() {
            if let Status::Failed { stage, reason } = &outcome.status {
                lines.push(format!(
                    "{} {} ({}): {}",
                    emoji(output, "❌", "[FAILED]"),
                    outcome.name,
                    stage,
                    reason
                ));
            }
        }

        if summary.failed == 0 && summary.not_attempted == 0 {
            lines.push(format!("{} Done", emoji(output, "✅", "[OK]")));
        }

        lines.join("\n")
    }
}

/// Which forge an inventory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

/// Receives progress while a run is in flight.
pub trait Reporter: Send + Sync {
    /// An inventory was read.
    fn inventory_loaded(&self, side: Side, forge: &str, count: usize);

    /// A repository finished (or, in a dry run, was evaluated).
    fn outcome(&self, outcome: &Outcome, dry_run: bool);
}

/// Reporter writing to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn inventory_loaded(&self, side: Side, forge: &str, count: usize) {
        match side {
            Side::Source => info!("Found {} source projects at {}", count, forge),
            Side::Destination => info!("Found {} destination repositories at {}", count, forge),
        }
    }

    fn outcome(&self, outcome: &Outcome, dry_run: bool) {
        let name = &outcome.name;
        if dry_run {
            match &outcome.status {
                Status::CreatedAndMirrored => info!("[DRY-RUN] {}: would create and mirror", name),
                Status::Mirrored => info!("[DRY-RUN] {}: would mirror", name),
                Status::SkippedArchived => info!("[DRY-RUN] {}: would skip (archived)", name),
                Status::Failed { stage, reason } => {
                    warn!("[DRY-RUN] {}: would fail during {}: {}", name, stage, reason)
                }
                Status::NotAttempted => info!("[DRY-RUN] {}: not attempted", name),
            }
            return;
        }

        match &outcome.status {
            Status::CreatedAndMirrored => info!("[NEW]: {}", name),
            Status::Mirrored => info!("[OK]: {}", name),
            Status::SkippedArchived => info!("[SKIP]: {} (archived)", name),
            Status::Failed { stage, reason } => {
                warn!("[FAILED]: {} during {}: {}", name, stage, reason)
            }
            Status::NotAttempted => warn!("[NOT ATTEMPTED]: {}", name),
        }
    }
}
