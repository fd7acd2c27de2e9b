//! # Reconciliation
//!
//! This is the decision core of `lab2hub`. A pass is split in two:
//!
//! 1.  **Planning (`plan`)**: a pure function over the source and
//!     destination inventories. Every source name gets exactly one
//!     [`Action`]:
//!     - absent from the destination: [`ActionKind::CreateAndMirror`]
//!     - present but archived: [`ActionKind::SkipArchived`]
//!     - present and active: [`ActionKind::Mirror`]
//!
//!     Names that only exist at the destination are never planned, so the
//!     tool never deletes or modifies repositories it does not mirror.
//!
//! 2.  **Execution (`Reconciler::run`)**: each action is carried out
//!     through the provisioner and the [`MirrorTransport`]. Failures are
//!     recorded per repository and the pass continues with the next one,
//!     unless `abort_on_provision_error` asks for the stricter behavior.
//!
//! A dry run stops after planning and reports what would have happened.
//!
//! ## Concurrency
//!
//! With `jobs == 1` repositories are processed one after the other. A
//! larger value runs them on a bounded `rayon` pool. Outcomes are still
//! reported in plan order, and [`NameLocks`] guarantees that no two workers
//! hold the same staging repository at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use rayon::prelude::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::forge::{
    create_destination_repository, list_destination_repositories, list_source_repositories,
    DestinationForge, SourceForge,
};
use crate::git::Deadline;
use crate::inventory::{Inventory, Rejected, RepositoryRecord};
use crate::report::{FailureStage, Outcome, Reporter, RunReport, Side, Status};
use crate::repository::MirrorTransport;

/// What to do with one source repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    CreateAndMirror,
    Mirror,
    SkipArchived,
}

/// A planned decision for one repository name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
}

impl Action {
    /// The status this action reports when it succeeds.
    pub fn success_status(&self) -> Status {
        match self.kind {
            ActionKind::CreateAndMirror => Status::CreatedAndMirrored,
            ActionKind::Mirror => Status::Mirrored,
            ActionKind::SkipArchived => Status::SkippedArchived,
        }
    }
}

/// Compute the action plan, in source order.
pub fn plan(source: &Inventory, destination: &Inventory) -> Vec<Action> {
    source
        .names()
        .map(|name| {
            let kind = match destination.get(name) {
                None => ActionKind::CreateAndMirror,
                Some(record) if record.archived => ActionKind::SkipArchived,
                Some(_) => ActionKind::Mirror,
            };
            Action {
                name: name.to_string(),
                kind,
            }
        })
        .collect()
}

/// Per-name mutual exclusion for staging repositories.
#[derive(Debug, Default)]
pub struct NameLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `name`; the same `Arc` for the same name.
    pub fn handle(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(name.to_string()).or_default().clone()
    }
}

/// Drives one reconciliation pass.
pub struct Reconciler<'a> {
    destination_forge: &'a dyn DestinationForge,
    transport: &'a dyn MirrorTransport,
    reporter: &'a dyn Reporter,
    org: String,
    jobs: usize,
    timeout: Duration,
    abort_on_provision_error: bool,
    locks: NameLocks,
    aborted: AtomicBool,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: &Config,
        destination_forge: &'a dyn DestinationForge,
        transport: &'a dyn MirrorTransport,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            destination_forge,
            transport,
            reporter,
            org: config.destination_org.clone(),
            jobs: config.jobs.max(1),
            timeout: config.timeout,
            abort_on_provision_error: config.abort_on_provision_error,
            locks: NameLocks::new(),
            aborted: AtomicBool::new(false),
        }
    }

    /// Report what a run would do, without any side effect.
    pub fn dry_run(&self, source: &Inventory, destination: &Inventory) -> RunReport {
        let planned: Vec<Outcome> = plan(source, destination)
            .iter()
            .map(|action| Outcome::new(&action.name, action.success_status()))
            .collect();
        let outcomes = in_source_order(planned, source.rejected());

        for outcome in &outcomes {
            self.reporter.outcome(outcome, true);
        }

        RunReport {
            dry_run: true,
            source_count: source.len(),
            destination_count: destination.len(),
            outcomes,
        }
    }

    /// Execute the plan for `source` against `destination`.
    pub fn run(&self, source: &Inventory, destination: &Inventory) -> RunReport {
        let actions = plan(source, destination);
        let execute = |action: &Action| {
            let outcome = Outcome::new(&action.name, self.execute(action, source, destination));
            self.reporter.outcome(&outcome, false);
            outcome
        };

        let planned: Vec<Outcome> = if self.jobs > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
            {
                // Indexed collect keeps plan order
                Ok(pool) => pool.install(|| actions.par_iter().map(execute).collect()),
                Err(e) => {
                    warn!("Cannot start {} workers ({}), running sequentially", self.jobs, e);
                    actions.iter().map(execute).collect()
                }
            }
        } else {
            actions.iter().map(execute).collect()
        };

        for rejected in source.rejected() {
            self.reporter.outcome(&rejected_outcome(rejected), false);
        }
        let outcomes = in_source_order(planned, source.rejected());

        RunReport {
            dry_run: false,
            source_count: source.len(),
            destination_count: destination.len(),
            outcomes,
        }
    }

    fn execute(&self, action: &Action, source: &Inventory, destination: &Inventory) -> Status {
        if self.aborted.load(Ordering::SeqCst) {
            return Status::NotAttempted;
        }

        let Some(source_record) = source.get(&action.name) else {
            return failed(FailureStage::Name, "not in the source inventory");
        };

        let handle = self.locks.handle(&action.name);
        let _guard = handle.lock().unwrap_or_else(|e| e.into_inner());

        match action.kind {
            ActionKind::SkipArchived => Status::SkippedArchived,
            ActionKind::Mirror => match destination.get(&action.name) {
                Some(target) => self.mirror(source_record, target, Status::Mirrored),
                None => failed(FailureStage::Push, "not in the destination inventory"),
            },
            ActionKind::CreateAndMirror => {
                let created = create_destination_repository(
                    self.destination_forge,
                    &self.org,
                    &action.name,
                    source_record.description.as_deref(),
                );
                match created {
                    Ok(target) => {
                        debug!("[{}] Created {}/{}", action.name, self.org, target.name);
                        self.mirror(source_record, &target, Status::CreatedAndMirrored)
                    }
                    Err(e) => {
                        if self.abort_on_provision_error {
                            warn!("Aborting run after failing to create {}", action.name);
                            self.aborted.store(true, Ordering::SeqCst);
                        }
                        failure_status(FailureStage::Provision, &e)
                    }
                }
            }
        }
    }

    /// Stage then push; a push is never attempted on a failed stage.
    ///
    /// Both steps share one deadline, so `timeout` bounds the whole
    /// transfer of the repository.
    fn mirror(
        &self,
        source: &RepositoryRecord,
        target: &RepositoryRecord,
        success: Status,
    ) -> Status {
        let Some(clone_url) = source.clone_url.as_deref() else {
            return failed(FailureStage::Stage, "source record has no clone URL");
        };
        let Some(push_url) = target.push_url.as_deref() else {
            return failed(FailureStage::Push, "destination record has no push URL");
        };

        let deadline = Deadline::after(self.timeout);
        if let Err(e) = self.transport.ensure_staged(clone_url, &source.name, deadline) {
            return failure_status(FailureStage::Stage, &e);
        }
        if let Err(e) = self.transport.ensure_pushed(&source.name, push_url, deadline) {
            return failure_status(FailureStage::Push, &e);
        }
        success
    }
}

fn failed(stage: FailureStage, reason: &str) -> Status {
    Status::Failed {
        stage,
        reason: reason.to_string(),
    }
}

fn failure_status(stage: FailureStage, err: &Error) -> Status {
    let stage = match err {
        Error::InvalidName { .. } => FailureStage::Name,
        _ => stage,
    };
    Status::Failed {
        stage,
        reason: err.to_string(),
    }
}

fn rejected_outcome(rejected: &Rejected) -> Outcome {
    Outcome::new(&rejected.label, failed(FailureStage::Name, &rejected.reason))
}

/// Slot rejected entries back between the planned outcomes, which follow
/// the source records one to one.
fn in_source_order(planned: Vec<Outcome>, rejected: &[Rejected]) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(planned.len() + rejected.len());
    let mut rejected = rejected.iter().peekable();
    for (index, outcome) in planned.into_iter().enumerate() {
        while let Some(entry) = rejected.next_if(|r| r.position <= index) {
            outcomes.push(rejected_outcome(entry));
        }
        outcomes.push(outcome);
    }
    outcomes.extend(rejected.map(rejected_outcome));
    outcomes
}

/// Run one full pass: read both inventories, plan, then execute or report.
///
/// Inventory failures abort before any repository is touched.
pub fn sync(
    config: &Config,
    source_forge: &dyn SourceForge,
    destination_forge: &dyn DestinationForge,
    transport: &dyn MirrorTransport,
    reporter: &dyn Reporter,
) -> Result<RunReport> {
    let source = list_source_repositories(source_forge, &config.source_group_id)?;
    reporter.inventory_loaded(Side::Source, source_forge.label(), source.len());

    let destination = list_destination_repositories(destination_forge, &config.destination_org)?;
    reporter.inventory_loaded(Side::Destination, destination_forge.label(), destination.len());

    let reconciler = Reconciler::new(config, destination_forge, transport, reporter);
    if config.dry_run {
        Ok(reconciler.dry_run(&source, &destination))
    } else {
        Ok(reconciler.run(&source, &destination))
    }
}
