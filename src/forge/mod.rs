//! # Forge Clients, Inventory Readers and Provisioner
//!
//! The two forges are reached through the [`SourceForge`] and
//! [`DestinationForge`] traits. Their implementations ([`gitlab`] and
//! [`github`]) speak the REST APIs and hand back plain project and
//! repository descriptions; nothing forge-specific leaks past this module.
//!
//! The reader functions turn those descriptions into normalized
//! [`Inventory`] values:
//!
//! - [`list_source_repositories`] keeps public projects only and derives the
//!   join key from the clone URL.
//! - [`list_destination_repositories`] keys repositories by their
//!   lower-cased name.
//!
//! Any failure while listing is an [`Error::InventoryFetch`] and aborts the
//! run. There is no partial inventory.

pub mod github;
pub mod gitlab;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::inventory::{Inventory, RepositoryRecord};
use crate::path::{derive_source_name, destination_key};

/// Visibility level of projects that are mirrored.
pub const PUBLIC_VISIBILITY: &str = "public";

/// A project as listed by the source forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProject {
    /// Human readable project name.
    pub display_name: String,
    /// HTTP(S) clone URL.
    pub clone_url: String,
    /// Visibility level, if the forge reported one.
    pub visibility: Option<String>,
}

/// A repository as listed by the destination forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRepository {
    pub name: String,
    pub push_url: String,
    pub archived: bool,
}

/// Read access to the source forge.
pub trait SourceForge: Send + Sync {
    /// Short label used in logs and errors.
    fn label(&self) -> &str;

    /// Every public project of `group`, following pagination to the end.
    fn list_public_projects(&self, group: &str) -> Result<Vec<SourceProject>>;
}

/// Read and create access to the destination forge.
pub trait DestinationForge: Send + Sync {
    /// Short label used in logs and errors.
    fn label(&self) -> &str;

    /// Every repository of `org`, following pagination to the end.
    fn list_repositories(&self, org: &str) -> Result<Vec<DestinationRepository>>;

    /// Create repository `name` in `org`.
    fn create_repository(
        &self,
        org: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<DestinationRepository>;
}

/// Build the source inventory for `group`.
///
/// Projects whose name cannot be derived are kept aside with
/// [`Inventory::reject`] so the run reports them as failed; the rest of the
/// inventory stands.
pub fn list_source_repositories(forge: &dyn SourceForge, group: &str) -> Result<Inventory> {
    let projects = forge.list_public_projects(group)?;
    let mut inventory = Inventory::new();

    for project in projects {
        // The server-side visibility filter is enforced here as well
        if let Some(visibility) = &project.visibility {
            if visibility != PUBLIC_VISIBILITY {
                debug!("Ignoring {} project {}", visibility, project.clone_url);
                continue;
            }
        }

        let name = match derive_source_name(&project.clone_url) {
            Ok(name) => name,
            Err(e) => {
                warn!("Skipping source project {}: {}", project.display_name, e);
                inventory.reject(&project.clone_url, e.to_string());
                continue;
            }
        };

        let record = RepositoryRecord::source(
            &name,
            &project.clone_url,
            Some(project.display_name.clone()),
        );
        if inventory.insert(record).is_some() {
            warn!(
                "Source {} lists more than one project named {}; keeping {}",
                forge.label(),
                name,
                project.clone_url
            );
        }
    }

    Ok(inventory)
}

/// Build the destination inventory for `org`.
pub fn list_destination_repositories(forge: &dyn DestinationForge, org: &str) -> Result<Inventory> {
    let repositories = forge.list_repositories(org)?;
    let mut inventory = Inventory::new();

    for repository in repositories {
        let key = destination_key(&repository.name);
        let record = RepositoryRecord::destination(&key, &repository.push_url, repository.archived);
        if inventory.insert(record).is_some() {
            warn!(
                "Destination {} lists {} more than once; keeping the last one",
                forge.label(),
                key
            );
        }
    }

    Ok(inventory)
}

/// Create a missing destination repository.
///
/// The returned record has the same shape as those produced by
/// [`list_destination_repositories`], with `archived` false.
pub fn create_destination_repository(
    forge: &dyn DestinationForge,
    org: &str,
    name: &str,
    description: Option<&str>,
) -> Result<RepositoryRecord> {
    let created = forge
        .create_repository(org, name, description)
        .map_err(|e| match e {
            e @ Error::Provision { .. } => e,
            other => Error::Provision {
                name: name.to_string(),
                message: other.to_string(),
            },
        })?;
    Ok(RepositoryRecord::destination(
        &destination_key(name),
        &created.push_url,
        false,
    ))
}

/// Describe a failed HTTP exchange, including the response body if any.
pub(crate) fn describe_http_error(err: ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, response) => {
            let url = response.get_url().to_string();
            let body = response.into_string().unwrap_or_default();
            let body = body.trim();
            if body.is_empty() {
                format!("HTTP {} from {}", code, url)
            } else {
                format!("HTTP {} from {}: {}", code, url, body)
            }
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    }
}
