//! GitLab REST client for listing a group's public projects.

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use super::{describe_http_error, SourceForge, SourceProject, PUBLIC_VISIBILITY};
use crate::config::Secret;
use crate::error::{Error, Result};

/// Projects requested per page; the API maximum.
const PER_PAGE: usize = 100;

/// Safety stop for servers that never stop announcing a next page.
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Deserialize)]
struct Project {
    name: String,
    http_url_to_repo: String,
    #[serde(default)]
    visibility: Option<String>,
}

/// Client for the GitLab v4 API.
pub struct GitlabClient {
    agent: ureq::Agent,
    base_url: String,
    token: Secret,
}

impl GitlabClient {
    pub fn new(base_url: &str, token: Secret, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("lab2hub/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// URL of the project listing for `group`, which may be a numeric id or
    /// a namespace path.
    fn projects_url(&self, group: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(group.as_bytes()).collect();
        format!("{}/api/v4/groups/{}/projects", self.base_url, encoded)
    }

    fn fetch_error(&self, message: String) -> Error {
        Error::InventoryFetch {
            forge: format!("gitlab ({})", self.base_url),
            message,
        }
    }
}

impl SourceForge for GitlabClient {
    fn label(&self) -> &str {
        &self.base_url
    }

    fn list_public_projects(&self, group: &str) -> Result<Vec<SourceProject>> {
        let url = self.projects_url(group);
        let mut projects = Vec::new();
        let mut page = 1usize;

        for _ in 0..MAX_PAGES {
            debug!("GET {} page {}", url, page);
            let mut request = self
                .agent
                .get(&url)
                .query("visibility", PUBLIC_VISIBILITY)
                .query("per_page", &PER_PAGE.to_string())
                .query("page", &page.to_string());
            if let Some(token) = self.token.expose() {
                request = request.set("PRIVATE-TOKEN", token);
            }

            let response = request
                .call()
                .map_err(|e| self.fetch_error(describe_http_error(e)))?;
            let next_page = response
                .header("X-Next-Page")
                .and_then(|v| v.trim().parse::<usize>().ok());
            let batch: Vec<Project> = response
                .into_json()
                .map_err(|e| self.fetch_error(format!("invalid project list: {}", e)))?;

            projects.extend(batch.into_iter().map(|p| SourceProject {
                display_name: p.name,
                clone_url: p.http_url_to_repo,
                visibility: p.visibility,
            }));

            match next_page {
                Some(next) if next > page => page = next,
                _ => return Ok(projects),
            }
        }

        Err(self.fetch_error(format!("gave up after {} pages", MAX_PAGES)))
    }
}
