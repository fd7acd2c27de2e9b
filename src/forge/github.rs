//! GitHub REST client for listing and creating organization repositories.

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use super::{describe_http_error, DestinationForge, DestinationRepository};
use crate::config::Secret;
use crate::error::{Error, Result};

/// Repositories requested per page; the API maximum.
const PER_PAGE: usize = 100;

/// Safety stop for pagination.
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    ssh_url: String,
    #[serde(default)]
    archived: bool,
}

impl From<Repository> for DestinationRepository {
    fn from(repo: Repository) -> Self {
        Self {
            name: repo.name,
            push_url: repo.ssh_url,
            archived: repo.archived,
        }
    }
}

/// Client for the GitHub REST API.
pub struct GithubClient {
    agent: ureq::Agent,
    api_url: String,
    token: Secret,
}

impl GithubClient {
    pub fn new(api_url: &str, token: Secret, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("lab2hub/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn repos_url(&self, org: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(org.as_bytes()).collect();
        format!("{}/orgs/{}/repos", self.api_url, encoded)
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        let request = request
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28");
        match self.token.expose() {
            Some(token) => request.set("Authorization", &format!("Bearer {}", token)),
            None => request,
        }
    }

    fn fetch_error(&self, message: String) -> Error {
        Error::InventoryFetch {
            forge: format!("github ({})", self.api_url),
            message,
        }
    }
}

impl DestinationForge for GithubClient {
    fn label(&self) -> &str {
        &self.api_url
    }

    fn list_repositories(&self, org: &str) -> Result<Vec<DestinationRepository>> {
        let url = self.repos_url(org);
        let mut repositories = Vec::new();

        for page in 1..=MAX_PAGES {
            debug!("GET {} page {}", url, page);
            let request = self
                .agent
                .get(&url)
                .query("per_page", &PER_PAGE.to_string())
                .query("page", &page.to_string());

            let batch: Vec<Repository> = self
                .authorize(request)
                .call()
                .map_err(|e| self.fetch_error(describe_http_error(e)))?
                .into_json()
                .map_err(|e| self.fetch_error(format!("invalid repository list: {}", e)))?;

            let short_page = batch.len() < PER_PAGE;
            repositories.extend(batch.into_iter().map(DestinationRepository::from));
            if short_page {
                return Ok(repositories);
            }
        }

        Err(self.fetch_error(format!("gave up after {} pages", MAX_PAGES)))
    }

    fn create_repository(
        &self,
        org: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<DestinationRepository> {
        let url = self.repos_url(org);
        debug!("POST {} ({})", url, name);

        let mut body = serde_json::json!({ "name": name });
        if let Some(description) = description {
            body["description"] = serde_json::Value::from(description);
        }

        let provision_error = |message: String| Error::Provision {
            name: name.to_string(),
            message,
        };

        let created: Repository = self
            .authorize(self.agent.post(&url))
            .send_json(body)
            .map_err(|e| provision_error(describe_http_error(e)))?
            .into_json()
            .map_err(|e| provision_error(format!("invalid create response: {}", e)))?;

        Ok(created.into())
    }
}
