//! Shared test utilities for integration and E2E tests.
//!
//! This module provides:
//! - `wiremock` mounts answering like the GitLab and GitHub REST APIs, so
//!   the binary can run against forges without network access.
//! - [`TestFixture`], a temporary directory with helpers to build source
//!   repositories and bare destination repositories with the system `git`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     if !git_available() {
//!         return;
//!     }
//!     let fixture = TestFixture::new();
//!     let source = fixture.source_repo("alpha");
//!     // ... test code
//! }
//! ```

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use assert_fs::prelude::*;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    pub use super::{git, git_available, refs, TestFixture};
    #[allow(unused_imports)]
    pub use super::{forge, query_value};
}

/// Whether a usable `git` binary is on PATH.
///
/// Tests that drive real git operations return early when it is not.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with a fixed identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=lab2hub tests",
            "-c",
            "user.email=tests@lab2hub.invalid",
            "-c",
            "init.defaultBranch=main",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Every ref of `repo` as `"<refname> <oid>"`, sorted.
pub fn refs(repo: &Path) -> Vec<String> {
    let mut refs: Vec<String> = git(repo, &["for-each-ref", "--format=%(refname) %(objectname)"])
        .lines()
        .map(str::to_string)
        .collect();
    refs.sort();
    refs
}

/// A temporary directory holding source and destination repositories.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Staging root used by the tool under test.
    pub fn staging_root(&self) -> PathBuf {
        self.path().join("staging")
    }

    /// A working repository at `src/<name>` with a commit on `main`, a
    /// `feature` branch and a `v1.0.0` tag.
    pub fn source_repo(&self, name: &str) -> PathBuf {
        let dir = self.temp_dir.child("src").child(name);
        dir.create_dir_all().expect("Failed to create source dir");
        let path = dir.path().to_path_buf();

        git(&path, &["init", "--quiet"]);
        self.commit(&path, "README.md", &format!("# {}\n", name));
        git(&path, &["branch", "feature"]);
        git(&path, &["tag", "-a", "v1.0.0", "-m", "first release"]);
        path
    }

    /// Write `file` and commit it on the current branch.
    pub fn commit(&self, repo: &Path, file: &str, content: &str) {
        std::fs::write(repo.join(file), content).expect("Failed to write file");
        git(repo, &["add", file]);
        git(repo, &["commit", "--quiet", "-m", &format!("update {}", file)]);
    }

    /// An empty bare repository at `dst/<name>.git`, standing in for a
    /// destination forge repository.
    pub fn destination_repo(&self, name: &str) -> PathBuf {
        let dir = self.temp_dir.child("dst").child(format!("{}.git", name));
        dir.create_dir_all().expect("Failed to create destination dir");
        git(dir.path(), &["init", "--bare", "--quiet"]);
        dir.path().to_path_buf()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// GitLab and GitHub API responses for `wiremock`.
pub mod forge {
    use super::*;

    /// Path of the GitLab project listing for `group`.
    pub fn group_projects(group: &str) -> String {
        format!("/api/v4/groups/{}/projects", group)
    }

    /// Path of the GitHub organization repositories.
    pub fn org_repos(org: &str) -> String {
        format!("/orgs/{}/repos", org)
    }

    /// A public GitLab project.
    pub fn project(name: &str, clone_url: &str) -> Value {
        json!({ "name": name, "visibility": "public", "http_url_to_repo": clone_url })
    }

    /// A GitHub repository.
    pub fn repo(name: &str, ssh_url: &str, archived: bool) -> Value {
        json!({ "name": name, "ssh_url": ssh_url, "archived": archived })
    }

    /// Serve page `page` of the GitLab listing of `group`.
    ///
    /// `next_page` becomes the `X-Next-Page` header; GitLab sends it empty
    /// on the last page.
    pub async fn mount_gitlab_page(
        server: &MockServer,
        group: &str,
        page: u32,
        projects: Value,
        next_page: Option<u32>,
    ) {
        let next = next_page.map(|n| n.to_string()).unwrap_or_default();
        Mock::given(method("GET"))
            .and(path(group_projects(group)))
            .and(query_param("page", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(projects)
                    .insert_header("X-Next-Page", next.as_str()),
            )
            .mount(server)
            .await;
    }

    /// Serve every listing request for `group` with `status` and `body`.
    pub async fn mount_gitlab_error(server: &MockServer, group: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(group_projects(group)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    /// Serve `repos` as the single page of the GitHub listing of `org`.
    pub async fn mount_github_repos(server: &MockServer, org: &str, repos: Value) {
        Mock::given(method("GET"))
            .and(path(org_repos(org)))
            .respond_with(ResponseTemplate::new(200).set_body_json(repos))
            .mount(server)
            .await;
    }

    /// Answer repository creation in `org` with `status` and `body`.
    pub async fn mount_github_create(server: &MockServer, org: &str, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(org_repos(org)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }
}

/// Value of query parameter `key` in a recorded request.
pub fn query_value(request: &Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
