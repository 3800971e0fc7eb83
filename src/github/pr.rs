use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::client::{gh_api, gh_api_paginate, gh_api_raw};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u32,
    pub title: String,
    pub state: String,
    pub head: Branch,
    pub base: Branch,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub previous_filename: Option<String>,
    pub additions: u32,
    pub deletions: u32,
    /// Absent for binary files and very large diffs
    pub patch: Option<String>,
}

impl ChangedFile {
    /// Path of the file on the base side
    pub fn base_path(&self) -> &str {
        self.previous_filename.as_deref().unwrap_or(&self.filename)
    }

    pub fn exists_on_base(&self) -> bool {
        self.status != "added"
    }

    pub fn exists_on_head(&self) -> bool {
        self.status != "removed"
    }
}

pub async fn fetch_pr(repo: &str, pr_number: u32, token: Option<&str>) -> Result<PullRequest> {
    let endpoint = format!("repos/{}/pulls/{}", repo, pr_number);
    let json = gh_api(&endpoint, token).await?;
    serde_json::from_value(json).context("Failed to parse PR response")
}

pub async fn fetch_changed_files(
    repo: &str,
    pr_number: u32,
    token: Option<&str>,
) -> Result<Vec<ChangedFile>> {
    let endpoint = format!("repos/{}/pulls/{}/files?per_page=100", repo, pr_number);
    let json = gh_api_paginate(&endpoint, token).await?;
    serde_json::from_value(json).context("Failed to parse changed files response")
}

/// Fetch the full content of `path` at `git_ref`
/// Contents API endpoint with each path segment and the ref percent-encoded
fn contents_endpoint(repo: &str, path: &str, git_ref: &str) -> String {
    let encoded_path = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!(
        "repos/{}/contents/{}?ref={}",
        repo,
        encoded_path,
        urlencoding::encode(git_ref)
    )
}

pub async fn fetch_file_content(
    repo: &str,
    path: &str,
    git_ref: &str,
    token: Option<&str>,
) -> Result<String> {
    let endpoint = contents_endpoint(repo, path, git_ref);
    gh_api_raw(&endpoint, "application/vnd.github.raw", token)
        .await
        .with_context(|| format!("Failed to fetch {} at {}", path, git_ref))
}
