use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::client::{gh_api_paginate, gh_api_post, FieldValue};
use super::pr::User;
use crate::diff::Side;

/// ジェネリックなfetch & parse関数（ページネーション対応）
async fn fetch_and_parse<T: DeserializeOwned>(
    endpoint: &str,
    token: Option<&str>,
    error_context: &'static str,
) -> Result<T> {
    let json = gh_api_paginate(endpoint, token).await?;
    serde_json::from_value(json).context(error_context)
}

/// A pull request review comment as returned by the review API.
///
/// Line fields follow the API: `line`/`start_line` address the head side,
/// `original_line`/`original_start_line` the base side, and
/// `position`/`original_position` the legacy patch offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub original_line: Option<u32>,
    #[serde(default)]
    pub start_line: Option<u32>,
    #[serde(default)]
    pub original_start_line: Option<u32>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub original_position: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub path: String,
    pub body: String,
    #[serde(default)]
    pub user: Option<User>,
}

impl ReviewComment {
    pub fn author(&self) -> &str {
        self.user.as_ref().map_or("ghost", |u| u.login.as_str())
    }
}

pub async fn fetch_review_comments(
    repo: &str,
    pr_number: u32,
    token: Option<&str>,
) -> Result<Vec<ReviewComment>> {
    fetch_and_parse(
        &format!("repos/{}/pulls/{}/comments?per_page=100", repo, pr_number),
        token,
        "Failed to parse review comments response",
    )
    .await
}

/// 単一行コメントを patch 内オフセット (position) で作成する。
pub async fn create_review_comment(
    repo: &str,
    pr_number: u32,
    commit_id: &str,
    path: &str,
    position: u32,
    body: &str,
    token: Option<&str>,
) -> Result<ReviewComment> {
    let endpoint = format!("repos/{}/pulls/{}/comments", repo, pr_number);
    let position_str = position.to_string();
    let json = gh_api_post(
        &endpoint,
        &[
            ("body", FieldValue::String(body)),
            ("commit_id", FieldValue::String(commit_id)),
            ("path", FieldValue::String(path)),
            ("position", FieldValue::Raw(&position_str)),
        ],
        token,
    )
    .await?;
    serde_json::from_value(json).context("Failed to parse created comment response")
}

/// Line/side addressed comment, with the hunk text sent as `diff_hunk`.
///
/// `start` is only sent for multi-line comments (start line differs from `line`).
#[allow(clippy::too_many_arguments)]
pub async fn create_line_comment(
    repo: &str,
    pr_number: u32,
    commit_id: &str,
    path: &str,
    line: u32,
    side: Side,
    start: Option<(u32, Side)>,
    diff_hunk: &str,
    body: &str,
    token: Option<&str>,
) -> Result<ReviewComment> {
    let endpoint = format!("repos/{}/pulls/{}/comments", repo, pr_number);
    let line_str = line.to_string();
    let start_line_str = start.map(|(start_line, _)| start_line.to_string());

    let mut fields = vec![
        ("body", FieldValue::String(body)),
        ("commit_id", FieldValue::String(commit_id)),
        ("path", FieldValue::String(path)),
        ("line", FieldValue::Raw(&line_str)),
        ("side", FieldValue::String(side.as_str())),
        ("diff_hunk", FieldValue::String(diff_hunk)),
        ("subject_type", FieldValue::String("line")),
    ];
    if let (Some((_, start_side)), Some(start_line_str)) = (start, start_line_str.as_deref()) {
        fields.push(("start_line", FieldValue::Raw(start_line_str)));
        fields.push(("start_side", FieldValue::String(start_side.as_str())));
    }

    let json = gh_api_post(&endpoint, &fields, token).await?;
    serde_json::from_value(json).context("Failed to parse created line comment response")
}

pub async fn create_reply_comment(
    repo: &str,
    pr_number: u32,
    comment_id: u64,
    body: &str,
    token: Option<&str>,
) -> Result<ReviewComment> {
    let endpoint = format!(
        "repos/{}/pulls/{}/comments/{}/replies",
        repo, pr_number, comment_id
    );
    let json = gh_api_post(&endpoint, &[("body", FieldValue::String(body))], token).await?;
    serde_json::from_value(json).context("Failed to parse reply comment response")
}
