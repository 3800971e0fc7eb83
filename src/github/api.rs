//! Review API seam used by the comment overlay.

use anyhow::Result;
use async_trait::async_trait;

use super::comment::{create_line_comment, create_reply_comment, create_review_comment, ReviewComment};
use crate::config::Credentials;
use crate::diff::Side;

/// Identifies the pull request (and head commit) comments are posted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestContext {
    pub repo: String,
    pub pr_number: u32,
    pub commit_id: String,
}

/// A comment addressed by file line and side, with hunk context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCommentRequest {
    pub path: String,
    pub line: u32,
    pub side: Side,
    pub diff_hunk: String,
    pub body: String,
    /// Set only for multi-line comments
    pub start_line: Option<u32>,
    pub start_side: Option<Side>,
}

/// Remote operations the overlay submits through.
#[async_trait]
pub trait ReviewApi: Send + Sync {
    async fn create_comment_by_position(
        &self,
        ctx: &PullRequestContext,
        credentials: &Credentials,
        path: &str,
        side: Side,
        position: u32,
        body: &str,
    ) -> Result<ReviewComment>;

    async fn create_comment_by_line(
        &self,
        ctx: &PullRequestContext,
        credentials: &Credentials,
        request: &LineCommentRequest,
    ) -> Result<ReviewComment>;

    async fn reply_to_comment(
        &self,
        ctx: &PullRequestContext,
        credentials: &Credentials,
        parent_id: u64,
        body: &str,
    ) -> Result<ReviewComment>;
}

/// [`ReviewApi`] over the gh CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct GhReviewApi;

#[async_trait]
impl ReviewApi for GhReviewApi {
    async fn create_comment_by_position(
        &self,
        ctx: &PullRequestContext,
        credentials: &Credentials,
        path: &str,
        _side: Side,
        position: u32,
        body: &str,
    ) -> Result<ReviewComment> {
        // position は patch 全体の通し番号なので side は送らない
        create_review_comment(
            &ctx.repo,
            ctx.pr_number,
            &ctx.commit_id,
            path,
            position,
            body,
            credentials.token(),
        )
        .await
    }

    async fn create_comment_by_line(
        &self,
        ctx: &PullRequestContext,
        credentials: &Credentials,
        request: &LineCommentRequest,
    ) -> Result<ReviewComment> {
        let start = request
            .start_line
            .map(|line| (line, request.start_side.unwrap_or(request.side)));
        create_line_comment(
            &ctx.repo,
            ctx.pr_number,
            &ctx.commit_id,
            &request.path,
            request.line,
            request.side,
            start,
            &request.diff_hunk,
            &request.body,
            credentials.token(),
        )
        .await
    }

    async fn reply_to_comment(
        &self,
        ctx: &PullRequestContext,
        credentials: &Credentials,
        parent_id: u64,
        body: &str,
    ) -> Result<ReviewComment> {
        create_reply_comment(&ctx.repo, ctx.pr_number, parent_id, body, credentials.token()).await
    }
}
