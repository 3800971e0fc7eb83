use anyhow::Result;
use tracing::warn;

use crate::config::Credentials;
use crate::diff::FileContents;
use crate::github::{self, ChangedFile, PullRequest, PullRequestContext, ReviewComment};

/// PR データ一式
#[derive(Debug, Clone)]
pub struct PrData {
    pub pr: PullRequest,
    pub files: Vec<ChangedFile>,
    pub comments: Vec<ReviewComment>,
}

impl PrData {
    pub fn context(&self, repo: &str) -> PullRequestContext {
        PullRequestContext {
            repo: repo.to_string(),
            pr_number: self.pr.number,
            commit_id: self.pr.head.sha.clone(),
        }
    }
}

/// コメント送信結果
#[derive(Debug)]
pub enum CommentSubmitResult {
    /// 送信成功（作成されたコメント）
    Success(ReviewComment),
    /// エラー
    Error(String),
}

/// PR, changed files and review comments, fetched concurrently
pub async fn fetch_pr_data(
    repo: &str,
    pr_number: u32,
    credentials: &Credentials,
) -> Result<PrData> {
    let token = credentials.token();
    let (pr, files, comments) = tokio::try_join!(
        github::fetch_pr(repo, pr_number, token),
        github::fetch_changed_files(repo, pr_number, token),
        github::fetch_review_comments(repo, pr_number, token),
    )?;

    Ok(PrData {
        pr,
        files,
        comments,
    })
}

/// Full contents of both versions of `file`.
///
/// A side that fails to load is left empty; the model then maps nothing on
/// that side instead of failing the whole file.
pub async fn fetch_file_contents(
    repo: &str,
    pr: &PullRequest,
    file: &ChangedFile,
    credentials: &Credentials,
) -> FileContents {
    let token = credentials.token();

    let original = async {
        if !file.exists_on_base() {
            return None;
        }
        github::fetch_file_content(repo, file.base_path(), &pr.base.sha, token)
            .await
            .map_err(|e| warn!(path = file.base_path(), "base contents unavailable: {:#}", e))
            .ok()
    };
    let modified = async {
        if !file.exists_on_head() {
            return None;
        }
        github::fetch_file_content(repo, &file.filename, &pr.head.sha, token)
            .await
            .map_err(|e| warn!(path = %file.filename, "head contents unavailable: {:#}", e))
            .ok()
    };

    let (original, modified) = tokio::join!(original, modified);
    FileContents { original, modified }
}
