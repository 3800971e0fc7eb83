mod api;
mod client;
mod comment;
mod pr;

// Explicit re-exports - only export what is actually used
pub use api::{GhReviewApi, LineCommentRequest, PullRequestContext, ReviewApi};
pub use client::{detect_repo, DetectRepoError};
pub use comment::{fetch_review_comments, ReviewComment};
pub use pr::{fetch_changed_files, fetch_file_content, fetch_pr, Branch, ChangedFile, PullRequest, User};
