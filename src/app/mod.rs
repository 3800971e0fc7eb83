//! Per-file review session.
//!
//! Selecting a file parses its patch and derives the diff model; threads are
//! re-derived whenever the comment list or the rendering mode changes, and
//! the comment overlay consumes both.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{Config, Credentials};
use crate::diff::{FileContents, ParsedPatch, PatchDiffModel, RenderMode, Side};
use crate::github::{ChangedFile, PullRequestContext, ReviewApi, ReviewComment};
use crate::loader::{CommentSubmitResult, PrData};
use crate::thread::{anchor_threads, build_threads, CommentThread};

mod overlay;
mod types;
pub use overlay::{CommentOverlay, DetachedSubmission, SubmitContext};
pub use types::*;


/// One changed file of the pull request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewFile {
    pub path: String,
    /// `None` for binary files and oversized diffs
    pub patch: Option<String>,
    /// Loaded on demand for full-file rendering
    pub contents: Option<FileContents>,
}

impl From<&ChangedFile> for ReviewFile {
    fn from(file: &ChangedFile) -> Self {
        Self {
            path: file.filename.clone(),
            patch: file.patch.clone(),
            contents: None,
        }
    }
}

pub struct App {
    config: Config,
    api: Arc<dyn ReviewApi>,
    pr: Option<PullRequestContext>,
    credentials: Option<Credentials>,
    files: Vec<ReviewFile>,
    selected_file: Option<usize>,
    render_mode: RenderMode,
    comments: Vec<ReviewComment>,
    model: Option<PatchDiffModel>,
    /// Threads of the selected file in editor coordinates
    threads: Vec<CommentThread>,
    overlay: CommentOverlay,
    /// Submissions started before the last overlay reset
    detached: Vec<DetachedSubmission>,
}

impl App {
    pub fn new(config: Config, api: Arc<dyn ReviewApi>) -> Self {
        let render_mode = config.diff.render_mode();
        let overlay = CommentOverlay::new(OverlayGeometry::with_height(config.overlay.height));
        Self {
            config,
            api,
            pr: None,
            credentials: None,
            files: Vec::new(),
            selected_file: None,
            render_mode,
            comments: Vec::new(),
            model: None,
            threads: Vec::new(),
            overlay,
            detached: Vec::new(),
        }
    }

    /// Session over fetched PR data
    pub fn with_pr_data(
        config: Config,
        api: Arc<dyn ReviewApi>,
        repo: &str,
        data: PrData,
        credentials: Credentials,
    ) -> Self {
        let mut app = Self::new(config, api);
        app.pr = Some(data.context(repo));
        app.credentials = Some(credentials);
        app.files = data.files.iter().map(ReviewFile::from).collect();
        app.comments = data.comments;
        app
    }

    pub fn set_pull_request(&mut self, pr: PullRequestContext) {
        self.pr = Some(pr);
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    pub fn set_files(&mut self, files: Vec<ReviewFile>) {
        self.files = files;
        self.selected_file = None;
        self.model = None;
        self.threads.clear();
        self.reset_overlay();
    }

    pub fn files(&self) -> &[ReviewFile] {
        &self.files
    }

    pub fn file_index(&self, path: &str) -> Option<usize> {
        self.files.iter().position(|f| f.path == path)
    }

    pub fn selected_file(&self) -> Option<&ReviewFile> {
        self.selected_file.and_then(|i| self.files.get(i))
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn model(&self) -> Option<&PatchDiffModel> {
        self.model.as_ref()
    }

    pub fn parsed(&self) -> Option<&ParsedPatch> {
        self.model.as_ref().map(|m| m.parsed())
    }

    pub fn comments(&self) -> &[ReviewComment] {
        &self.comments
    }

    pub fn threads(&self) -> &[CommentThread] {
        &self.threads
    }

    pub fn overlay(&self) -> &CommentOverlay {
        &self.overlay
    }

    /// Whether any submission result is still outstanding
    pub fn has_pending_submissions(&self) -> bool {
        self.overlay.is_submitting() || !self.detached.is_empty()
    }

    fn reset_overlay(&mut self) {
        if let Some(detached) = self.overlay.reset() {
            self.detached.push(detached);
        }
    }

    /// Switch to another file. Always resets the overlay.
    pub fn select_file(&mut self, index: usize) {
        if index >= self.files.len() {
            warn!(index, "file index out of range");
            return;
        }
        self.reset_overlay();
        self.selected_file = Some(index);
        self.rebuild_model();
    }

    /// Full contents arrived for the file at `index`
    pub fn set_file_contents(&mut self, index: usize, contents: FileContents) {
        let Some(file) = self.files.get_mut(index) else {
            return;
        };
        file.contents = Some(contents);
        if self.selected_file == Some(index) && self.render_mode.is_full_file() {
            self.rebuild_model();
        }
    }

    pub fn set_render_mode(&mut self, render_mode: RenderMode) {
        self.render_mode = render_mode;
        self.reset_overlay();
        self.rebuild_model();
    }

    pub fn toggle_full_file(&mut self) {
        let render_mode = if self.render_mode.is_full_file() {
            RenderMode::DiffOnly
        } else {
            RenderMode::FullFile {
                collapse_unchanged: self.config.diff.collapse_unchanged,
            }
        };
        self.set_render_mode(render_mode);
    }

    /// Replace the comment list (data refresh)
    pub fn set_comments(&mut self, comments: Vec<ReviewComment>) {
        self.comments = comments;
        self.rebuild_threads();
    }

    fn rebuild_model(&mut self) {
        self.model = self.selected_file().map(|file| {
            PatchDiffModel::new(
                file.patch.as_deref().unwrap_or_default(),
                self.render_mode,
                file.contents.clone(),
            )
            .with_context_lines(self.config.diff.context_lines)
        });
        self.rebuild_threads();
    }

    fn rebuild_threads(&mut self) {
        let threads = match (self.selected_file(), self.model.as_ref()) {
            (Some(file), Some(model)) => {
                let file_comments: Vec<ReviewComment> = self
                    .comments
                    .iter()
                    .filter(|c| c.path == file.path)
                    .cloned()
                    .collect();
                let threads = anchor_threads(&build_threads(&file_comments), model);
                debug!(path = %file.path, threads = threads.len(), "threads rebuilt");
                threads
            }
            _ => Vec::new(),
        };

        self.threads = threads;
        self.overlay.sync_threads(&self.threads);
    }

    pub fn target_line(&mut self, line_number: usize, side: Side) {
        self.overlay.target_line(line_number, side, &self.threads);
    }

    pub fn target_range(&mut self, selection: MultilineSelection, side: Side) {
        self.overlay.target_range(selection, side, &self.threads);
    }

    pub fn begin_suggestion(&mut self) -> bool {
        match self.model.as_ref() {
            Some(model) => self.overlay.begin_suggestion(model),
            None => false,
        }
    }

    pub fn submit(&mut self) -> SubmitStart {
        let (Some(file), Some(model)) = (
            self.selected_file.and_then(|i| self.files.get(i)),
            self.model.as_ref(),
        ) else {
            return SubmitStart::Ignored;
        };

        self.overlay.submit(SubmitContext {
            path: &file.path,
            has_patch: model.has_patch(),
            model,
            api: Arc::clone(&self.api),
            pr: self.pr.as_ref(),
            credentials: self.credentials.as_ref(),
        })
    }

    fn apply_outcome(&mut self, outcome: &SubmitOutcome) {
        if let SubmitOutcome::Posted(comment) = outcome {
            self.comments.push(comment.clone());
            self.rebuild_threads();
        }
    }

    /// Result of a detached submission only feeds the comment list.
    fn apply_detached(&mut self, result: CommentSubmitResult) -> SubmitOutcome {
        let outcome = match result {
            CommentSubmitResult::Success(comment) => SubmitOutcome::Posted(comment),
            CommentSubmitResult::Error(e) => {
                warn!("comment submission failed after overlay reset: {}", e);
                SubmitOutcome::Failed
            }
        };
        self.apply_outcome(&outcome);
        outcome
    }

    fn poll_detached(&mut self) -> Option<SubmitOutcome> {
        let (index, result) = self
            .detached
            .iter_mut()
            .enumerate()
            .find_map(|(i, d)| d.try_result().map(|result| (i, result)))?;
        self.detached.swap_remove(index);
        Some(self.apply_detached(result))
    }

    /// Apply a finished submission, if one is ready
    pub fn poll_submit_updates(&mut self) -> Option<SubmitOutcome> {
        if let Some(outcome) = self.poll_detached() {
            return Some(outcome);
        }
        let outcome = self.overlay.poll_submit_updates()?;
        self.apply_outcome(&outcome);
        Some(outcome)
    }

    /// Wait for the oldest outstanding submission and apply its result.
    pub async fn wait_for_submission(&mut self) -> Option<SubmitOutcome> {
        if !self.detached.is_empty() {
            let mut detached = self.detached.remove(0);
            let result = detached.result().await;
            return Some(self.apply_detached(result));
        }
        let outcome = self.overlay.wait_for_submission().await?;
        self.apply_outcome(&outcome);
        Some(outcome)
    }

    pub fn handle_command(&mut self, command: ReviewCommand) {
        match command {
            ReviewCommand::SelectFile(index) => self.select_file(index),
            ReviewCommand::ToggleFullFile => self.toggle_full_file(),
            ReviewCommand::TargetLine { line, side } => self.target_line(line, side),
            ReviewCommand::TargetRange { selection, side } => self.target_range(selection, side),
            ReviewCommand::EditDraft(draft) => self.overlay.set_draft(draft),
            ReviewCommand::BeginSuggestion => {
                if !self.begin_suggestion() {
                    debug!("suggestion unavailable for the current target");
                }
            }
            ReviewCommand::ResizeOverlay(height) => self.overlay.resize(height),
            ReviewCommand::Close => self.overlay.close(),
            ReviewCommand::Submit => {
                let start = self.submit();
                debug!(?start, "submit command");
            }
            ReviewCommand::Resync(comments) => self.set_comments(comments),
        }
    }
}
