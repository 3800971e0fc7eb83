//! Comment overlay: thread lookup, drafting and submission routing.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::Credentials;
use crate::diff::{DiffModel, Side};
use crate::github::{LineCommentRequest, PullRequestContext, ReviewApi};
use crate::loader::CommentSubmitResult;
use crate::thread::CommentThread;

use super::types::*;

/// Everything a submission needs besides the overlay's own state.
pub struct SubmitContext<'a> {
    pub path: &'a str,
    /// Whether the file has patch text at all
    pub has_patch: bool,
    pub model: &'a dyn DiffModel,
    pub api: Arc<dyn ReviewApi>,
    pub pr: Option<&'a PullRequestContext>,
    pub credentials: Option<&'a Credentials>,
}

/// How a submission reaches the review API
#[derive(Debug, Clone, PartialEq, Eq)]
enum SubmitRoute {
    Reply { parent_id: u64 },
    Position { side: Side, position: u32 },
    Line(LineCommentRequest),
}

/// Overlay state that a finished submission applies to
#[derive(Debug, Clone, Copy)]
enum PendingSubmit {
    Reply { thread_id: u64 },
    New { target: CommentTarget },
}

struct InFlight {
    pending: PendingSubmit,
    body: String,
    rx: mpsc::Receiver<CommentSubmitResult>,
}

/// A submission that outlived the overlay state it was started from.
///
/// The API call keeps running; only its result is still owed to the session.
pub struct DetachedSubmission {
    rx: mpsc::Receiver<CommentSubmitResult>,
}

impl DetachedSubmission {
    pub fn try_result(&mut self) -> Option<CommentSubmitResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => Some(task_ended()),
        }
    }

    pub async fn result(&mut self) -> CommentSubmitResult {
        self.rx.recv().await.unwrap_or_else(task_ended)
    }
}

fn task_ended() -> CommentSubmitResult {
    CommentSubmitResult::Error("submission task ended without a result".to_string())
}

pub struct CommentOverlay {
    active: Option<ActiveOverlay>,
    draft: String,
    error: Option<OverlayError>,
    submitting: bool,
    geometry: OverlayGeometry,
    default_geometry: OverlayGeometry,
    in_flight: Option<InFlight>,
}

impl Default for CommentOverlay {
    fn default() -> Self {
        Self::new(OverlayGeometry::default())
    }
}

impl CommentOverlay {
    pub fn new(default_geometry: OverlayGeometry) -> Self {
        Self {
            active: None,
            draft: String::new(),
            error: None,
            submitting: false,
            geometry: default_geometry,
            default_geometry,
            in_flight: None,
        }
    }

    pub fn active(&self) -> Option<&ActiveOverlay> {
        self.active.as_ref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn error(&self) -> Option<&OverlayError> {
        self.error.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn geometry(&self) -> OverlayGeometry {
        self.geometry
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    pub fn resize(&mut self, height: u16) {
        self.geometry.height = height;
    }

    fn open(&mut self, overlay: ActiveOverlay) {
        self.active = Some(overlay);
        self.draft.clear();
        self.error = None;
    }

    /// Open the thread covering `line_number` on `side`, or a new comment there.
    pub fn target_line(&mut self, line_number: usize, side: Side, threads: &[CommentThread]) {
        match threads.iter().find(|t| t.contains(line_number, side)) {
            Some(thread) => self.open(ActiveOverlay::Thread {
                thread_id: thread.id,
                target: thread_target(thread),
            }),
            None => self.open(ActiveOverlay::New {
                target: CommentTarget::line(line_number, side),
            }),
        }
    }

    /// Open a new multi-line comment over `selection`, or the thread
    /// covering its last line.
    pub fn target_range(
        &mut self,
        selection: MultilineSelection,
        side: Side,
        threads: &[CommentThread],
    ) {
        let (start, end) = (selection.start(), selection.end());
        if start == end || threads.iter().any(|t| t.contains(end, side)) {
            self.target_line(end, side, threads);
            return;
        }
        self.open(ActiveOverlay::New {
            target: CommentTarget {
                line_number: end,
                side,
                start_line_number: Some(start),
                end_line_number: Some(end),
            },
        });
    }

    /// Pre-fill the draft with a suggestion block of the targeted head lines.
    ///
    /// Returns false when the target is not on the head side or its text is
    /// not available.
    pub fn begin_suggestion(&mut self, model: &dyn DiffModel) -> bool {
        let Some(target) = self.active.as_ref().map(|a| *a.target()) else {
            return false;
        };
        if target.side != Side::Right {
            return false;
        }
        let lines: Option<Vec<String>> = (target.start()..=target.end())
            .map(|line| model.line_text(line, Side::Right))
            .collect();
        let Some(lines) = lines else {
            return false;
        };
        self.draft = format!("```suggestion\n{}\n```", lines.join("\n"));
        true
    }

    pub fn close(&mut self) {
        self.active = None;
        self.draft.clear();
        self.error = None;
    }

    /// Forget all overlay state.
    ///
    /// An in-flight submission is not cancelled: it is handed back so the
    /// caller can still collect the posted comment.
    pub fn reset(&mut self) -> Option<DetachedSubmission> {
        self.close();
        self.submitting = false;
        self.geometry = self.default_geometry;
        self.in_flight.take().map(|in_flight| {
            debug!("overlay reset detaches in-flight submission");
            DetachedSubmission { rx: in_flight.rx }
        })
    }

    fn route(&self, active: &ActiveOverlay, ctx: &SubmitContext<'_>) -> Result<SubmitRoute, OverlayError> {
        let target = match active {
            ActiveOverlay::Thread { thread_id, .. } => {
                return Ok(SubmitRoute::Reply {
                    parent_id: *thread_id,
                });
            }
            ActiveOverlay::New { target } => target,
        };

        let side = target.side;
        let (start, end) = (target.start(), target.end());

        if !ctx.model.is_full_file() && start == end {
            if let Some(position) = ctx.model.diff_position_for_editor_line(end, side) {
                return Ok(SubmitRoute::Position { side, position });
            }
        }

        if !ctx.has_patch {
            return Err(OverlayError::MissingDiffHunk);
        }
        let line = ctx
            .model
            .map_editor_line_to_file_line(end, side)
            .ok_or(OverlayError::MissingDiffHunk)?;
        let diff_hunk = ctx
            .model
            .diff_hunk_for_line(line, side)
            .ok_or(OverlayError::MissingDiffHunk)?;

        let start_line = if start != end {
            let mapped = ctx.model.map_editor_line_to_file_line(start, side);
            if mapped.is_none() {
                debug!(editor_line = start, "range start has no file line, sending single-line comment");
            }
            mapped.filter(|&s| s < line)
        } else {
            None
        };

        Ok(SubmitRoute::Line(LineCommentRequest {
            path: ctx.path.to_string(),
            line,
            side,
            diff_hunk,
            body: self.draft.clone(),
            start_line,
            start_side: start_line.map(|_| side),
        }))
    }

    /// Start submitting the draft.
    ///
    /// The API call runs on a spawned task; its result is applied by
    /// [`poll_submit_updates`](Self::poll_submit_updates) or
    /// [`wait_for_submission`](Self::wait_for_submission).
    pub fn submit(&mut self, ctx: SubmitContext<'_>) -> SubmitStart {
        // 送信中は再送信しない
        if self.submitting || self.draft.trim().is_empty() {
            return SubmitStart::Ignored;
        }
        let Some(active) = self.active else {
            return SubmitStart::Ignored;
        };
        let (Some(pr), Some(credentials)) = (ctx.pr, ctx.credentials) else {
            debug!("submit ignored: pull request or credentials not resolved");
            return SubmitStart::Ignored;
        };

        let route = match self.route(&active, &ctx) {
            Ok(route) => route,
            Err(e) => {
                warn!(path = ctx.path, "comment not submitted: {}", e);
                self.error = Some(e);
                return SubmitStart::Rejected;
            }
        };

        let pending = match active {
            ActiveOverlay::Thread { thread_id, .. } => PendingSubmit::Reply { thread_id },
            ActiveOverlay::New { target } => PendingSubmit::New { target },
        };
        let body = self.draft.clone();
        let (tx, rx) = mpsc::channel(1);
        self.in_flight = Some(InFlight {
            pending,
            body: body.clone(),
            rx,
        });
        self.submitting = true;
        self.error = None;
        debug!(path = ctx.path, ?route, "submitting comment");

        let api = ctx.api;
        let pr = pr.clone();
        let credentials = credentials.clone();
        let path = ctx.path.to_string();
        tokio::spawn(async move {
            let result = match route {
                SubmitRoute::Reply { parent_id } => {
                    api.reply_to_comment(&pr, &credentials, parent_id, &body).await
                }
                SubmitRoute::Position { side, position } => {
                    api.create_comment_by_position(&pr, &credentials, &path, side, position, &body)
                        .await
                }
                SubmitRoute::Line(request) => {
                    api.create_comment_by_line(&pr, &credentials, &request).await
                }
            };

            let _ = tx
                .send(match result {
                    Ok(comment) => CommentSubmitResult::Success(comment),
                    Err(e) => CommentSubmitResult::Error(format!("{:#}", e)),
                })
                .await;
        });

        SubmitStart::Started
    }

    /// コメント送信結果のポーリング
    pub fn poll_submit_updates(&mut self) -> Option<SubmitOutcome> {
        let in_flight = self.in_flight.as_mut()?;

        let result = match in_flight.rx.try_recv() {
            Ok(result) => result,
            Err(mpsc::error::TryRecvError::Empty) => return None,
            Err(mpsc::error::TryRecvError::Disconnected) => task_ended(),
        };
        Some(self.finish_submit(result))
    }

    /// Wait for the in-flight submission, if any, and apply its result.
    pub async fn wait_for_submission(&mut self) -> Option<SubmitOutcome> {
        let in_flight = self.in_flight.as_mut()?;
        let result = in_flight.rx.recv().await.unwrap_or_else(task_ended);
        Some(self.finish_submit(result))
    }

    fn finish_submit(&mut self, result: CommentSubmitResult) -> SubmitOutcome {
        self.submitting = false;
        let Some(InFlight { pending, body, .. }) = self.in_flight.take() else {
            return SubmitOutcome::Failed;
        };

        match result {
            CommentSubmitResult::Success(comment) => {
                debug!(comment_id = comment.id, "comment submitted");
                match (pending, self.active) {
                    (PendingSubmit::Reply { thread_id }, Some(ActiveOverlay::Thread { thread_id: open, .. }))
                        if open == thread_id =>
                    {
                        self.draft.clear();
                    }
                    (PendingSubmit::New { target }, Some(ActiveOverlay::New { target: open }))
                        if open == target =>
                    {
                        self.active = Some(ActiveOverlay::Thread {
                            thread_id: comment.id,
                            target,
                        });
                        self.draft.clear();
                    }
                    _ => {}
                }
                SubmitOutcome::Posted(comment)
            }
            CommentSubmitResult::Error(e) => {
                warn!("comment submission failed: {}", e);
                self.error = Some(OverlayError::SubmissionFailed(e));
                // 未送信の入力は捨てない
                if self.draft.is_empty() {
                    self.draft = body;
                }
                SubmitOutcome::Failed
            }
        }
    }

    /// Reconcile an open thread overlay with a freshly rebuilt thread list.
    pub fn sync_threads(&mut self, threads: &[CommentThread]) {
        let Some(ActiveOverlay::Thread { thread_id, target }) = self.active else {
            return;
        };
        match threads.iter().find(|t| t.id == thread_id) {
            None => {
                debug!(thread_id, "thread disappeared, closing overlay");
                self.close();
            }
            Some(thread) => {
                let current = thread_target(thread);
                if (current.line_number, current.side) != (target.line_number, target.side) {
                    debug!(
                        thread_id,
                        from = target.line_number,
                        to = current.line_number,
                        "thread moved, updating overlay target"
                    );
                    self.active = Some(ActiveOverlay::Thread {
                        thread_id,
                        target: current,
                    });
                }
            }
        }
    }
}

fn thread_target(thread: &CommentThread) -> CommentTarget {
    CommentTarget {
        line_number: thread.line_number,
        side: thread.side,
        start_line_number: Some(thread.start_line_number),
        end_line_number: Some(thread.end_line_number),
    }
}
