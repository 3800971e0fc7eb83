use thiserror::Error;

use crate::diff::Side;
use crate::github::ReviewComment;

/// 議論対象の行（または範囲）と side
///
/// Line numbers are editor lines. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentTarget {
    pub line_number: usize,
    pub side: Side,
    pub start_line_number: Option<usize>,
    pub end_line_number: Option<usize>,
}

impl CommentTarget {
    pub fn line(line_number: usize, side: Side) -> Self {
        Self {
            line_number,
            side,
            start_line_number: None,
            end_line_number: None,
        }
    }

    pub fn start(&self) -> usize {
        self.start_line_number.unwrap_or(self.line_number)
    }

    pub fn end(&self) -> usize {
        self.end_line_number.unwrap_or(self.line_number)
    }

    pub fn is_multiline(&self) -> bool {
        self.start() != self.end()
    }
}

/// The open overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveOverlay {
    /// Drafting a new comment
    New { target: CommentTarget },
    /// Viewing (and replying to) an existing thread
    Thread { thread_id: u64, target: CommentTarget },
}

impl ActiveOverlay {
    pub fn target(&self) -> &CommentTarget {
        match self {
            ActiveOverlay::New { target } | ActiveOverlay::Thread { target, .. } => target,
        }
    }
}

/// 複数行選択の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultilineSelection {
    /// 選択開始行（editor line）
    pub anchor_line: usize,
    /// 選択終了行（editor line）。カーソル移動で更新。
    pub cursor_line: usize,
}

impl MultilineSelection {
    /// 選択範囲の先頭行（小さい方）
    pub fn start(&self) -> usize {
        self.anchor_line.min(self.cursor_line)
    }

    /// 選択範囲の末尾行（大きい方）
    pub fn end(&self) -> usize {
        self.anchor_line.max(self.cursor_line)
    }
}

/// Overlay placement. Cosmetic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayGeometry {
    pub height: u16,
    pub scroll: u16,
}

impl OverlayGeometry {
    pub fn with_height(height: u16) -> Self {
        Self { height, scroll: 0 }
    }
}

impl Default for OverlayGeometry {
    fn default() -> Self {
        Self::with_height(12)
    }
}

/// Errors shown in the overlay
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("No diff hunk found for this line; comments can only be placed within the changed hunks")]
    MissingDiffHunk,
    #[error("Failed to submit comment: {0}")]
    SubmissionFailed(String),
}

/// What `submit` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStart {
    /// Preconditions not met (or a submission is already in flight); nothing changed
    Ignored,
    /// Aborted before any API call; the overlay error is set
    Rejected,
    /// The API call is in flight
    Started,
}

/// Result of a finished submission as seen by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The comment now exists remotely
    Posted(ReviewComment),
    Failed,
}

/// Commands driving a review session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    SelectFile(usize),
    ToggleFullFile,
    TargetLine { line: usize, side: Side },
    TargetRange { selection: MultilineSelection, side: Side },
    EditDraft(String),
    BeginSuggestion,
    ResizeOverlay(u16),
    Close,
    Submit,
    /// Replace the comment list after a data refresh
    Resync(Vec<ReviewComment>),
}
