//! Threaded discussion rebuilt from a flat review comment list.
//!
//! [`build_threads`] works in file coordinates. [`anchor_threads`] moves
//! threads into the editor coordinates of the current rendering.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::diff::{DiffModel, Side};
use crate::github::ReviewComment;

/// A root comment plus its replies, anchored to a line range on one side.
///
/// `start_line_number <= end_line_number` and `line_number == end_line_number`
/// hold for every thread produced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    /// Id of the root comment
    pub id: u64,
    pub side: Side,
    pub line_number: usize,
    pub start_line_number: usize,
    pub end_line_number: usize,
    /// Root and replies, oldest first
    pub comments: Vec<ReviewComment>,
}

impl CommentThread {
    pub fn root(&self) -> Option<&ReviewComment> {
        self.comments.iter().find(|c| c.id == self.id)
    }

    pub fn contains(&self, line_number: usize, side: Side) -> bool {
        self.side == side
            && self.start_line_number <= line_number
            && line_number <= self.end_line_number
    }
}

fn resolve_side(comment: &ReviewComment) -> Side {
    match (
        comment.side.as_deref().and_then(Side::from_api),
        comment.original_line,
        comment.line,
    ) {
        (Some(side), _, _) => side,
        (None, Some(_), None) => Side::Left,
        (None, _, _) => Side::Right,
    }
}

fn anchor_line(comment: &ReviewComment, side: Side) -> Option<u32> {
    let line = match side {
        Side::Left => comment.original_line,
        Side::Right => comment.line,
    };
    line.filter(|&l| l > 0)
}

/// (start, end) candidates for `side`, falling back to the other side's
/// fields and then to `anchor`.
fn line_range(comment: &ReviewComment, side: Side, anchor: u32) -> (u32, u32) {
    let (start, end) = match side {
        Side::Left => (
            comment.original_start_line.or(comment.start_line),
            comment.original_line.or(comment.line),
        ),
        Side::Right => (
            comment.start_line.or(comment.original_start_line),
            comment.line.or(comment.original_line),
        ),
    };
    let start = start.filter(|&l| l > 0).unwrap_or(anchor);
    let end = end.filter(|&l| l > 0).unwrap_or(anchor);
    (start.min(end), start.max(end))
}

/// Group comments into threads ordered by `line_number`.
///
/// Roots without a usable anchor line on their side are left out.
pub fn build_threads(comments: &[ReviewComment]) -> Vec<CommentThread> {
    let mut roots = Vec::new();
    let mut replies: HashMap<u64, Vec<&ReviewComment>> = HashMap::new();
    for comment in comments {
        match comment.in_reply_to_id {
            Some(parent) => replies.entry(parent).or_default().push(comment),
            None => roots.push(comment),
        }
    }

    let mut threads: Vec<CommentThread> = roots
        .into_iter()
        .filter_map(|root| {
            let side = resolve_side(root);
            let Some(anchor) = anchor_line(root, side) else {
                debug!(comment_id = root.id, %side, "comment has no anchor line, not shown inline");
                return None;
            };

            let mut thread_comments = vec![root.clone()];
            if let Some(children) = replies.get(&root.id) {
                thread_comments.extend(children.iter().map(|c| (*c).clone()));
            }
            thread_comments.sort_by_key(|c| c.created_at);

            let (start, end) = line_range(root, side, anchor);
            Some(CommentThread {
                id: root.id,
                side,
                line_number: end as usize,
                start_line_number: start as usize,
                end_line_number: end as usize,
                comments: thread_comments,
            })
        })
        .collect();

    threads.sort_by_key(|t| t.line_number);
    threads
}

fn anchor_thread(thread: &CommentThread, model: &dyn DiffModel) -> Option<CommentThread> {
    let to_editor = |file_line: usize| {
        u32::try_from(file_line)
            .ok()
            .and_then(|line| model.map_line_for_side(line, thread.side))
    };

    let end = to_editor(thread.end_line_number).or_else(|| {
        let root = thread.root()?;
        let position = root.position.or(root.original_position)?;
        model.map_position_for_side(position, thread.side)
    });
    let Some(end) = end else {
        debug!(thread_id = thread.id, "thread cannot be placed in the current rendering");
        return None;
    };
    let start = to_editor(thread.start_line_number)
        .filter(|&start| start <= end)
        .unwrap_or(end);

    Some(CommentThread {
        line_number: end,
        start_line_number: start,
        end_line_number: end,
        ..thread.clone()
    })
}

/// Translate file-coordinate threads into editor lines of `model`.
///
/// Threads whose end line is not rendered fall back to the comment's diff
/// position; threads that still cannot be placed are dropped.
pub fn anchor_threads(threads: &[CommentThread], model: &dyn DiffModel) -> Vec<CommentThread> {
    let mut anchored: Vec<CommentThread> = threads
        .iter()
        .filter_map(|thread| anchor_thread(thread, model))
        .collect();
    anchored.sort_by_key(|t| t.line_number);
    anchored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{FileContents, PatchDiffModel, RenderMode};
    use chrono::DateTime;

    fn comment(id: u64, created: i64) -> ReviewComment {
        ReviewComment {
            id,
            in_reply_to_id: None,
            side: None,
            line: None,
            original_line: None,
            start_line: None,
            original_start_line: None,
            position: None,
            original_position: None,
            created_at: DateTime::from_timestamp(created, 0).unwrap(),
            path: "src/lib.rs".to_string(),
            body: format!("comment {}", id),
            user: None,
        }
    }

    fn on_line(id: u64, line: u32) -> ReviewComment {
        ReviewComment {
            line: Some(line),
            ..comment(id, id as i64)
        }
    }

    #[test]
    fn test_side_defaults_to_base_for_original_line_only() {
        let c = ReviewComment {
            original_line: Some(5),
            ..comment(1, 0)
        };
        let threads = build_threads(&[c]);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].side, Side::Left);
        assert_eq!(threads[0].line_number, 5);
        assert_eq!(threads[0].start_line_number, 5);
    }

    #[test]
    fn test_side_resolution_table() {
        let explicit = ReviewComment {
            side: Some("left".to_string()),
            original_line: Some(3),
            line: Some(9),
            ..comment(1, 0)
        };
        let unknown_side = ReviewComment {
            side: Some("BOTH".to_string()),
            original_line: Some(3),
            line: Some(9),
            ..comment(2, 0)
        };
        let both_lines = ReviewComment {
            original_line: Some(3),
            line: Some(4),
            ..comment(3, 0)
        };
        assert_eq!(resolve_side(&explicit), Side::Left);
        assert_eq!(resolve_side(&unknown_side), Side::Right);
        assert_eq!(resolve_side(&both_lines), Side::Right);
        assert_eq!(resolve_side(&comment(4, 0)), Side::Right);
    }

    #[test]
    fn test_roots_without_anchor_are_discarded() {
        let outdated = comment(1, 0);
        let zero = on_line(2, 0);
        let explicit_left_without_original = ReviewComment {
            side: Some("LEFT".to_string()),
            line: Some(4),
            ..comment(3, 0)
        };
        let threads = build_threads(&[outdated, zero, explicit_left_without_original, on_line(4, 7)]);
        assert_eq!(threads.iter().map(|t| t.id).collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_replies_are_grouped_and_ordered_by_creation() {
        let root = on_line(1, 10);
        let late = ReviewComment {
            in_reply_to_id: Some(1),
            ..comment(2, 500)
        };
        let early = ReviewComment {
            in_reply_to_id: Some(1),
            ..comment(3, 100)
        };
        let orphan = ReviewComment {
            in_reply_to_id: Some(99),
            ..comment(4, 50)
        };

        let threads = build_threads(&[late, root, orphan, early]);
        assert_eq!(threads.len(), 1);
        let ids: Vec<u64> = threads[0].comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert_eq!(threads[0].root().map(|c| c.id), Some(1));
    }

    #[test]
    fn test_multiline_range_is_normalized() {
        let reversed = ReviewComment {
            line: Some(10),
            start_line: Some(14),
            ..comment(1, 0)
        };
        let left_fallback = ReviewComment {
            side: Some("LEFT".to_string()),
            original_line: Some(20),
            start_line: Some(17),
            ..comment(2, 0)
        };
        let threads = build_threads(&[reversed, left_fallback]);

        assert_eq!(
            (threads[0].start_line_number, threads[0].end_line_number),
            (10, 14)
        );
        assert_eq!(
            (threads[1].start_line_number, threads[1].end_line_number),
            (17, 20)
        );
        for thread in &threads {
            assert!(thread.start_line_number <= thread.end_line_number);
            assert_eq!(thread.line_number, thread.end_line_number);
        }
    }

    #[test]
    fn test_threads_sorted_by_line() {
        let threads = build_threads(&[on_line(1, 30), on_line(2, 4), on_line(3, 12)]);
        let lines: Vec<usize> = threads.iter().map(|t| t.line_number).collect();
        assert_eq!(lines, vec![4, 12, 30]);
    }

    #[test]
    fn test_contains_respects_side() {
        let thread = &build_threads(&[ReviewComment {
            line: Some(8),
            start_line: Some(6),
            ..comment(1, 0)
        }])[0];
        assert!(thread.contains(6, Side::Right));
        assert!(thread.contains(8, Side::Right));
        assert!(!thread.contains(9, Side::Right));
        assert!(!thread.contains(7, Side::Left));
    }

    const PATCH: &str = "@@ -10,3 +10,4 @@\n a\n-b\n+B\n+B2\n c";

    #[test]
    fn test_anchor_threads_diff_only() {
        let model = PatchDiffModel::new(PATCH, RenderMode::DiffOnly, None);
        // rows: (10,10) (11,11) (-,12) (12,13)
        let threads = build_threads(&[
            ReviewComment {
                line: Some(12),
                start_line: Some(10),
                ..comment(1, 0)
            },
            ReviewComment {
                original_line: Some(11),
                ..comment(2, 0)
            },
            on_line(3, 40),
        ]);

        let anchored = anchor_threads(&threads, &model);
        assert_eq!(anchored.len(), 2);
        assert_eq!(
            (anchored[0].id, anchored[0].start_line_number, anchored[0].line_number),
            (2, 2, 2)
        );
        assert_eq!(
            (anchored[1].id, anchored[1].start_line_number, anchored[1].line_number),
            (1, 1, 3)
        );
    }

    #[test]
    fn test_anchor_threads_falls_back_to_position() {
        let model = PatchDiffModel::new(PATCH, RenderMode::DiffOnly, None);
        // line drifted out of the patch, but the position still points at "+B2"
        let threads = build_threads(&[ReviewComment {
            line: Some(99),
            position: Some(4),
            ..comment(1, 0)
        }]);
        let anchored = anchor_threads(&threads, &model);
        assert_eq!(anchored.len(), 1);
        assert_eq!(anchored[0].line_number, 3);
        assert_eq!(anchored[0].start_line_number, 3);
    }

    #[test]
    fn test_anchor_threads_full_file_keeps_file_lines() {
        let contents = FileContents {
            original: Some((1..=20).map(|i| format!("l{}\n", i)).collect()),
            modified: Some((1..=21).map(|i| format!("l{}\n", i)).collect()),
        };
        let model = PatchDiffModel::new(
            PATCH,
            RenderMode::FullFile {
                collapse_unchanged: false,
            },
            Some(contents),
        );
        let threads = build_threads(&[on_line(1, 2), on_line(2, 21), on_line(3, 22)]);
        let anchored = anchor_threads(&threads, &model);
        let lines: Vec<usize> = anchored.iter().map(|t| t.line_number).collect();
        assert_eq!(lines, vec![2, 21]);
    }
}
