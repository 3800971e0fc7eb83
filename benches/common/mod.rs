//! Common utilities for benchmarks.
//!
//! Provides test data generators with fixed seeds for reproducibility.

#![allow(dead_code)]

use chrono::DateTime;
use diffpin::github::ReviewComment;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Fixed seed for reproducible benchmark data
const SEED: u64 = 42;

/// Create a seeded RNG for reproducible test data
pub fn seeded_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(SEED)
}

/// Generate a realistic diff patch with the specified number of lines.
///
/// Creates a mix of:
/// - Hunk headers (@@ ... @@)
/// - Added lines (+)
/// - Removed lines (-)
/// - Context lines (space)
pub fn generate_diff_patch(line_count: usize) -> String {
    let mut rng = seeded_rng();
    let mut lines = Vec::with_capacity(line_count);
    let mut current_line = 1u32;

    // Start with a hunk header
    lines.push(format!("@@ -1,{} +1,{} @@", line_count / 2, line_count / 2));

    for i in 1..line_count {
        // Every 50 lines, add a new hunk header
        if i % 50 == 0 {
            current_line += 50;
            lines.push(format!(
                "@@ -{},{} +{},{} @@",
                current_line, 30, current_line, 30
            ));
            continue;
        }

        let line_type: u8 = rng.random_range(0..10);
        let content = generate_code_line(&mut rng, i);

        match line_type {
            0..=1 => lines.push(format!("+{}", content)), // 20% added
            2..=3 => lines.push(format!("-{}", content)), // 20% removed
            _ => lines.push(format!(" {}", content)),     // 60% context
        }
    }

    lines.join("\n")
}

/// Generate a line of realistic Rust-like code
fn generate_code_line(rng: &mut ChaCha8Rng, line_num: usize) -> String {
    let templates = [
        "    let x = value.unwrap_or_default();",
        "    fn process_data(input: &str) -> Result<String> {",
        "    }",
        "    if condition { return Ok(()); }",
        "    for item in items.iter() {",
        "    match result {",
        "        Ok(v) => v,",
        "        Err(e) => return Err(e),",
        "    use std::collections::HashMap;",
        "    pub struct Config {",
        "        field: String,",
        "    impl Default for Config {",
        "    #[derive(Debug, Clone)]",
        "    /// Documentation comment",
        "    // Regular comment",
        "    assert_eq!(expected, actual);",
        "    println!(\"Debug: {}\", value);",
        "    self.inner.lock().unwrap()",
        "    async fn fetch_data() -> Result<Vec<u8>> {",
        "    .map(|x| x * 2)",
    ];

    let idx = rng.random_range(0..templates.len());
    format!("{} // line {}", templates[idx], line_num)
}

/// Generate a patch of uniform change blocks (for baseline comparisons).
///
/// Every block deletes one line (sometimes blank) and adds two.
pub fn generate_simple_patch(line_count: usize) -> String {
    let mut lines = Vec::with_capacity(line_count);

    lines.push("@@ -1,100 +1,100 @@".to_string());

    for i in 1..line_count {
        if i % 50 == 0 {
            lines.push(format!("@@ -{},{} +{},{} @@", i, 30, i, 30));
            continue;
        }

        match i % 5 {
            0 | 1 => lines.push(format!("+simple line {}", i)),
            2 if i % 3 == 0 => lines.push("-".to_string()),
            2 => lines.push(format!("-simple line {}", i)),
            _ => lines.push(format!(" simple line {}", i)),
        }
    }

    lines.join("\n")
}

/// Generate review comments spread over `max_line` head/base lines.
///
/// Roughly a third of the comments are replies, some are multi-line, and a
/// few have lost their anchor line (outdated comments).
pub fn generate_review_comments(count: usize, max_line: u32) -> Vec<ReviewComment> {
    let mut rng = seeded_rng();
    let mut comments: Vec<ReviewComment> = Vec::with_capacity(count);

    for i in 0..count {
        let id = i as u64 + 1;
        let created_at = DateTime::from_timestamp(1_700_000_000 + rng.random_range(0..86_400), 0)
            .unwrap_or_default();
        let line = rng.random_range(1..=max_line);
        let kind: u8 = rng.random_range(0..10);

        let mut comment = ReviewComment {
            id,
            in_reply_to_id: None,
            side: None,
            line: None,
            original_line: None,
            start_line: None,
            original_start_line: None,
            position: None,
            original_position: None,
            created_at,
            path: "src/lib.rs".to_string(),
            body: format!("comment {}", id),
            user: None,
        };

        match kind {
            0..=2 if i > 0 => comment.in_reply_to_id = Some(rng.random_range(1..id)),
            3 => {
                comment.side = Some("LEFT".to_string());
                comment.original_line = Some(line);
            }
            4 => {
                comment.line = Some(line);
                comment.start_line = Some(line.saturating_sub(rng.random_range(1..5)).max(1));
            }
            5 => comment.position = Some(line),
            _ => {
                comment.side = Some("RIGHT".to_string());
                comment.line = Some(line);
            }
        }
        comments.push(comment);
    }

    comments
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_generate_diff_patch_length() {
        let patch = super::generate_diff_patch(100);
        let line_count = patch.lines().count();
        assert_eq!(line_count, 100);
    }

    #[test]
    fn test_generate_diff_patch_reproducible() {
        let patch1 = super::generate_diff_patch(50);
        let patch2 = super::generate_diff_patch(50);
        assert_eq!(patch1, patch2);
    }

    #[test]
    fn test_generate_review_comments_reproducible() {
        let first = super::generate_review_comments(100, 500);
        let second = super::generate_review_comments(100, 500);
        assert_eq!(first, second);
        assert!(first.iter().any(|c| c.in_reply_to_id.is_some()));
    }
}
