//! Patch text utilities.
//!
//! This module provides the line-level building blocks shared by the patch
//! parser and the diff model:
//! - Line classification (Added, Removed, Context, Header, Meta)
//! - Hunk header parsing and hunk extraction with per-side line ranges
//! - Unified diff parsing for splitting multi-file diffs

pub mod index;
pub mod model;
pub mod parser;

pub use index::LineIndex;
pub use model::{DiffModel, FileContents, PatchDiffModel, RenderMode};
pub use parser::{parse_patch, ParsedPatch, PatchMappings, PatchRow};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use tracing::{debug, warn};

/// Base (original) or head (modified) half of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "LEFT",
            Side::Right => "RIGHT",
        }
    }

    /// Recognize a side value as sent by the review API. Anything other than
    /// `LEFT`/`RIGHT` (ASCII case-insensitive) is unrecognized.
    pub fn from_api(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("LEFT") {
            Some(Side::Left)
        } else if value.eq_ignore_ascii_case("RIGHT") {
            Some(Side::Right)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Side::from_api(s).ok_or_else(|| format!("invalid side '{}': expected LEFT or RIGHT", s))
    }
}

/// Represents the type of a line in a diff patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    /// Line added in the new version (starts with +)
    Added,
    /// Line removed from the old version (starts with -)
    Removed,
    /// Context line, unchanged (starts with space)
    Context,
    /// Hunk header (@@ ... @@)
    Header,
    /// File header lines (diff --git, index, ---, +++)
    Meta,
    /// `\ No newline at end of file`
    NoNewline,
    /// Anything else (mode lines, rename lines, binary notices, stray text)
    Other,
}

/// Classify a line and extract its content without the prefix.
///
/// This looks at a single line only. `---`/`+++` are always reported as
/// [`LineType::Meta`] here; [`scan_patch`] refines them using the
/// surrounding lines.
pub fn classify_line(line: &str) -> (LineType, &str) {
    if line.starts_with("@@") {
        (LineType::Header, line)
    } else if line.starts_with("+++")
        || line.starts_with("---")
        || line.starts_with("diff ")
        || line.starts_with("index ")
    {
        (LineType::Meta, line)
    } else if let Some(content) = line.strip_prefix('+') {
        (LineType::Added, content)
    } else if let Some(content) = line.strip_prefix('-') {
        (LineType::Removed, content)
    } else if let Some(content) = line.strip_prefix(' ') {
        (LineType::Context, content)
    } else if line.starts_with('\\') {
        (LineType::NoNewline, line)
    } else {
        (LineType::Other, line)
    }
}

/// Parsed `@@ -old_start[,old_count] +new_start[,new_count] @@` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
}

/// Parse one `start[,count]` range. A missing count means 1.
fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// Parse a hunk header.
/// Format: @@ -old_start,old_count +new_start,new_count @@ optional section
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let rest = line.strip_prefix("@@")?.trim_start();
    let mut parts = rest.split_whitespace();
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;

    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;

    Some(HunkHeader {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

/// One classified line of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchLine<'a> {
    pub line_type: LineType,
    /// Content without the diff prefix (the whole line for non-content lines)
    pub content: &'a str,
    /// The line exactly as it appears in the patch
    pub raw: &'a str,
}

/// Classify every line of a patch, taking hunk boundaries into account.
///
/// Differences from [`classify_line`]:
/// - `+`/`-`/space lines outside any hunk are [`LineType::Other`].
/// - Inside a hunk, `---`/`+++` are content lines unless they form a
///   `--- `/`+++ ` file header pair.
/// - An `@@` line that does not parse is [`LineType::Other`].
pub fn scan_patch(patch: &str) -> Vec<PatchLine<'_>> {
    let lines: Vec<&str> = patch.lines().collect();
    let mut result = Vec::with_capacity(lines.len());
    let mut in_hunk = false;
    let mut header_pair_open = false;

    for (i, &raw) in lines.iter().enumerate() {
        let (mut line_type, mut content) = classify_line(raw);

        match line_type {
            LineType::Header => {
                if parse_hunk_header(raw).is_some() {
                    in_hunk = true;
                } else {
                    debug!(line = raw, "unparseable hunk header skipped");
                    line_type = LineType::Other;
                }
            }
            LineType::Meta if raw.starts_with("---") || raw.starts_with("+++") => {
                let is_old_header = raw.starts_with("--- ")
                    && lines.get(i + 1).is_some_and(|next| next.starts_with("+++ "));
                let is_new_header = raw.starts_with("+++ ") && header_pair_open;

                if !in_hunk || is_old_header || is_new_header {
                    in_hunk = false;
                } else {
                    // hunk 内の `---foo` は `--foo` の削除行
                    line_type = if raw.starts_with('-') {
                        LineType::Removed
                    } else {
                        LineType::Added
                    };
                    content = &raw[1..];
                }
            }
            LineType::Meta => {
                in_hunk = false;
            }
            LineType::Added | LineType::Removed | LineType::Context if !in_hunk => {
                line_type = LineType::Other;
                content = raw;
            }
            _ => {}
        }

        header_pair_open = line_type == LineType::Meta && raw.starts_with("--- ");
        result.push(PatchLine {
            line_type,
            content,
            raw,
        });
    }

    result
}

/// One hunk of a patch with the file lines it covers on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub header: HunkHeader,
    /// Header line plus every line belonging to the hunk, joined by `\n`
    pub text: String,
    /// Original-side file lines touched by context/removed lines
    pub old_lines: Option<RangeInclusive<u32>>,
    /// Modified-side file lines touched by context/added lines
    pub new_lines: Option<RangeInclusive<u32>>,
}

impl Hunk {
    pub fn lines_for_side(&self, side: Side) -> Option<&RangeInclusive<u32>> {
        match side {
            Side::Left => self.old_lines.as_ref(),
            Side::Right => self.new_lines.as_ref(),
        }
    }

    pub fn contains(&self, file_line: u32, side: Side) -> bool {
        self.lines_for_side(side)
            .is_some_and(|range| range.contains(&file_line))
    }
}

fn extend_range(range: &mut Option<RangeInclusive<u32>>, line: u32) {
    *range = Some(match range.take() {
        Some(r) => (*r.start()).min(line)..=(*r.end()).max(line),
        None => line..=line,
    });
}

/// Split a patch into its hunks.
///
/// Line ranges are computed by walking the hunk body rather than trusting
/// the counts in the header.
pub fn split_hunks(patch: &str) -> Vec<Hunk> {
    struct Current<'a> {
        header: HunkHeader,
        lines: Vec<&'a str>,
        old_lines: Option<RangeInclusive<u32>>,
        new_lines: Option<RangeInclusive<u32>>,
        /// `None` once the counter ran past `u32::MAX`
        old_line: Option<u32>,
        new_line: Option<u32>,
    }

    fn advance(range: &mut Option<RangeInclusive<u32>>, line: &mut Option<u32>) {
        if let Some(current) = *line {
            extend_range(range, current);
            *line = current.checked_add(1);
        }
    }

    fn finish(current: Current<'_>) -> Hunk {
        Hunk {
            header: current.header,
            text: current.lines.join("\n"),
            old_lines: current.old_lines,
            new_lines: current.new_lines,
        }
    }

    let mut hunks = Vec::new();
    let mut current: Option<Current<'_>> = None;

    for line in scan_patch(patch) {
        match line.line_type {
            LineType::Header => {
                if let Some(done) = current.take() {
                    hunks.push(finish(done));
                }
                // scan_patch only reports parseable headers as Header
                if let Some(header) = parse_hunk_header(line.raw) {
                    current = Some(Current {
                        header,
                        lines: vec![line.raw],
                        old_lines: None,
                        new_lines: None,
                        old_line: Some(header.old_start),
                        new_line: Some(header.new_start),
                    });
                }
            }
            LineType::Meta => {
                if let Some(done) = current.take() {
                    hunks.push(finish(done));
                }
            }
            LineType::Context | LineType::Removed | LineType::Added | LineType::NoNewline => {
                let Some(cur) = current.as_mut() else {
                    continue;
                };
                cur.lines.push(line.raw);
                match line.line_type {
                    LineType::Context => {
                        advance(&mut cur.old_lines, &mut cur.old_line);
                        advance(&mut cur.new_lines, &mut cur.new_line);
                    }
                    LineType::Removed => advance(&mut cur.old_lines, &mut cur.old_line),
                    LineType::Added => advance(&mut cur.new_lines, &mut cur.new_line),
                    _ => {}
                }
            }
            LineType::Other => {}
        }
    }

    if let Some(done) = current.take() {
        hunks.push(finish(done));
    }

    hunks
}

/// Find the text of the hunk containing `file_line` on `side`.
pub fn hunk_text_for_line(patch: &str, file_line: u32, side: Side) -> Option<String> {
    split_hunks(patch)
        .into_iter()
        .find(|hunk| hunk.contains(file_line, side))
        .map(|hunk| hunk.text)
}

/// Parse a unified diff output into a map of filename -> patch content
///
/// This function splits the output of `git diff` or `gh pr diff` into individual
/// file patches. The filenames are normalized (without `a/` or `b/` prefixes).
pub fn parse_unified_diff(unified_diff: &str) -> HashMap<String, String> {
    let mut result = HashMap::new();
    let lines: Vec<&str> = unified_diff.lines().collect();

    // (filename, first line index) of the file being collected
    let mut current: Option<(Option<String>, usize)> = None;
    let mut pending_minus_filename: Option<String> = None;

    let mut flush = |current: Option<(Option<String>, usize)>, end: usize| {
        if let Some((Some(filename), start)) = current {
            let patch = lines[start..end].join("\n");
            if !patch.is_empty() {
                result.insert(filename, patch);
            }
        }
    };

    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("diff --git ") {
            flush(current.take(), i);
            current = Some((extract_filename(line), i));
            pending_minus_filename = None;
            continue;
        }

        // diff --git 行から決定できなかった場合は +++ / --- 行にフォールバック
        let Some((filename, _)) = current.as_mut() else {
            continue;
        };
        if filename.is_some() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            if rest != "/dev/null" {
                *filename = Some(strip_diff_prefix(rest));
            } else {
                *filename = pending_minus_filename.take();
            }
        } else if let Some(rest) = line.strip_prefix("--- ") {
            if rest != "/dev/null" {
                pending_minus_filename = Some(strip_diff_prefix(rest));
            }
        }
    }

    flush(current.take(), lines.len());

    result
}

/// Strip the single-char diff prefix (a/, b/, w/, etc.) from a --- or +++ path.
fn strip_diff_prefix(path: &str) -> String {
    match path.as_bytes() {
        [_, b'/', ..] => path[2..].to_string(),
        _ => path.to_string(),
    }
}

/// Extract filename from a "diff --git" line
///
/// Handles `a/`/`b/` as well as mnemonic prefixes (`c/`, `i/`, `o/`, `w/`).
/// For renamed files, returns the new filename (from the second path), which
/// matches the GitHub API's `filename` field.
///
/// Returns `None` for ambiguous cases (e.g. paths with spaces + subdirs that
/// create false separator matches). Callers should fall back to `+++ `/`--- `.
fn extract_filename(git_diff_line: &str) -> Option<String> {
    let content = git_diff_line.strip_prefix("diff --git ")?;

    let bytes = content.as_bytes();
    if bytes.len() < 2 || bytes[1] != b'/' {
        warn!("Failed to parse git diff line: {}", git_diff_line);
        return None;
    }
    let first_prefix = bytes[0];
    let paths = &content[2..];

    // Non-rename: "path Y/path", i.e. both halves are equal.
    if paths.len() >= 3 && (paths.len() - 3) % 2 == 0 {
        let half = (paths.len() - 3) / 2;
        let (first, rest) = paths.split_at(half);
        if half > 0 && rest.as_bytes()[0] == b' ' && rest.as_bytes()[2] == b'/' && first == &rest[3..]
        {
            return Some(first.to_string());
        }
    }

    // Rename: look for the single " Y/" separator with the expected partner prefix.
    let second_prefix = match first_prefix {
        b'a' => b'b',
        b'c' | b'i' | b'o' => b'w',
        _ => {
            warn!(
                "Failed to parse git diff line (unknown prefix): {}",
                git_diff_line
            );
            return None;
        }
    };

    let separators: Vec<usize> = paths
        .as_bytes()
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[0] == b' ' && w[1] == second_prefix && w[2] == b'/')
        .map(|(i, _)| i)
        .collect();

    match separators.as_slice() {
        [sep] if *sep + 3 < paths.len() => Some(paths[sep + 3..].to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use std::collections::BTreeMap;

    fn format_parsed_diff(result: &HashMap<String, String>) -> String {
        let sorted: BTreeMap<&str, &str> = result
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let mut output = String::new();
        for (i, (filename, patch)) in sorted.iter().enumerate() {
            if i > 0 {
                output.push_str("\n---\n");
            }
            output.push_str(&format!("[{}]\n{}", filename, patch));
        }
        output
    }

    const MULTI_HUNK: &str = "@@ -1,3 +1,3 @@\n ctx1\n-old1\n+new1\n@@ -10,2 +10,3 @@\n ctx10\n+added11\n ctx11";

    const UNIFIED_DIFF_MULTIPLE: &str = r#"diff --git a/src/lib.rs b/src/lib.rs
index 1111111..2222222 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,2 +1,3 @@
 pub mod app;
+pub mod config;
diff --git a/src/app.rs b/src/app.rs
index 3333333..4444444 100644
--- a/src/app.rs
+++ b/src/app.rs
@@ -10,6 +10,7 @@
 struct App {
     name: String,
+    version: String,
 }
"#;

    const UNIFIED_DIFF_DELETED: &str = r#"diff --git a/src/old_file.rs b/src/old_file.rs
deleted file mode 100644
index 1234567..0000000
--- a/src/old_file.rs
+++ /dev/null
@@ -1,3 +0,0 @@
-fn old_function() {
-    todo!()
-}
"#;

    #[test]
    fn test_side_from_api() {
        assert_eq!(Side::from_api("LEFT"), Some(Side::Left));
        assert_eq!(Side::from_api("right"), Some(Side::Right));
        assert_eq!(Side::from_api("BOTH"), None);
        assert_eq!(Side::from_api(""), None);
        assert_eq!("left".parse::<Side>(), Ok(Side::Left));
        assert!("middle".parse::<Side>().is_err());
    }

    #[test]
    fn test_parse_hunk_header() {
        assert_eq!(
            parse_hunk_header("@@ -1,4 +1,5 @@"),
            Some(HunkHeader {
                old_start: 1,
                old_count: 4,
                new_start: 1,
                new_count: 5
            })
        );
        let header = parse_hunk_header("@@ -10,3 +15,7 @@ fn main() {").unwrap();
        assert_eq!((header.old_start, header.new_start), (10, 15));
    }

    #[test]
    fn test_parse_hunk_header_without_counts() {
        let header = parse_hunk_header("@@ -1 +42 @@").unwrap();
        assert_eq!(header.old_count, 1);
        assert_eq!(header.new_start, 42);
        assert_eq!(header.new_count, 1);
    }

    #[test]
    fn test_parse_hunk_header_malformed() {
        assert_eq!(parse_hunk_header("@@ garbage @@"), None);
        assert_eq!(parse_hunk_header("@@ -x,1 +1 @@"), None);
        assert_eq!(parse_hunk_header("not a header"), None);
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("+added"), (LineType::Added, "added"));
        assert_eq!(classify_line("-removed"), (LineType::Removed, "removed"));
        assert_eq!(classify_line(" ctx"), (LineType::Context, "ctx"));
        assert_eq!(classify_line("+++ b/f.rs").0, LineType::Meta);
        assert_eq!(
            classify_line("\\ No newline at end of file").0,
            LineType::NoNewline
        );
        assert_eq!(classify_line("").0, LineType::Other);
        assert_eq!(classify_line("new file mode 100644").0, LineType::Other);
    }

    #[test]
    fn test_scan_patch_triple_dash_inside_hunk_is_content() {
        let patch = "@@ -1,2 +1,2 @@\n--- SQL comment\n+++ counter\n ctx";
        let scanned = scan_patch(patch);
        assert_eq!(scanned[1].line_type, LineType::Removed);
        assert_eq!(scanned[1].content, "-- SQL comment");
        assert_eq!(scanned[2].line_type, LineType::Added);
        assert_eq!(scanned[2].content, "++ counter");
    }

    #[test]
    fn test_scan_patch_header_pair_after_hunk() {
        let patch = "--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n--- a/y\n+++ b/y\n@@ -1 +1 @@\n-c";
        let types: Vec<LineType> = scan_patch(patch).iter().map(|l| l.line_type).collect();
        assert_eq!(
            types,
            vec![
                LineType::Meta,
                LineType::Meta,
                LineType::Header,
                LineType::Removed,
                LineType::Added,
                LineType::Meta,
                LineType::Meta,
                LineType::Header,
                LineType::Removed,
            ]
        );
    }

    #[test]
    fn test_scan_patch_content_before_hunk_is_other() {
        let scanned = scan_patch(" stray\n+stray\n@@ -1 +1 @@\n x");
        assert_eq!(scanned[0].line_type, LineType::Other);
        assert_eq!(scanned[1].line_type, LineType::Other);
        assert_eq!(scanned[3].line_type, LineType::Context);
    }

    #[test]
    fn test_split_hunks_ranges() {
        let hunks = split_hunks(MULTI_HUNK);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].old_lines, Some(1..=2));
        assert_eq!(hunks[0].new_lines, Some(1..=2));
        assert_eq!(hunks[1].old_lines, Some(10..=11));
        assert_eq!(hunks[1].new_lines, Some(10..=12));
        assert_snapshot!(hunks[1].text, @r"
        @@ -10,2 +10,3 @@
         ctx10
        +added11
         ctx11
        ");
    }

    #[test]
    fn test_split_hunks_pure_deletion_has_no_new_range() {
        let hunks = split_hunks("@@ -1,2 +0,0 @@\n-a\n-b");
        assert_eq!(hunks[0].old_lines, Some(1..=2));
        assert_eq!(hunks[0].new_lines, None);
    }

    #[test]
    fn test_split_hunks_stops_counting_at_u32_max() {
        let hunks = split_hunks("@@ -4294967295,2 +1,2 @@\n a\n b");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_lines, Some(u32::MAX..=u32::MAX));
        assert_eq!(hunks[0].new_lines, Some(1..=2));
        assert_eq!(hunks[0].text.lines().count(), 3);
    }

    #[test]
    fn test_hunk_text_for_line() {
        assert!(hunk_text_for_line(MULTI_HUNK, 11, Side::Right)
            .unwrap()
            .starts_with("@@ -10,2 +10,3 @@"));
        assert!(hunk_text_for_line(MULTI_HUNK, 2, Side::Left)
            .unwrap()
            .starts_with("@@ -1,3 +1,3 @@"));
        assert_eq!(hunk_text_for_line(MULTI_HUNK, 5, Side::Right), None);
        assert_eq!(hunk_text_for_line("", 1, Side::Right), None);
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(
            extract_filename("diff --git a/src/foo.rs b/src/foo.rs"),
            Some("src/foo.rs".to_string())
        );
        assert_eq!(
            extract_filename("diff --git a/src/old_name.rs b/src/new_name.rs"),
            Some("src/new_name.rs".to_string())
        );
        assert_eq!(
            extract_filename("diff --git c/src/old.rs w/src/new.rs"),
            Some("src/new.rs".to_string())
        );
        assert_eq!(
            extract_filename("diff --git a/my Folder/src/file.rs b/my Folder/src/file.rs"),
            Some("my Folder/src/file.rs".to_string())
        );
    }

    #[test]
    fn test_extract_filename_invalid_or_ambiguous() {
        assert_eq!(extract_filename("not a diff line"), None);
        assert_eq!(extract_filename("diff something else"), None);
        assert_eq!(extract_filename("diff --git a/file nob"), None);
        assert_eq!(
            extract_filename("diff --git a/x b/old.rs b/x b/new.rs"),
            None
        );
    }

    #[test]
    fn test_parse_unified_diff_plusplus_fallback() {
        let diff = "\
diff --git a/x b/old.rs b/x b/new.rs
index 1234567..abcdefg 100644
--- a/x b/old.rs
+++ b/x b/new.rs
@@ -1,3 +1,3 @@
 line1
-old
+new";
        let result = parse_unified_diff(diff);
        assert!(result.contains_key("x b/new.rs"));
    }

    #[test]
    fn test_parse_multiple_files() {
        let result = parse_unified_diff(UNIFIED_DIFF_MULTIPLE);
        assert_snapshot!(format_parsed_diff(&result), @r#"
        [src/app.rs]
        diff --git a/src/app.rs b/src/app.rs
        index 3333333..4444444 100644
        --- a/src/app.rs
        +++ b/src/app.rs
        @@ -10,6 +10,7 @@
         struct App {
             name: String,
        +    version: String,
         }
        ---
        [src/lib.rs]
        diff --git a/src/lib.rs b/src/lib.rs
        index 1111111..2222222 100644
        --- a/src/lib.rs
        +++ b/src/lib.rs
        @@ -1,2 +1,3 @@
         pub mod app;
        +pub mod config;
        "#);
    }

    #[test]
    fn test_parse_deleted_file() {
        let result = parse_unified_diff(UNIFIED_DIFF_DELETED);
        assert_eq!(result.len(), 1);
        assert!(result.contains_key("src/old_file.rs"));
    }

    #[test]
    fn test_parse_empty_diff() {
        assert!(parse_unified_diff("").is_empty());
    }
}
