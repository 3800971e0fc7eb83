//! Patch parser: unified-diff text for one file into row-aligned
//! before/after texts plus a row mapping table.
//!
//! Every emitted row is one rendered line of a side-by-side editor. Context
//! lines occupy both halves of a row; a change block pairs deletions with
//! insertions index by index, padding the shorter side with empty lines, so
//! both reconstructed texts always have exactly `rows.len()` lines.
//!
//! Diff positions follow the single running counter used by position-based
//! review comments: one increment per content line, in file order, never
//! reset by hunk headers.

use serde::Serialize;
use tracing::debug;

use super::index::LineIndex;
use super::{parse_hunk_header, scan_patch, LineType, PatchLine};

/// One rendered line of the diff editor.
///
/// At least one of the line-number fields is always set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRow {
    pub original_line_number: Option<u32>,
    pub modified_line_number: Option<u32>,
    pub original_diff_position: Option<u32>,
    pub modified_diff_position: Option<u32>,
}

/// Ordered rows plus the lookup tables derived from them.
#[derive(Debug, Clone, Serialize)]
pub struct PatchMappings {
    rows: Vec<PatchRow>,
    #[serde(skip)]
    index: LineIndex,
}

impl PatchMappings {
    pub fn new(rows: Vec<PatchRow>) -> Self {
        let index = LineIndex::build(&rows);
        Self { rows, index }
    }

    pub fn rows(&self) -> &[PatchRow] {
        &self.rows
    }

    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    /// Row at a 1-based editor line
    pub fn row(&self, editor_line: usize) -> Option<&PatchRow> {
        editor_line
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
    }
}

/// Parser output for one file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedPatch {
    pub original: String,
    pub modified: String,
    /// `None` when the patch produced no rows
    pub mappings: Option<PatchMappings>,
}

impl ParsedPatch {
    pub fn rows(&self) -> &[PatchRow] {
        self.mappings.as_ref().map(|m| m.rows()).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_none()
    }
}

/// A `-`/`+` line recorded while collecting a change block.
struct Recorded<'a> {
    content: &'a str,
    line: u32,
    position: u32,
}

#[derive(Default)]
struct ParseState<'a> {
    original: Vec<&'a str>,
    modified: Vec<&'a str>,
    rows: Vec<PatchRow>,
    orig_line: u32,
    mod_line: u32,
    diff_pos: u32,
    /// A line counter hit `u32::MAX`; rows resume at the next hunk header
    exhausted: bool,
}

impl<'a> ParseState<'a> {
    fn start_hunk(&mut self, old_start: u32, new_start: u32) {
        self.orig_line = old_start;
        self.mod_line = new_start;
        self.exhausted = false;
    }

    fn exhaust(&mut self) {
        if !self.exhausted {
            debug!(
                orig_line = self.orig_line,
                mod_line = self.mod_line,
                "line counter overflow, skipping rest of hunk"
            );
        }
        self.exhausted = true;
    }

    /// Consume the next diff position. Skipped lines still consume one.
    fn next_position(&mut self) -> Option<u32> {
        let position = self.diff_pos.checked_add(1);
        match position {
            Some(position) => self.diff_pos = position,
            None => self.exhaust(),
        }
        position
    }

    /// Number the next `-` (`old == true`) or `+` line.
    fn take_line(&mut self, old: bool) -> Option<(u32, u32)> {
        let position = self.next_position()?;
        if self.exhausted {
            return None;
        }
        let line = if old { self.orig_line } else { self.mod_line };
        match (line.checked_add(1), old) {
            (Some(next), true) => self.orig_line = next,
            (Some(next), false) => self.mod_line = next,
            (None, _) => self.exhaust(),
        }
        Some((line, position))
    }

    fn context(&mut self, content: &'a str) {
        let Some(position) = self.next_position() else {
            return;
        };
        if self.exhausted {
            return;
        }
        self.rows.push(PatchRow {
            original_line_number: Some(self.orig_line),
            modified_line_number: Some(self.mod_line),
            original_diff_position: Some(position),
            modified_diff_position: Some(position),
        });
        self.original.push(content);
        self.modified.push(content);
        match (self.orig_line.checked_add(1), self.mod_line.checked_add(1)) {
            (Some(orig_line), Some(mod_line)) => {
                self.orig_line = orig_line;
                self.mod_line = mod_line;
            }
            _ => self.exhaust(),
        }
    }

    /// Consume a run of `-` lines followed by a run of `+` lines starting at
    /// `start`, returning the index of the first line after the block.
    fn change_block(&mut self, lines: &[PatchLine<'a>], start: usize) -> usize {
        let mut i = start;
        let mut deletions = Vec::new();
        let mut insertions = Vec::new();

        while let Some(line) = lines.get(i) {
            match line.line_type {
                LineType::Removed => {
                    if let Some((number, position)) = self.take_line(true) {
                        deletions.push(Recorded {
                            content: line.content,
                            line: number,
                            position,
                        });
                    }
                }
                LineType::NoNewline => {}
                _ => break,
            }
            i += 1;
        }

        while let Some(line) = lines.get(i) {
            match line.line_type {
                LineType::Added => {
                    if let Some((number, position)) = self.take_line(false) {
                        insertions.push(Recorded {
                            content: line.content,
                            line: number,
                            position,
                        });
                    }
                }
                LineType::NoNewline => {}
                _ => break,
            }
            i += 1;
        }

        // 空白のみの削除行はペアリングから除外する（追加行は対象外）。
        // 採番済みの diff position はそのまま残す。
        deletions.retain(|d| !d.content.trim().is_empty());

        for n in 0..deletions.len().max(insertions.len()) {
            let deletion = deletions.get(n);
            let insertion = insertions.get(n);
            self.rows.push(PatchRow {
                original_line_number: deletion.map(|d| d.line),
                modified_line_number: insertion.map(|a| a.line),
                original_diff_position: deletion.map(|d| d.position),
                modified_diff_position: insertion.map(|a| a.position),
            });
            self.original.push(deletion.map_or("", |d| d.content));
            self.modified.push(insertion.map_or("", |a| a.content));
        }

        i
    }

    fn finish(self) -> ParsedPatch {
        let mappings = if self.rows.is_empty() {
            None
        } else {
            Some(PatchMappings::new(self.rows))
        };
        ParsedPatch {
            original: self.original.join("\n"),
            modified: self.modified.join("\n"),
            mappings,
        }
    }
}

/// Parse the patch of a single file.
///
/// Never fails: malformed input degrades to an empty or partial result.
pub fn parse_patch(patch: &str) -> ParsedPatch {
    let lines = scan_patch(patch);
    let mut state = ParseState::default();
    let mut i = 0;

    while let Some(line) = lines.get(i) {
        match line.line_type {
            LineType::Header => {
                if let Some(header) = parse_hunk_header(line.raw) {
                    state.start_hunk(header.old_start, header.new_start);
                }
                i += 1;
            }
            LineType::Context => {
                state.context(line.content);
                i += 1;
            }
            LineType::Removed | LineType::Added => {
                i = state.change_block(&lines, i);
            }
            LineType::Meta | LineType::NoNewline | LineType::Other => {
                i += 1;
            }
        }
    }

    state.finish()
}
