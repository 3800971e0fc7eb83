//! Line/position translation aware of the current rendering mode.
//!
//! In diff-only rendering the editor shows the parsed rows, so editor lines
//! are row indices. In full-file rendering each side shows the whole file
//! and editor lines are file lines; only lines that also appear in the
//! patch carry a diff position.

use std::ops::RangeInclusive;
use tracing::debug;

use super::parser::{parse_patch, ParsedPatch, PatchRow};
use super::{split_hunks, Hunk, Side};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderMode {
    #[default]
    DiffOnly,
    FullFile {
        /// Hide unchanged regions away from any hunk
        collapse_unchanged: bool,
    },
}

impl RenderMode {
    pub fn is_full_file(&self) -> bool {
        matches!(self, RenderMode::FullFile { .. })
    }
}

/// Full contents of both versions of a file. A side is `None` when the file
/// does not exist there (added or deleted files).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileContents {
    pub original: Option<String>,
    pub modified: Option<String>,
}

impl FileContents {
    fn side(&self, side: Side) -> Option<&str> {
        match side {
            Side::Left => self.original.as_deref(),
            Side::Right => self.modified.as_deref(),
        }
    }
}

/// The coordinate translations the comment overlay relies on.
pub trait DiffModel {
    fn is_full_file(&self) -> bool;

    /// File coordinate to rendered coordinate
    fn map_line_for_side(&self, file_line: u32, side: Side) -> Option<usize>;

    /// Legacy diff-position coordinate to rendered coordinate
    fn map_position_for_side(&self, position: u32, side: Side) -> Option<usize>;

    /// Rendered coordinate back to the file line
    fn map_editor_line_to_file_line(&self, editor_line: usize, side: Side) -> Option<u32>;

    /// Present only when the rendered line corresponds to a patch line
    fn diff_position_for_editor_line(&self, editor_line: usize, side: Side) -> Option<u32>;

    /// Text of the hunk containing `file_line`
    fn diff_hunk_for_line(&self, file_line: u32, side: Side) -> Option<String>;

    /// Text shown at `editor_line` on `side`
    fn line_text(&self, editor_line: usize, side: Side) -> Option<String>;

    fn is_collapsed(&self, _editor_line: usize, _side: Side) -> bool {
        false
    }
}

/// [`DiffModel`] backed by a parsed patch and, for full-file rendering, the
/// complete file contents.
#[derive(Debug, Clone)]
pub struct PatchDiffModel {
    parsed: ParsedPatch,
    hunks: Vec<Hunk>,
    has_patch: bool,
    mode: RenderMode,
    contents: FileContents,
    context_lines: u32,
}

impl PatchDiffModel {
    pub const DEFAULT_CONTEXT_LINES: u32 = 3;

    /// Build the model for one file.
    ///
    /// Full-file rendering needs `contents`; without them the model renders
    /// diff-only.
    pub fn new(patch: &str, mode: RenderMode, contents: Option<FileContents>) -> Self {
        let mode = match (mode, &contents) {
            (RenderMode::FullFile { .. }, None) => {
                debug!("full file contents unavailable, rendering diff only");
                RenderMode::DiffOnly
            }
            _ => mode,
        };

        Self {
            parsed: parse_patch(patch),
            hunks: split_hunks(patch),
            has_patch: !patch.trim().is_empty(),
            mode,
            contents: contents.unwrap_or_default(),
            context_lines: Self::DEFAULT_CONTEXT_LINES,
        }
    }

    pub fn with_context_lines(mut self, context_lines: u32) -> Self {
        self.context_lines = context_lines;
        self
    }

    pub fn parsed(&self) -> &ParsedPatch {
        &self.parsed
    }

    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Whether the file has any patch text at all (binary or oversized
    /// files come without one)
    pub fn has_patch(&self) -> bool {
        self.has_patch
    }

    fn row(&self, editor_line: usize) -> Option<&PatchRow> {
        self.parsed.mappings.as_ref()?.row(editor_line)
    }

    fn row_for_line(&self, file_line: u32, side: Side) -> Option<&PatchRow> {
        let mappings = self.parsed.mappings.as_ref()?;
        let editor_line = mappings.index().line_to_editor_line(file_line, side)?;
        mappings.row(editor_line)
    }

    fn full_file_line_count(&self, side: Side) -> Option<usize> {
        self.contents.side(side).map(|text| text.lines().count())
    }

    fn in_full_file(&self, editor_line: usize, side: Side) -> bool {
        editor_line >= 1
            && self
                .full_file_line_count(side)
                .is_some_and(|count| editor_line <= count)
    }

    /// File lines of `side` that stay visible when unchanged regions collapse
    pub fn visible_ranges(&self, side: Side) -> Vec<RangeInclusive<u32>> {
        let mut ranges: Vec<RangeInclusive<u32>> = self
            .hunks
            .iter()
            .filter_map(|hunk| hunk.lines_for_side(side))
            .map(|r| {
                r.start().saturating_sub(self.context_lines).max(1)
                    ..=r.end().saturating_add(self.context_lines)
            })
            .collect();
        ranges.sort_by_key(|r| *r.start());

        let mut merged: Vec<RangeInclusive<u32>> = Vec::new();
        for range in ranges {
            match merged.last_mut() {
                Some(last) if *range.start() <= last.end().saturating_add(1) => {
                    *last = *last.start()..=(*last.end()).max(*range.end());
                }
                _ => merged.push(range),
            }
        }
        merged
    }
}

fn side_line(row: &PatchRow, side: Side) -> Option<u32> {
    match side {
        Side::Left => row.original_line_number,
        Side::Right => row.modified_line_number,
    }
}

fn side_position(row: &PatchRow, side: Side) -> Option<u32> {
    match side {
        Side::Left => row.original_diff_position,
        Side::Right => row.modified_diff_position,
    }
}

impl DiffModel for PatchDiffModel {
    fn is_full_file(&self) -> bool {
        self.mode.is_full_file()
    }

    fn map_line_for_side(&self, file_line: u32, side: Side) -> Option<usize> {
        if self.is_full_file() {
            let editor_line = file_line as usize;
            return self.in_full_file(editor_line, side).then_some(editor_line);
        }
        self.parsed
            .mappings
            .as_ref()?
            .index()
            .line_to_editor_line(file_line, side)
    }

    fn map_position_for_side(&self, position: u32, side: Side) -> Option<usize> {
        let mappings = self.parsed.mappings.as_ref()?;
        let editor_line = mappings.index().diff_position_to_editor_line(position, side)?;
        if self.is_full_file() {
            let file_line = side_line(mappings.row(editor_line)?, side)?;
            return self.map_line_for_side(file_line, side);
        }
        Some(editor_line)
    }

    fn map_editor_line_to_file_line(&self, editor_line: usize, side: Side) -> Option<u32> {
        if self.is_full_file() {
            return self
                .in_full_file(editor_line, side)
                .then(|| u32::try_from(editor_line).ok())
                .flatten();
        }
        side_line(self.row(editor_line)?, side)
    }

    fn diff_position_for_editor_line(&self, editor_line: usize, side: Side) -> Option<u32> {
        if self.is_full_file() {
            let file_line = self.map_editor_line_to_file_line(editor_line, side)?;
            return side_position(self.row_for_line(file_line, side)?, side);
        }
        side_position(self.row(editor_line)?, side)
    }

    fn diff_hunk_for_line(&self, file_line: u32, side: Side) -> Option<String> {
        self.hunks
            .iter()
            .find(|hunk| hunk.contains(file_line, side))
            .map(|hunk| hunk.text.clone())
    }

    fn line_text(&self, editor_line: usize, side: Side) -> Option<String> {
        let index = editor_line.checked_sub(1)?;
        if self.is_full_file() {
            return self
                .contents
                .side(side)?
                .lines()
                .nth(index)
                .map(str::to_string);
        }
        // row-aligned text: a row without a line on this side is padding
        side_line(self.row(editor_line)?, side)?;
        let text = match side {
            Side::Left => &self.parsed.original,
            Side::Right => &self.parsed.modified,
        };
        text.split('\n').nth(index).map(str::to_string)
    }

    fn is_collapsed(&self, editor_line: usize, side: Side) -> bool {
        let RenderMode::FullFile {
            collapse_unchanged: true,
        } = self.mode
        else {
            return false;
        };
        let Some(file_line) = self.map_editor_line_to_file_line(editor_line, side) else {
            return false;
        };
        !self
            .visible_ranges(side)
            .iter()
            .any(|range| range.contains(&file_line))
    }
}
