//! Lookup tables from file coordinates to editor lines.
//!
//! "Editor line" is the 1-based position of a row in the row sequence.

use std::collections::HashMap;

use super::parser::PatchRow;
use super::Side;

#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    original_line_to_editor_line: HashMap<u32, usize>,
    modified_line_to_editor_line: HashMap<u32, usize>,
    left_position_to_editor_line: HashMap<u32, usize>,
    right_position_to_editor_line: HashMap<u32, usize>,
}

impl LineIndex {
    /// Build all four maps in one pass. Later rows overwrite earlier entries
    /// for the same key.
    pub fn build(rows: &[PatchRow]) -> Self {
        let mut index = Self::default();

        for (i, row) in rows.iter().enumerate() {
            let editor_line = i + 1;
            if let Some(line) = row.original_line_number {
                index.original_line_to_editor_line.insert(line, editor_line);
            }
            if let Some(line) = row.modified_line_number {
                index.modified_line_to_editor_line.insert(line, editor_line);
            }
            if let Some(position) = row.original_diff_position {
                index.left_position_to_editor_line.insert(position, editor_line);
            }
            if let Some(position) = row.modified_diff_position {
                index.right_position_to_editor_line.insert(position, editor_line);
            }
        }

        index
    }

    pub fn original_line_to_editor_line(&self, line: u32) -> Option<usize> {
        self.original_line_to_editor_line.get(&line).copied()
    }

    pub fn modified_line_to_editor_line(&self, line: u32) -> Option<usize> {
        self.modified_line_to_editor_line.get(&line).copied()
    }

    /// File line on `side` to editor line
    pub fn line_to_editor_line(&self, line: u32, side: Side) -> Option<usize> {
        match side {
            Side::Left => self.original_line_to_editor_line(line),
            Side::Right => self.modified_line_to_editor_line(line),
        }
    }

    /// Diff position on `side` to editor line
    pub fn diff_position_to_editor_line(&self, position: u32, side: Side) -> Option<usize> {
        let map = match side {
            Side::Left => &self.left_position_to_editor_line,
            Side::Right => &self.right_position_to_editor_line,
        };
        map.get(&position).copied()
    }
}
