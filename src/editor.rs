// stterm - terminal console for the SmartThings API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Detail pane: a resource rendered as pretty JSON and the text buffer the
//! operator edits it in.

use crate::error::{ConsoleError, ConsoleResult};
use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn render<R: Serialize>(resource: &R) -> ConsoleResult<String> {
    Ok(serde_json::to_string_pretty(resource).context("rendering resource as JSON")?)
}

pub fn parse<R: DeserializeOwned>(text: &str, what: &str) -> ConsoleResult<R> {
    serde_json::from_str(text).map_err(|err| ConsoleError::Parse(format!("invalid {what} JSON: {err}")))
}

/// Blank text means there is nothing to save.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[derive(Debug, Clone)]
pub struct DetailEditor {
    lines: Vec<String>,
    row: usize,
    col: usize,
    editing: bool,
    dirty: bool,
}

impl Default for DetailEditor {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
            editing: false,
            dirty: false,
        }
    }
}

impl DetailEditor {
    /// Replaces the buffer and leaves edit mode.
    pub fn load(&mut self, text: &str) {
        self.lines = text.lines().map(str::to_string).collect();
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.row = 0;
        self.col = 0;
        self.editing = false;
        self.dirty = false;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// `(row, column)` in characters.
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn begin_edit(&mut self) {
        self.editing = true;
    }

    pub fn end_edit(&mut self) {
        self.editing = false;
    }

    pub fn insert_char(&mut self, c: char) {
        let at = byte_index(&self.lines[self.row], self.col);
        self.lines[self.row].insert(at, c);
        self.col += 1;
        self.dirty = true;
    }

    pub fn insert_newline(&mut self) {
        let at = byte_index(&self.lines[self.row], self.col);
        let rest = self.lines[self.row].split_off(at);
        self.row += 1;
        self.lines.insert(self.row, rest);
        self.col = 0;
        self.dirty = true;
    }

    pub fn backspace(&mut self) {
        if self.col > 0 {
            self.col -= 1;
            let at = byte_index(&self.lines[self.row], self.col);
            self.lines[self.row].remove(at);
            self.dirty = true;
        } else if self.row > 0 {
            let line = self.lines.remove(self.row);
            self.row -= 1;
            self.col = char_len(&self.lines[self.row]);
            self.lines[self.row].push_str(&line);
            self.dirty = true;
        }
    }

    pub fn delete(&mut self) {
        if self.col < char_len(&self.lines[self.row]) {
            let at = byte_index(&self.lines[self.row], self.col);
            self.lines[self.row].remove(at);
            self.dirty = true;
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
            self.dirty = true;
        }
    }

    pub fn move_left(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = char_len(&self.lines[self.row]);
        }
    }

    pub fn move_right(&mut self) {
        if self.col < char_len(&self.lines[self.row]) {
            self.col += 1;
        } else if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.row > 0 {
            self.row -= 1;
            self.col = self.col.min(char_len(&self.lines[self.row]));
        }
    }

    pub fn move_down(&mut self) {
        if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = self.col.min(char_len(&self.lines[self.row]));
        }
    }

    pub fn home(&mut self) {
        self.col = 0;
    }

    pub fn end(&mut self) {
        self.col = char_len(&self.lines[self.row]);
    }
}

fn char_len(line: &str) -> usize {
    line.chars().count()
}

fn byte_index(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map(|(idx, _)| idx)
        .unwrap_or(line.len())
}
