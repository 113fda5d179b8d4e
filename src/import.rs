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

use crate::error::ConsoleResult;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const IMPORT_EXTENSION: &str = "json";

/// Picker overlay listing local documents that can be created remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImportBrowser {
    #[default]
    Closed,
    Open(FileList),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileList {
    root: PathBuf,
    files: Vec<PathBuf>,
    selected: usize,
}

impl ImportBrowser {
    /// Opens a fresh listing when closed, closes (dropping the listing)
    /// when open. A failed scan leaves the browser closed.
    pub fn toggle(&mut self, root: &Path, extension: &str) -> ConsoleResult<()> {
        match self {
            Self::Open(_) => {
                *self = Self::Closed;
                Ok(())
            }
            Self::Closed => {
                let files = scan(root, extension)?;
                debug!(root = %root.display(), count = files.len(), "import browser opened");
                *self = Self::Open(FileList {
                    root: root.to_path_buf(),
                    files,
                    selected: 0,
                });
                Ok(())
            }
        }
    }

    pub fn close(&mut self) {
        *self = Self::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub fn listing(&self) -> Option<&FileList> {
        match self {
            Self::Open(list) => Some(list),
            Self::Closed => None,
        }
    }

    pub fn select_next(&mut self) {
        if let Self::Open(list) = self
            && list.selected + 1 < list.files.len()
        {
            list.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        if let Self::Open(list) = self {
            list.selected = list.selected.saturating_sub(1);
        }
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.listing().and_then(FileList::selected_path)
    }
}

impl FileList {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.files.get(self.selected).map(PathBuf::as_path)
    }

    /// File names for display, in listing order.
    pub fn names(&self) -> impl Iterator<Item = String> + '_ {
        self.files.iter().map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        })
    }
}

/// Regular files directly under `root` with the given extension
/// (case-insensitive), sorted by file name.
pub fn scan(root: &Path, extension: &str) -> ConsoleResult<Vec<PathBuf>> {
    let entries =
        fs::read_dir(root).with_context(|| format!("listing import directory {}", root.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("listing import directory {}", root.display()))?;
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub fn read_candidate(path: &Path) -> ConsoleResult<String> {
    Ok(fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?)
}
