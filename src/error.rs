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

use std::fmt::Display;
use thiserror::Error;

/// Failure of a single operator action.
///
/// The `Display` form is exactly what the status line shows.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The platform answered with an error status.
    #[error("Error {code}\n{message}")]
    Api { code: u16, message: String },
    /// Edited text or an import file is not a valid resource document.
    #[error("Error {0}")]
    Parse(String),
    /// Anything else: transport, file I/O, undecodable responses.
    #[error("Error {0:#}")]
    Other(#[from] anyhow::Error),
    /// A change made of several platform calls stopped half way; the
    /// platform no longer matches the last loaded catalog.
    #[error("{source} ({applied})")]
    Partial {
        applied: String,
        source: Box<ConsoleError>,
    },
}

pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    pub fn api(code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    pub fn other(message: impl Display) -> Self {
        Self::Other(anyhow::anyhow!(message.to_string()))
    }

    pub fn partial(applied: impl Into<String>, source: ConsoleError) -> Self {
        Self::Partial {
            applied: applied.into(),
            source: Box::new(source),
        }
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Api { code, .. } => Some(*code),
            Self::Partial { source, .. } => source.code(),
            _ => None,
        }
    }

    /// Whether the platform may have changed even though the action failed.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }
}
