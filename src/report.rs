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

use crate::error::ConsoleError;
use std::collections::VecDeque;
use tracing::{info, warn};

const HISTORY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub severity: Severity,
    pub text: String,
    /// Platform error code, for classified failures.
    pub code: Option<u16>,
}

/// Operator-facing messages. Reporting never fails and never halts the
/// session; the front-end decides how to show what is queued here.
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    messages: VecDeque<StatusMessage>,
}

impl StatusLine {
    pub fn info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!(status = %text, "reported");
        self.push(Severity::Info, text, None);
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!(status = %text, "reported");
        self.push(Severity::Warning, text, None);
    }

    pub fn error(&mut self, err: &ConsoleError) {
        match err {
            ConsoleError::Api { code, message } => {
                warn!(code, detail = %message, "platform call failed");
            }
            ConsoleError::Parse(message) => warn!(detail = %message, "document rejected"),
            ConsoleError::Other(inner) => warn!(error = %format!("{inner:#}"), "operation failed"),
            ConsoleError::Partial { applied, source } => {
                warn!(error = %source, detail = %applied, "change partly applied");
            }
        }
        self.push(Severity::Error, err.to_string(), err.code());
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.messages.back()
    }

    pub fn last_error(&self) -> Option<&StatusMessage> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.severity == Severity::Error)
    }

    /// Hands every queued message to the caller, oldest first.
    pub fn drain(&mut self) -> Vec<StatusMessage> {
        self.messages.drain(..).collect()
    }

    fn push(&mut self, severity: Severity, text: String, code: Option<u16>) {
        if self.messages.len() == HISTORY {
            self.messages.pop_front();
        }
        self.messages.push_back(StatusMessage {
            severity,
            text,
            code,
        });
    }
}
