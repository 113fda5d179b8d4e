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

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "STTERM_LOG";

fn filter(fallback: &str) -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(fallback)),
        Err(_) => EnvFilter::new(fallback),
    }
}

/// Command-line runs: warnings and above on stderr, stdout stays clean for
/// listings and JSON.
pub fn init_cli() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter("warn"))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(err) = installed {
        debug!(error = %err, "keeping the subscriber already installed");
    }
}

/// The terminal UI owns the screen, so events go to a file instead.
pub fn init_tui(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {:?}", path))?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter("info"))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    if let Err(err) = installed {
        debug!(error = %err, "keeping the subscriber already installed");
    }
    Ok(())
}
