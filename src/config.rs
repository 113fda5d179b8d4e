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

use crate::resource::CopyNaming;
use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.smartthings.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CONFIG_DIR_ENV: &str = "STTERM_CONFIG_DIR";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub token: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub import_dir: Option<PathBuf>,
    /// Location id or name imports go to when several exist.
    pub default_location: Option<String>,
    pub rules_copy: Option<CopyNaming>,
    pub schedules_copy: Option<CopyNaming>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error("API token is required; set it with `stterm configure --token <token>`")]
    MissingToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub token: String,
    pub base_url: String,
    pub timeout: Duration,
    pub import_dir: PathBuf,
    pub default_location: Option<String>,
    pub rules_copy: Option<CopyNaming>,
    pub schedules_copy: Option<CopyNaming>,
}

/// Values given on the command line; they win over both config files.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub import_dir: Option<PathBuf>,
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Local => Ok(cwd.join(".stterm.yaml")),
        Scope::User => Ok(user_dir()?.join("config.yaml")),
    }
}

/// Where the terminal UI writes its log.
pub fn log_path() -> Result<PathBuf> {
    Ok(user_dir()?.join("stterm.log"))
}

fn user_dir() -> Result<PathBuf> {
    if let Ok(custom) = env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(custom));
    }
    let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
    Ok(base.join("stterm"))
}

pub fn load(cwd: &Path) -> Result<Config> {
    let user = read_if_exists(&config_path(Scope::User, cwd)?)?.unwrap_or_default();
    let local = read_if_exists(&config_path(Scope::Local, cwd)?)?.unwrap_or_default();
    Ok(merge(user, local))
}

pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    Ok(read_if_exists(&config_path(scope, cwd)?)?.unwrap_or_default())
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(path)
}

pub fn resolve(cwd: &Path, overrides: Overrides) -> Result<EffectiveConfig> {
    let merged = merge(load(cwd)?, Config {
        token: overrides.token,
        base_url: overrides.base_url,
        timeout_secs: overrides.timeout_secs,
        import_dir: overrides.import_dir,
        ..Config::default()
    });

    let token = merged
        .token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingToken)?;

    let base_url = merged
        .base_url
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let timeout = Duration::from_secs(merged.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let import_dir = match merged.import_dir {
        Some(dir) if dir.is_relative() => cwd.join(dir),
        Some(dir) => dir,
        None => cwd.to_path_buf(),
    };

    Ok(EffectiveConfig {
        token,
        base_url,
        timeout,
        import_dir,
        default_location: merged.default_location,
        rules_copy: merged.rules_copy,
        schedules_copy: merged.schedules_copy,
    })
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

/// Field-wise merge; `over` wins wherever it has a value.
fn merge(base: Config, over: Config) -> Config {
    Config {
        token: over.token.or(base.token),
        base_url: over.base_url.or(base.base_url),
        timeout_secs: over.timeout_secs.or(base.timeout_secs),
        import_dir: over.import_dir.or(base.import_dir),
        default_location: over.default_location.or(base.default_location),
        rules_copy: over.rules_copy.or(base.rules_copy),
        schedules_copy: over.schedules_copy.or(base.schedules_copy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use tempfile::{TempDir, tempdir};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn isolated() -> (MutexGuard<'static, ()>, TempDir) {
        let guard = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let cwd = tempdir().unwrap();
        unsafe {
            env::set_var(CONFIG_DIR_ENV, cwd.path().join("config"));
        }
        (guard, cwd)
    }

    #[test]
    fn merges_user_and_local_and_overrides() {
        let (_guard, cwd) = isolated();

        let user_cfg = Config {
            token: Some("user-token".into()),
            base_url: Some("https://example.test".into()),
            timeout_secs: Some(10),
            default_location: Some("Home".into()),
            rules_copy: Some(CopyNaming::Suffix(" (copy)".into())),
            ..Config::default()
        };
        save(Scope::User, &user_cfg, cwd.path()).unwrap();

        let local_cfg = Config {
            token: Some("local-token".into()),
            import_dir: Some("rules".into()),
            ..Config::default()
        };
        save(Scope::Local, &local_cfg, cwd.path()).unwrap();

        let effective = resolve(cwd.path(), Overrides::default()).unwrap();
        assert_eq!(effective.token, "local-token");
        assert_eq!(effective.base_url, "https://example.test");
        assert_eq!(effective.timeout, Duration::from_secs(10));
        assert_eq!(effective.import_dir, cwd.path().join("rules"));
        assert_eq!(effective.default_location.as_deref(), Some("Home"));
        assert_eq!(effective.rules_copy, Some(CopyNaming::Suffix(" (copy)".into())));
        assert_eq!(effective.schedules_copy, None);

        let overridden = resolve(
            cwd.path(),
            Overrides {
                token: Some("flag-token".into()),
                base_url: Some("https://override.test".into()),
                timeout_secs: Some(2),
                import_dir: None,
            },
        )
        .unwrap();
        assert_eq!(overridden.token, "flag-token");
        assert_eq!(overridden.base_url, "https://override.test");
        assert_eq!(overridden.timeout, Duration::from_secs(2));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let (_guard, cwd) = isolated();
        let effective = resolve(
            cwd.path(),
            Overrides {
                token: Some(" padded ".into()),
                ..Overrides::default()
            },
        )
        .unwrap();

        assert_eq!(effective.token, "padded");
        assert_eq!(effective.base_url, DEFAULT_BASE_URL);
        assert_eq!(effective.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(effective.import_dir, cwd.path());
    }

    #[test]
    fn errors_when_missing_token() {
        let (_guard, cwd) = isolated();
        let err = resolve(cwd.path(), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("API token is required"));

        let blank = Overrides {
            token: Some("   ".into()),
            ..Overrides::default()
        };
        assert!(resolve(cwd.path(), blank).is_err());
    }

    #[test]
    fn log_file_lives_in_user_dir() {
        let (_guard, cwd) = isolated();
        assert_eq!(log_path().unwrap(), cwd.path().join("config").join("stterm.log"));
        assert_eq!(
            config_path(Scope::Local, cwd.path()).unwrap(),
            cwd.path().join(".stterm.yaml")
        );
    }
}
