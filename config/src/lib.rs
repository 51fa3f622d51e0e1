//! Loading `~/.fetchgate/config.toml` and applying environment overrides.
//!
//! A missing file yields defaults. Environment variables are applied after the
//! file and always win:
//!
//! - `FETCHGATE_ALLOW_HTTP`: truthy enables plain `http`
//! - `FETCHGATE_ALLOWED_DOMAINS`: comma-separated patterns appended to `allowlist.domains`
//! - `FETCHGATE_ALLOWLIST_FILE`: replaces `allowlist.file`
//!
//! `FETCHGATE_ALLOW_INSECURE_OVERRIDES` is read by the fetch crate itself when
//! the config is resolved.

use std::path::{Path, PathBuf};
use std::{env, fs, io};

use fetchgate_fetch::GateConfig;
use fetchgate_fetch::config::{
    AllowlistConfig, ENV_ALLOW_HTTP, ENV_ALLOWED_DOMAINS, ENV_ALLOWLIST_FILE, is_truthy_env,
};
use thiserror::Error;
use toml::de;

const CONFIG_DIR: &str = ".fetchgate";
const CONFIG_FILE: &str = "config.toml";
const ALLOWLIST_FILE: &str = "allowlist.txt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// `~/.fetchgate`
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR))
}

/// `~/.fetchgate/config.toml`
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// `~/.fetchgate/allowlist.txt`
#[must_use]
pub fn default_allowlist_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(ALLOWLIST_FILE))
}

/// Load the user config with environment overrides applied.
pub fn load() -> Result<GateConfig, ConfigError> {
    let mut config = match config_path() {
        Some(path) => load_from(&path)?,
        None => GateConfig::default(),
    };

    let allowlist = config.allowlist.get_or_insert_with(AllowlistConfig::default);
    if allowlist.file.is_none() {
        allowlist.file = default_allowlist_path();
    }

    apply_env(&mut config, |name| env::var(name).ok());
    Ok(config)
}

/// Read `path` as a config file. A missing file yields defaults.
pub fn load_from(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(GateConfig::default());
        }
        Err(err) => {
            tracing::warn!("Failed to read config at {:?}: {}", path, err);
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };

    toml::from_str(&content).map_err(|err| {
        tracing::warn!("Failed to parse config at {:?}: {}", path, err);
        ConfigError::Parse {
            path: path.to_path_buf(),
            source: err,
        }
    })
}

/// Apply the `FETCHGATE_*` overrides, reading variables through `lookup`.
pub fn apply_env(config: &mut GateConfig, lookup: impl Fn(&str) -> Option<String>) {
    if is_truthy_env(lookup(ENV_ALLOW_HTTP).as_deref()) {
        config.allow_http = true;
    }

    if let Some(raw) = lookup(ENV_ALLOWED_DOMAINS) {
        let domains = raw
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        config
            .allowlist
            .get_or_insert_with(AllowlistConfig::default)
            .domains
            .extend(domains);
    }

    if let Some(file) = lookup(ENV_ALLOWLIST_FILE).filter(|f| !f.trim().is_empty()) {
        config
            .allowlist
            .get_or_insert_with(AllowlistConfig::default)
            .file = Some(PathBuf::from(file.trim()));
    }
}
