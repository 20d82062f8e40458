//! Configuration loading: file discovery, env-var overrides, and host groups.
//!
//! Mirrors the resolution order used throughout the crate: explicit value,
//! then config file, then a hardcoded default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::{env, fs};

/// Name used for the default config file (`~/.{APP_NAME}.yaml`) and history file.
pub const APP_NAME: &str = "fleetsh";

/// A named collection of host specs sharing an optional default user.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct HostGroup {
    /// Fallback user applied to entries that don't set their own.
    #[serde(default)]
    pub user: Option<String>,
    /// Raw host-spec strings, parsed through the same grammar as CLI args.
    #[serde(default)]
    pub hosts: Vec<String>,
}

/// Top-level configuration, loaded from YAML and overridable by environment.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    /// Fallback user applied when a host spec has none.
    #[serde(default)]
    pub username: Option<String>,
    /// Path to the interactive-shell history file.
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    /// Default identity file used when a host has no config-resolved keys.
    #[serde(default)]
    pub ssh_private_key: Option<PathBuf>,
    /// Known-hosts file used for host-key verification.
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
    /// UI prompt string.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Named host groups, selectable with `--host-group`.
    #[serde(default)]
    pub groups: HashMap<String, HostGroup>,
}

impl Config {
    /// Loads config from `path` if given, else searches `$HOME/.{APP_NAME}.yaml`.
    ///
    /// A missing file (no `--config` and no home-dir default) is not an error;
    /// an existing but unreadable or malformed file is.
    pub fn load(explicit_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::load_from_file(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)
                    .with_context(|| format!("failed to load config file {}", path.display()))?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(format!(".{APP_NAME}.yaml")))
    }

    fn apply_env_overrides(&mut self) {
        let prefix = format!("{}_", APP_NAME.to_uppercase());
        if let Ok(username) = env::var(format!("{prefix}USERNAME")) {
            self.username = Some(username);
        }
        if let Ok(history) = env::var(format!("{prefix}HISTORY_FILE")) {
            self.history_file = Some(PathBuf::from(history));
        }
        if let Ok(key) = env::var(format!("{prefix}SSH_PRIVATE_KEY")) {
            self.ssh_private_key = Some(PathBuf::from(key));
        }
        if let Ok(known_hosts) = env::var(format!("{prefix}KNOWN_HOSTS")) {
            self.known_hosts = Some(PathBuf::from(known_hosts));
        }
        if let Ok(prompt) = env::var(format!("{prefix}PROMPT")) {
            self.prompt = Some(prompt);
        }
    }

    /// Resolves the history file path: explicit config value, else `$HOME/.{APP_NAME}.history`.
    pub fn history_file_path(&self) -> PathBuf {
        self.history_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(env::temp_dir)
                .join(format!(".{APP_NAME}.history"))
        })
    }

    /// Returns the resolved prompt string, falling back to a default.
    pub fn prompt_or_default(&self) -> &str {
        self.prompt.as_deref().unwrap_or("fleetsh> ")
    }

    /// Directory used for the file-backed logger.
    pub fn log_dir() -> PathBuf {
        if let Ok(dir) = env::var("FLEETSH_LOG_DIR") {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_no_groups() {
        let config = Config::default();
        assert!(config.groups.is_empty());
        assert_eq!(config.prompt_or_default(), "fleetsh> ");
    }

    #[test]
    fn load_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "username: deploy\nprompt: \"fleet> \"\ngroups:\n  web:\n    user: ops\n    hosts:\n      - host1\n      - host2:2222\n"
        )
        .unwrap();
        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.username.as_deref(), Some("deploy"));
        assert_eq!(config.prompt_or_default(), "fleet> ");
        let web = config.groups.get("web").unwrap();
        assert_eq!(web.user.as_deref(), Some("ops"));
        assert_eq!(web.hosts, vec!["host1".to_string(), "host2:2222".to_string()]);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let missing = PathBuf::from("/nonexistent/fleetsh-config-test.yaml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn history_file_path_falls_back_to_home_dot_file() {
        let config = Config::default();
        let path = config.history_file_path();
        assert!(path.to_string_lossy().ends_with(".fleetsh.history"));
    }
}
