// ABOUTME: Settings types and parsing for stackpilot.yml.
// ABOUTME: Every field has a default; discovery looks in the usual three places.

mod defaults;
mod init;
mod polling;

pub use defaults::{DeploymentDefaults, MethodSetting};
pub use init::init_config;
pub use polling::PollingSettings;

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "stackpilot.yml";
pub const CONFIG_FILENAME_ALT: &str = "stackpilot.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stackpilot/config.yml";

/// Name of the bootstrap stack when none is configured.
pub const DEFAULT_TOOLKIT_STACK_NAME: &str = "CDKToolkit";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_toolkit_stack_name")]
    pub toolkit_stack_name: String,

    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub rollback: RollbackSettings,

    #[serde(default)]
    pub assets: AssetSettings,

    #[serde(default)]
    pub account_cache: AccountCacheSettings,

    #[serde(default)]
    pub deployment: DeploymentDefaults,
}

fn default_toolkit_stack_name() -> String {
    DEFAULT_TOOLKIT_STACK_NAME.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            toolkit_stack_name: default_toolkit_stack_name(),
            polling: PollingSettings::default(),
            rollback: RollbackSettings::default(),
            assets: AssetSettings::default(),
            account_cache: AccountCacheSettings::default(),
            deployment: DeploymentDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollbackSettings {
    /// Upper bound on state-changing rollback calls per invocation.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for RollbackSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetSettings {
    #[serde(default = "default_asset_concurrency")]
    pub concurrency: usize,
}

fn default_asset_concurrency() -> usize {
    4
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            concurrency: default_asset_concurrency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountCacheSettings {
    /// Defaults to `$HOME/.stackpilot/cache/accounts_partitions.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    1000
}

impl Default for AccountCacheSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: default_max_entries(),
        }
    }
}

impl AccountCacheSettings {
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => {
                let home = std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."));
                home.join(".stackpilot")
                    .join("cache")
                    .join("accounts_partitions.json")
            }
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like [`Settings::discover`], falling back to defaults when no file exists.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.toolkit_stack_name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "toolkit_stack_name cannot be empty".to_string(),
            ));
        }
        if self.rollback.max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "rollback.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.assets.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "assets.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = Settings::from_yaml("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.toolkit_stack_name, "CDKToolkit");
        assert_eq!(settings.rollback.max_iterations, 10);
        assert_eq!(settings.account_cache.max_entries, 1000);
    }

    #[test]
    fn parses_humantime_intervals() {
        let settings = Settings::from_yaml(
            "polling:\n  stabilize_interval: 10s\n  monitor_interval: 500ms\n",
        )
        .unwrap();
        assert_eq!(settings.polling.stabilize_interval, Duration::from_secs(10));
        assert_eq!(settings.polling.monitor_interval, Duration::from_millis(500));
    }

    #[test]
    fn rejects_zero_rollback_iterations() {
        let err = Settings::from_yaml("rollback:\n  max_iterations: 0\n").unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(Settings::from_yaml("toolkit: Foo\n").is_err());
    }

    #[test]
    fn explicit_cache_path_wins() {
        let settings = AccountCacheSettings {
            path: Some(PathBuf::from("/tmp/accounts.json")),
            max_entries: 5,
        };
        assert_eq!(settings.resolved_path(), PathBuf::from("/tmp/accounts.json"));
    }
}
