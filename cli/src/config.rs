// Configuration management for the gattscope CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/gattscope/config.json
// - Linux: ~/.config/gattscope/config.json
// - Windows: %APPDATA%\gattscope\config.json

use anyhow::{Context, Result};
use gattscope_core::{PluginConfig, ReadFailurePolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Session tuning handed to the plugin
    pub plugin: PluginConfig,

    /// Print results as JSON instead of a tree
    #[serde(default)]
    pub json_output: bool,
}

fn parse_policy(value: &str) -> Result<ReadFailurePolicy> {
    match value.to_ascii_lowercase().as_str() {
        "omit" => Ok(ReadFailurePolicy::Omit),
        "retry_once" | "retry-once" => Ok(ReadFailurePolicy::RetryOnce),
        "report" => Ok(ReadFailurePolicy::Report),
        _ => anyhow::bail!("Invalid read failure policy: {} (omit, retry_once, report)", value),
    }
}

fn policy_name(policy: ReadFailurePolicy) -> &'static str {
    match policy {
        ReadFailurePolicy::Omit => "omit",
        ReadFailurePolicy::RetryOnce => "retry_once",
        ReadFailurePolicy::Report => "report",
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("gattscope");

        // Create directory if it doesn't exist
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from file, or create default if not exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value. The caller persists the result.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut plugin = self.plugin.clone();
        match key {
            "scan_window_ms" => {
                plugin.scan_window_ms = value.parse().context("Invalid number")?;
            }
            "max_retries" => {
                plugin.max_retries = value.parse().context("Invalid number")?;
            }
            "busy_status_code" => {
                plugin.busy_status_code = value.parse().context("Invalid status code")?;
            }
            "preferred_mtu" => {
                plugin.preferred_mtu = value.parse().context("Invalid MTU")?;
            }
            "require_scanned_device" => {
                plugin.require_scanned_device =
                    value.parse().context("Invalid boolean value")?;
            }
            "read_failure_policy" => {
                plugin.read_failure_policy = parse_policy(value)?;
            }
            "operation_timeout_ms" => {
                plugin.operation_timeout_ms = if value.is_empty() || value == "off" {
                    None
                } else {
                    Some(value.parse().context("Invalid number")?)
                };
            }
            "json_output" => {
                self.json_output = value.parse().context("Invalid boolean value")?;
                return Ok(());
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        plugin.validate()?;
        self.plugin = plugin;
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        let plugin = &self.plugin;
        vec![
            ("scan_window_ms".to_string(), plugin.scan_window_ms.to_string()),
            ("max_retries".to_string(), plugin.max_retries.to_string()),
            ("busy_status_code".to_string(), plugin.busy_status_code.to_string()),
            ("preferred_mtu".to_string(), plugin.preferred_mtu.to_string()),
            (
                "require_scanned_device".to_string(),
                plugin.require_scanned_device.to_string(),
            ),
            (
                "read_failure_policy".to_string(),
                policy_name(plugin.read_failure_policy).to_string(),
            ),
            (
                "operation_timeout_ms".to_string(),
                plugin
                    .operation_timeout_ms
                    .map(|ms| ms.to_string())
                    .unwrap_or_else(|| "off".to_string()),
            ),
            ("json_output".to_string(), self.json_output.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.plugin.scan_window_ms, 10_000);
        assert!(config.plugin.require_scanned_device);
        assert!(!config.json_output);
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("max_retries", "5").unwrap();
        config.set("read_failure_policy", "retry-once").unwrap();
        config.set("operation_timeout_ms", "15000").unwrap();

        assert_eq!(config.get("max_retries").as_deref(), Some("5"));
        assert_eq!(config.get("read_failure_policy").as_deref(), Some("retry_once"));
        assert_eq!(config.get("operation_timeout_ms").as_deref(), Some("15000"));

        config.set("operation_timeout_ms", "off").unwrap();
        assert_eq!(config.plugin.operation_timeout_ms, None);
        assert!(config.get("nonsense").is_none());
    }

    #[test]
    fn test_invalid_values_leave_config_untouched() {
        let mut config = Config::default();
        assert!(config.set("preferred_mtu", "4096").is_err());
        assert!(config.set("scan_window_ms", "0").is_err());
        assert!(config.set("max_retries", "many").is_err());
        assert!(config.set("unknown_key", "1").is_err());
        assert_eq!(config.plugin, PluginConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.plugin, PluginConfig::default());

        let mut config = created;
        config.set("json_output", "true").unwrap();
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert!(reloaded.json_output);
    }
}
