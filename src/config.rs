// ⚙️ Configuration - JSON config file with defaults
// A missing file means "use defaults"; a malformed one is an error.

use crate::catalog::Catalog;
use crate::entities::DEFAULT_GENERAL_SENTINEL;
use crate::ranker::{RewardRanker, DEFAULT_REWARD_SCALE};
use crate::resolver::RateResolver;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that points at the config file
pub const CONFIG_ENV: &str = "CASHBACK_CONFIG";

pub const DEFAULT_CONFIG_FILE: &str = "cashback.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Cards CSV; used together with `rules_path`
    pub cards_path: Option<PathBuf>,

    /// Rules CSV; used together with `cards_path`
    pub rules_path: Option<PathBuf>,

    /// JSON catalog; takes precedence over the CSV pair
    pub catalog_path: Option<PathBuf>,

    /// Rule-name tag identifying general-spending rules
    pub general_sentinel: String,

    /// Decimal places kept in reward amounts
    pub reward_scale: u32,

    /// Bind address of the HTTP server
    pub server_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            cards_path: None,
            rules_path: None,
            catalog_path: None,
            general_sentinel: DEFAULT_GENERAL_SENTINEL.to_string(),
            reward_scale: DEFAULT_REWARD_SCALE,
            server_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// `$CASHBACK_CONFIG` if set, otherwise `./cashback.json`
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// JSON catalog, then the CSV pair, then the built-in demo
    pub fn load_catalog(&self) -> Result<Catalog> {
        if let Some(path) = &self.catalog_path {
            return Catalog::from_json_file(path);
        }

        match (&self.cards_path, &self.rules_path) {
            (Some(cards), Some(rules)) => Catalog::from_csv_files(cards, rules),
            (None, None) => Catalog::demo(),
            _ => anyhow::bail!("cards_path and rules_path must be configured together"),
        }
    }

    pub fn ranker(&self) -> RewardRanker {
        RewardRanker::new()
            .with_resolver(RateResolver::with_sentinel(self.general_sentinel.clone()))
            .with_reward_scale(self.reward_scale)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.general_sentinel, "一般消費");
        assert_eq!(config.reward_scale, 2);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cashback.json");
        fs::write(&path, r#"{"general_sentinel": "General spending", "reward_scale": 0}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.general_sentinel, "General spending");
        assert_eq!(config.reward_scale, 0);
        assert_eq!(config.server_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cashback.json");
        fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_catalog_is_demo() {
        let catalog = AppConfig::default().load_catalog().unwrap();
        assert_eq!(catalog.card_count(), 5);
    }

    #[test]
    fn test_half_configured_csv_pair_is_error() {
        let config = AppConfig {
            cards_path: Some(PathBuf::from("cards.csv")),
            ..AppConfig::default()
        };
        assert!(config.load_catalog().is_err());
    }
}
