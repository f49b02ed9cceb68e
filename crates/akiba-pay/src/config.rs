//! Wallet configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use akiba_auth::AuthConfig;
use akiba_core::RoundUpRule;

use crate::error::{Result, TransactionError};

/// Top-level wallet configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AkibaConfig {
    /// PIN lockout and token settings
    pub auth: AuthConfig,

    /// The user's round-up rule
    pub round_up: RoundUpRule,

    /// ISO currency code amounts are expressed in
    pub currency: String,
}

impl Default for AkibaConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            round_up: RoundUpRule::default(),
            currency: "KES".to_string(),
        }
    }
}

impl AkibaConfig {
    /// Platform config location, `<config dir>/akiba/config.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("akiba")
            .join("config.json")
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.round_up.validate()?;
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(TransactionError::Config(format!(
                "currency must be a three-letter ISO code, got {:?}",
                self.currency
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akiba_core::{Allocation, LockoutPolicy, Money};
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AkibaConfig {
            auth: AuthConfig::strict(),
            round_up: RoundUpRule::fixed(Money::from_major(50))
                .with_allocation(Allocation::new(30, 70).unwrap()),
            currency: "UGX".to_string(),
        };
        config.save(&path).unwrap();

        let loaded = AkibaConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.auth.lockout, LockoutPolicy::strict());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "currency": "TZS" }"#).unwrap();

        let loaded = AkibaConfig::load(&path).unwrap();
        assert_eq!(loaded.currency, "TZS");
        assert_eq!(loaded.auth, AuthConfig::default());
        assert!(!loaded.round_up.enabled);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let loaded = AkibaConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, AkibaConfig::default());
    }

    #[test]
    fn test_rejects_bad_strategy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "round_up": {
                "enabled": true,
                "strategy": { "type": "percentage", "bps": 20000 }
            } }"#,
        )
        .unwrap();
        assert!(AkibaConfig::load(&path).is_err());
    }

    #[test]
    fn test_rejects_bad_currency() {
        let config = AkibaConfig {
            currency: "shillings".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TransactionError::Config(_))));
    }
}
