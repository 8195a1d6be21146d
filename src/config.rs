use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::downloader::FetchSettings;
use crate::rewriter::ForeignPolicy;
use crate::transport::DEFAULT_USER_AGENT;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    pub run_timeout_secs: u64,
    pub max_concurrent: usize,
    pub per_host_concurrent: usize,
    pub foreign_policy: ForeignPolicy,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_base: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_secs: 30,
            run_timeout_secs: 300,
            max_concurrent: 8,
            per_host_concurrent: 4,
            foreign_policy: ForeignPolicy::Keep,
            telegram_bot_token: None,
            telegram_chat_id: None,
            telegram_api_base: DEFAULT_TELEGRAM_API.to_string(),
        }
    }
}

impl MirrorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Missing file means defaults. A file that exists but cannot be used is
    /// reported and also falls back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config file: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            max_concurrent: self.max_concurrent.max(1),
            per_host_concurrent: self.per_host_concurrent.max(1),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            run_timeout: Duration::from_secs(self.run_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_uses_defaults_for_the_rest() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"telegram_bot_token": "123:abc", "telegram_chat_id": "42", "foreign_policy": "strip"}}"#
        )
        .unwrap();

        let config = MirrorConfig::load(file.path()).unwrap();
        assert_eq!(config.telegram_bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.telegram_chat_id.as_deref(), Some("42"));
        assert_eq!(config.foreign_policy, ForeignPolicy::Strip);
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.telegram_api_base, DEFAULT_TELEGRAM_API);
    }

    #[test]
    fn test_invalid_file_is_an_error_but_load_or_default_recovers() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = MirrorConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
        assert_eq!(MirrorConfig::load_or_default(file.path()), MirrorConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MirrorConfig::load_or_default(&dir.path().join("absent.json"));
        assert_eq!(config, MirrorConfig::default());
    }

    #[test]
    fn test_fetch_settings() {
        let config = MirrorConfig {
            max_concurrent: 0,
            fetch_timeout_secs: 5,
            ..MirrorConfig::default()
        };
        let settings = config.fetch_settings();
        assert_eq!(settings.max_concurrent, 1);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(5));
        assert_eq!(settings.run_timeout, Duration::from_secs(300));
    }
}
