// ⚙️ Configuration - Where the ledger lives, which identity strategy, how to batch
// Optional TOML file, every field defaulted; bot credentials may come from the environment.

use crate::batcher::{BatchPolicy, Boundary};
use crate::identity::StrategyKind;
use crate::retention::DEFAULT_RETENTION_DAYS;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const TOKEN_ENV: &str = "RELEASE_WATCH_BOT_TOKEN";
pub const CHANNEL_ENV: &str = "RELEASE_WATCH_CHANNEL_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// JSON snapshot written by the external fetcher
    #[serde(default = "default_listing_path")]
    pub listing_path: PathBuf,

    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,

    #[serde(default = "default_site_prefix")]
    pub site_prefix: String,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Overrides the per-strategy default ceiling
    #[serde(default)]
    pub batch_ceiling: Option<usize>,

    /// Overrides the per-strategy default boundary
    #[serde(default)]
    pub batch_boundary: Option<Boundary>,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            listing_path: default_listing_path(),
            strategy: default_strategy(),
            site_prefix: default_site_prefix(),
            retention_days: default_retention_days(),
            batch_ceiling: None,
            batch_boundary: None,
            telegram: TelegramConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel_id: None,
            api_base: default_api_base(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("discovered_movies.json")
}

fn default_listing_path() -> PathBuf {
    PathBuf::from("listing.json")
}

fn default_strategy() -> StrategyKind {
    StrategyKind::Category
}

fn default_site_prefix() -> String {
    "https://regmovies.com".to_string()
}

fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl WatchConfig {
    /// Load from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse {:?}", path.as_ref()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: WatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path, or defaults when none is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(env::var(TOKEN_ENV).ok(), env::var(CHANNEL_ENV).ok());
        Ok(config)
    }

    /// Environment values win over the file
    pub fn apply_overrides(&mut self, token: Option<String>, channel_id: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.telegram.token = Some(token);
        }
        if let Some(channel_id) = channel_id.filter(|c| !c.is_empty()) {
            self.telegram.channel_id = Some(channel_id);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention_days < 0 {
            bail!("retention_days must not be negative (got {})", self.retention_days);
        }
        self.batch_policy()?;
        Ok(())
    }

    pub fn batch_policy(&self) -> Result<BatchPolicy> {
        let defaults = BatchPolicy::for_strategy(self.strategy);
        BatchPolicy::new(
            self.batch_ceiling.unwrap_or(defaults.ceiling),
            self.batch_boundary.unwrap_or(defaults.boundary),
        )
    }

    /// Token and channel, required for live delivery
    pub fn telegram_credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .telegram
            .token
            .as_deref()
            .with_context(|| format!("No bot token configured (set {} or [telegram].token)", TOKEN_ENV))?;
        let channel = self
            .telegram
            .channel_id
            .as_deref()
            .with_context(|| format!("No channel configured (set {} or [telegram].channel_id)", CHANNEL_ENV))?;
        Ok((token, channel))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatchConfig::from_toml("").unwrap();

        assert_eq!(config.strategy, StrategyKind::Category);
        assert_eq!(config.retention_days, 60);
        assert_eq!(config.ledger_path, PathBuf::from("discovered_movies.json"));
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(
            config.batch_policy().unwrap(),
            BatchPolicy {
                ceiling: 100,
                boundary: Boundary::BeforeOverflow
            }
        );
    }

    #[test]
    fn test_code_strategy_defaults() {
        let config = WatchConfig::from_toml(r#"strategy = "code""#).unwrap();
        assert_eq!(
            config.batch_policy().unwrap(),
            BatchPolicy {
                ceiling: 30,
                boundary: Boundary::ExactMultiple
            }
        );
    }

    #[test]
    fn test_batch_overrides() {
        let config = WatchConfig::from_toml(
            r#"
            strategy = "code"
            batch_ceiling = 10
            batch_boundary = "before-overflow"
            "#,
        )
        .unwrap();

        let policy = config.batch_policy().unwrap();
        assert_eq!(policy.ceiling, 10);
        assert_eq!(policy.boundary, Boundary::BeforeOverflow);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(WatchConfig::from_toml("batch_ceiling = 0").is_err());
        assert!(WatchConfig::from_toml("retention_days = -1").is_err());
        assert!(WatchConfig::from_toml(r#"strategy = "title""#).is_err());
    }

    #[test]
    fn test_env_overrides_and_credentials() {
        let mut config = WatchConfig::from_toml(
            r#"
            [telegram]
            token = "from-file"
            "#,
        )
        .unwrap();
        assert!(config.telegram_credentials().is_err());

        config.apply_overrides(Some("from-env".to_string()), Some("@channel".to_string()));
        assert_eq!(config.telegram_credentials().unwrap(), ("from-env", "@channel"));

        config.apply_overrides(Some(String::new()), None);
        assert_eq!(config.telegram.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.toml");
        fs::write(&path, "site_prefix = \"https://example.com\"\nretention_days = 30\n").unwrap();

        let config = WatchConfig::from_file(&path).unwrap();
        assert_eq!(config.site_prefix, "https://example.com");
        assert_eq!(config.retention_days, 30);
    }
}
