//! Application settings and configuration
//!
//! This module loads the key pool configuration from environment variables
//! (optionally via a `.env` file) with sensible defaults.

use crate::services::key_pool::{ApiKeyInfo, ApiKeyPool, PoolConfig, RotationStrategy};
use crate::utils::PollConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Video generation settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VeoSettings {
    /// Key rotation and limits
    pub key_pool: PoolConfig,
    /// Seconds between job status checks
    pub poll_interval_seconds: u64,
    /// Seconds before a generation job is abandoned
    pub timeout_seconds: u64,
}

impl Default for VeoSettings {
    fn default() -> Self {
        Self {
            key_pool: PoolConfig::default(),
            poll_interval_seconds: 5,
            timeout_seconds: 300,
        }
    }
}

impl VeoSettings {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.poll_interval_seconds),
            Duration::from_secs(self.timeout_seconds),
        )
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    pub log_level: String,

    /// Comma-separated `key[:alias[:project_id]]` entries
    #[serde(skip_serializing)]
    pub google_api_keys: String,
    /// Default project ID for keys that do not name one
    pub google_project_id: Option<String>,
    pub google_location: String,

    pub veo: VeoSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "tale".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            google_api_keys: String::new(),
            google_project_id: None,
            google_location: "us-central1".to_string(),
            veo: VeoSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a `.env` file (if present) and the environment
    pub fn load() -> Result<Self> {
        // Missing .env is fine; real deployments set variables directly
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from a specific env file, without touching the
    /// process environment
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let vars = dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to read env file {}", path.display()))?
            .collect::<std::result::Result<HashMap<String, String>, _>>()
            .with_context(|| format!("Invalid entry in env file {}", path.display()))?;

        Self::from_lookup(|name| vars.get(name).cloned())
    }

    /// Build settings from a variable lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let strategy = match var("VEO_KEY_ROTATION_STRATEGY") {
            Some(value) => value
                .parse::<RotationStrategy>()
                .context("Invalid VEO_KEY_ROTATION_STRATEGY value")?,
            None => defaults.veo.key_pool.strategy,
        };

        let key_pool = PoolConfig {
            strategy,
            daily_limit: parse_or(
                var("VEO_DAILY_LIMIT_PER_KEY"),
                "VEO_DAILY_LIMIT_PER_KEY",
                defaults.veo.key_pool.daily_limit,
            )?,
            max_concurrent_per_key: parse_or(
                var("VEO_MAX_CONCURRENT_PER_KEY"),
                "VEO_MAX_CONCURRENT_PER_KEY",
                defaults.veo.key_pool.max_concurrent_per_key,
            )?,
            max_failures_per_key: parse_or(
                var("VEO_MAX_FAILURES_PER_KEY"),
                "VEO_MAX_FAILURES_PER_KEY",
                defaults.veo.key_pool.max_failures_per_key,
            )?,
        };

        let settings = Self {
            app_name: var("APP_NAME").unwrap_or(defaults.app_name),
            app_version: defaults.app_version,
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),

            google_api_keys: var("GOOGLE_API_KEYS").context("GOOGLE_API_KEYS is not set")?,
            google_project_id: var("GOOGLE_PROJECT_ID").map(|v| v.trim().to_string()),
            google_location: var("GOOGLE_LOCATION").unwrap_or(defaults.google_location),

            veo: VeoSettings {
                key_pool,
                poll_interval_seconds: parse_or(
                    var("VEO_POLL_INTERVAL_SECS"),
                    "VEO_POLL_INTERVAL_SECS",
                    defaults.veo.poll_interval_seconds,
                )?,
                timeout_seconds: parse_or(
                    var("VEO_TIMEOUT_SECS"),
                    "VEO_TIMEOUT_SECS",
                    defaults.veo.timeout_seconds,
                )?,
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    fn validate(&self) -> Result<()> {
        let infos = self.api_key_infos();
        if infos.is_empty() {
            anyhow::bail!("GOOGLE_API_KEYS must contain at least one key");
        }

        let pool = &self.veo.key_pool;
        if pool.daily_limit == 0 {
            anyhow::bail!("VEO_DAILY_LIMIT_PER_KEY must be > 0");
        }
        if pool.max_concurrent_per_key == 0 {
            anyhow::bail!("VEO_MAX_CONCURRENT_PER_KEY must be > 0");
        }
        if pool.max_failures_per_key == 0 {
            anyhow::bail!("VEO_MAX_FAILURES_PER_KEY must be > 0");
        }
        if self.veo.poll_interval_seconds == 0 {
            anyhow::bail!("VEO_POLL_INTERVAL_SECS must be > 0");
        }
        if self.veo.timeout_seconds == 0 {
            anyhow::bail!("VEO_TIMEOUT_SECS must be > 0");
        }

        Ok(())
    }

    /// Parsed API keys with aliases and project IDs
    pub fn api_key_infos(&self) -> Vec<ApiKeyInfo> {
        ApiKeyInfo::parse_list(&self.google_api_keys, self.google_project_id.as_deref())
    }

    /// Aliases of entries whose raw key already appeared earlier in the list
    pub fn duplicate_key_aliases(&self) -> Vec<String> {
        let infos = self.api_key_infos();
        infos
            .iter()
            .enumerate()
            .filter(|(idx, info)| infos[..*idx].contains(*info))
            .map(|(_, info)| info.alias().to_string())
            .collect()
    }

    /// Build the video generation key pool
    pub fn build_pool(&self) -> Result<ApiKeyPool> {
        for alias in self.duplicate_key_aliases() {
            tracing::warn!(alias = %alias, "Duplicate API key configured; entries share quota");
        }

        ApiKeyPool::new(self.api_key_infos(), self.veo.key_pool.clone())
            .context("Failed to build API key pool")
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value: {}", name, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[("GOOGLE_API_KEYS", "k1")])).unwrap();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.google_location, "us-central1");
        assert_eq!(settings.veo.key_pool, PoolConfig::default());
        assert_eq!(
            settings.veo.poll_config(),
            PollConfig::new(Duration::from_secs(5), Duration::from_secs(300))
        );
    }

    #[test]
    fn test_requires_api_keys() {
        let err = Settings::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEYS"));

        let err = Settings::from_lookup(lookup(&[("GOOGLE_API_KEYS", " , ")])).unwrap_err();
        assert!(err.to_string().contains("at least one key"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("GOOGLE_API_KEYS", "k1:prod:proj-1,k2:backup"),
            ("GOOGLE_PROJECT_ID", "default-project"),
            ("VEO_KEY_ROTATION_STRATEGY", "Least_Used"),
            ("VEO_DAILY_LIMIT_PER_KEY", "25"),
            ("VEO_MAX_CONCURRENT_PER_KEY", "4"),
            ("VEO_MAX_FAILURES_PER_KEY", "5"),
            ("VEO_TIMEOUT_SECS", "600"),
        ]))
        .unwrap();

        assert_eq!(settings.veo.key_pool.strategy, RotationStrategy::LeastUsed);
        assert_eq!(settings.veo.key_pool.daily_limit, 25);
        assert_eq!(settings.veo.key_pool.max_concurrent_per_key, 4);
        assert_eq!(settings.veo.key_pool.max_failures_per_key, 5);
        assert_eq!(settings.veo.timeout_seconds, 600);

        let infos = settings.api_key_infos();
        assert_eq!(infos[0].project_id(), Some("proj-1"));
        assert_eq!(infos[1].alias(), "backup");
        assert_eq!(infos[1].project_id(), Some("default-project"));
    }

    #[test]
    fn test_invalid_values() {
        let err = Settings::from_lookup(lookup(&[
            ("GOOGLE_API_KEYS", "k1"),
            ("VEO_KEY_ROTATION_STRATEGY", "weighted"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("VEO_KEY_ROTATION_STRATEGY"));

        let err = Settings::from_lookup(lookup(&[
            ("GOOGLE_API_KEYS", "k1"),
            ("VEO_DAILY_LIMIT_PER_KEY", "ten"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("VEO_DAILY_LIMIT_PER_KEY"));

        let err = Settings::from_lookup(lookup(&[
            ("GOOGLE_API_KEYS", "k1"),
            ("VEO_MAX_CONCURRENT_PER_KEY", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("must be > 0"));
    }

    #[test]
    fn test_build_pool() {
        let settings = Settings::from_lookup(lookup(&[
            ("GOOGLE_API_KEYS", "k1:prod,k2:backup"),
            ("VEO_DAILY_LIMIT_PER_KEY", "3"),
        ]))
        .unwrap();

        let pool = settings.build_pool().unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.daily_limit(), 3);
        assert_eq!(pool.get_total_remaining(), 6);
    }

    #[test]
    fn test_duplicate_key_aliases() {
        let settings = Settings::from_lookup(lookup(&[(
            "GOOGLE_API_KEYS",
            "k1:prod,k2:backup,k1:prod-again,k3,k2:backup-again",
        )]))
        .unwrap();
        assert_eq!(
            settings.duplicate_key_aliases(),
            vec!["prod-again".to_string(), "backup-again".to_string()]
        );

        // Duplicates collapse onto one shared quota
        let pool = settings.build_pool().unwrap();
        assert_eq!(pool.len(), 5);
        pool.mark_used("k1");
        assert_eq!(pool.key_status("prod").unwrap().used, 1);
        assert_eq!(pool.key_status("prod-again").unwrap().used, 1);

        let unique = Settings::from_lookup(lookup(&[("GOOGLE_API_KEYS", "k1,k2")])).unwrap();
        assert!(unique.duplicate_key_aliases().is_empty());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let settings =
            Settings::from_lookup(lookup(&[("GOOGLE_API_KEYS", "super-secret-key:prod")])).unwrap();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("super-secret-key"));
        assert!(json.contains("round_robin"));
    }

    #[test]
    fn test_from_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "GOOGLE_API_KEYS=k1:prod,k2:backup").unwrap();
        writeln!(file, "VEO_KEY_ROTATION_STRATEGY=random").unwrap();
        writeln!(file, "LOG_LEVEL=debug").unwrap();
        file.flush().unwrap();

        let settings = Settings::from_env_file(file.path()).unwrap();
        assert_eq!(settings.api_key_infos().len(), 2);
        assert_eq!(settings.veo.key_pool.strategy, RotationStrategy::Random);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_from_missing_env_file() {
        let err = Settings::from_env_file("/nonexistent/tale.env").unwrap_err();
        assert!(err.to_string().contains("Failed to read env file"));
    }
}
