use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{FieldVaultError, Result};

/// Deployment environment.  Production refuses to run without a real key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Development,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = FieldVaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" | "stage" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            other => Err(FieldVaultError::ConfigurationError(format!(
                "unknown environment '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

/// Library configuration, loaded from `.fieldvault.toml`.
///
/// Every field has a default so FieldVault works without any config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Deployment environment (default: development).
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// Names looked up in each key source, in precedence order.
    #[serde(default = "default_key_names")]
    pub key_names: Vec<String>,

    /// How long before expiry a token counts as needing refresh.
    #[serde(default = "default_token_refresh_buffer_secs")]
    pub token_refresh_buffer_secs: u64,

    /// Deadline for a single document store call.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Batches smaller than this are processed on the calling thread.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_environment() -> Environment {
    Environment::Development
}

fn default_key_names() -> Vec<String> {
    vec![
        "FIELDVAULT_MASTER_KEY".to_string(),
        "ENCRYPTION_KEY".to_string(),
    ]
}

fn default_token_refresh_buffer_secs() -> u64 {
    300 // 5 minutes
}

fn default_store_timeout_ms() -> u64 {
    10_000
}

fn default_parallel_threshold() -> usize {
    32
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            key_names: default_key_names(),
            token_refresh_buffer_secs: default_token_refresh_buffer_secs(),
            store_timeout_ms: default_store_timeout_ms(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".fieldvault.toml";

    /// Process variables that override the configured environment, in order.
    const ENV_VARS: [&'static str; 2] = ["FIELDVAULT_ENV", "APP_ENV"];

    /// Load settings from `<dir>/.fieldvault.toml`, then apply the
    /// environment override from the process.
    ///
    /// A missing file yields defaults; an unparseable one is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut settings = Self::load_file(dir)?;

        let from_process = Self::ENV_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()));
        if let Some(value) = from_process {
            settings.environment = value.parse()?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Load only the file, without consulting the process environment.
    pub fn load_file(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        toml::from_str(&contents).map_err(|e| {
            FieldVaultError::ConfigurationError(format!(
                "Failed to parse {}: {e}",
                config_path.display()
            ))
        })
    }

    fn validate(&self) -> Result<()> {
        if self.key_names.iter().all(|n| n.trim().is_empty()) {
            return Err(FieldVaultError::ConfigurationError(
                "key_names must contain at least one name".into(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(FieldVaultError::ConfigurationError(
                "store_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn refresh_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.token_refresh_buffer_secs).unwrap_or(i64::MAX))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
