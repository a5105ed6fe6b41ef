use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::core::scoring::{reference_weights, ScoringConfigError, ScoringTable};
use crate::services::RetryPolicy;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub database: DatabaseSettings,
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Expected value of the `x-api-key` header
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

impl EmbeddingSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

fn default_embedding_endpoint() -> String { "https://api.openai.com/v1".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_timeout() -> u64 { 30 }
fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 200 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Redis second tier; the cache runs in memory only when unset
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "reference_weights")]
    pub weights: HashMap<String, f64>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: default_request_timeout(),
            weights: reference_weights(),
        }
    }
}

impl ScoringSettings {
    /// Validate the weights and `top_k`, building the scoring table
    pub fn scoring_table(&self) -> Result<ScoringTable, ScoringConfigError> {
        if self.top_k == 0 {
            return Err(ScoringConfigError::InvalidTopK);
        }
        ScoringTable::from_weights(&self.weights)
    }
}

fn default_top_k() -> usize { 5 }
fn default_max_concurrency() -> usize { 8 }
fn default_request_timeout() -> u64 { 120 }

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_export_directory")]
    pub directory: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: default_export_directory(),
        }
    }
}

fn default_export_directory() -> String { "exports".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with NAVSIM__)
    /// 5. DATABASE_URL, OPENAI_API_KEY and SIMILARITY_API_KEY
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., NAVSIM__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("NAVSIM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("NAVSIM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply the conventional unprefixed variables on top of the loaded config
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("DATABASE_URL", "database.url"),
        ("OPENAI_API_KEY", "embedding.api_key"),
        ("SIMILARITY_API_KEY", "auth.api_key"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (var, key) in overrides {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scoring_settings() {
        let scoring = ScoringSettings::default();
        assert_eq!(scoring.top_k, 5);
        assert_eq!(scoring.weights.len(), 8);
        assert_eq!(scoring.weights["state"], 0.25);
        assert_eq!(scoring.weights["child_notes"], 0.05);
        assert!(scoring.scoring_table().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let scoring = ScoringSettings {
            top_k: 0,
            ..ScoringSettings::default()
        };
        assert_eq!(scoring.scoring_table(), Err(ScoringConfigError::InvalidTopK));
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let embedding = EmbeddingSettings {
            endpoint: default_embedding_endpoint(),
            api_key: "key".to_string(),
            model: default_embedding_model(),
            timeout_secs: 30,
            max_attempts: 0,
            initial_backoff_ms: 50,
        };

        let policy = embedding.retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.initial_backoff, Duration::from_millis(50));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("navsim-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
[server]
host = "127.0.0.1"
port = 8001

[auth]
api_key = "local-key"

[database]
url = "postgres://localhost/navsim"

[embedding]
api_key = "sk-test"

[scoring]
top_k = 3

[scoring.weights]
state = 0.5
current_challenges = 0.1
first_session_notes = 0.1
additional_info = 0.1
child_age = 0.05
child_diagnoses = 0.05
child_stage = 0.05
child_notes = 0.05
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.server.port, 8001);
        assert_eq!(settings.auth.api_key, "local-key");
        assert_eq!(settings.embedding.model, "text-embedding-3-small");
        assert_eq!(settings.scoring.top_k, 3);
        assert_eq!(settings.export.directory, "exports");

        let table = settings.scoring.scoring_table().unwrap();
        assert_eq!(table.weight(crate::models::CaseField::State), 0.5);
    }
}
