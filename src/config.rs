use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime settings, read from `QUOTA_*` environment variables (and `.env`).
///
/// List settings such as `QUOTA_HANDLERS` are comma separated.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `memory` or `postgres`.
    #[serde(default = "default_store_backend")]
    pub store_backend: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Codenames of the usage calculators to sync into definitions.
    #[serde(default = "default_handlers")]
    pub handlers: Vec<String>,
    #[serde(default)]
    pub optional_codenames: Vec<String>,
    /// Counters read from Redis, each exposed as its own calculator.
    #[serde(default)]
    pub redis_counters: Vec<String>,
    #[serde(default = "default_redis_counter_limit")]
    pub redis_counter_default: f64,
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
    #[serde(default = "default_workspace_gb")]
    pub workspace_default_gb: f64,
    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_database_url() -> String {
    "postgresql://localhost/quota_governor".to_string()
}

fn default_database_max_connections() -> u32 {
    20
}

fn default_port() -> u16 {
    3000
}

fn default_handlers() -> Vec<String> {
    vec!["workspace_quota".to_string()]
}

fn default_redis_counter_limit() -> f64 {
    1000.0
}

fn default_workspace_root() -> String {
    "./workspaces".to_string()
}

fn default_workspace_gb() -> f64 {
    1.0
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: default_store_backend(),
            database_url: default_database_url(),
            database_max_connections: default_database_max_connections(),
            redis_url: None,
            port: default_port(),
            handlers: default_handlers(),
            optional_codenames: Vec::new(),
            redis_counters: Vec::new(),
            redis_counter_default: default_redis_counter_limit(),
            workspace_root: default_workspace_root(),
            workspace_default_gb: default_workspace_gb(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config: Config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("QUOTA")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("handlers")
                    .with_list_parse_key("optional_codenames")
                    .with_list_parse_key("redis_counters"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.store_backend.as_str(), "memory" | "postgres") {
            anyhow::bail!(
                "QUOTA_STORE_BACKEND must be 'memory' or 'postgres', got '{}'",
                self.store_backend
            );
        }
        if self.database_max_connections == 0 {
            anyhow::bail!("QUOTA_DATABASE_MAX_CONNECTIONS must be at least 1");
        }
        if !self.workspace_default_gb.is_finite() || self.workspace_default_gb < 0.0 {
            anyhow::bail!("QUOTA_WORKSPACE_DEFAULT_GB must be a non-negative number");
        }
        Ok(())
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
