//! Service configuration: a TOML file plus environment overrides.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "comercial.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComercialConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    #[serde(default = "default_http_max_in_flight")]
    pub http_max_in_flight: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            http_timeout_seconds: default_http_timeout_seconds(),
            http_max_in_flight: default_http_max_in_flight(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:10000".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    90
}

fn default_http_max_in_flight() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Public base URL; the webhook is registered at `{base}/telegram-webhook`.
    #[serde(default)]
    pub webhook_base_url: Option<String>,
    #[serde(default = "default_telegram_timeout_seconds")]
    pub send_timeout_seconds: u64,
    #[serde(default = "default_telegram_timeout_seconds")]
    pub webhook_timeout_seconds: u64,
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    #[serde(default = "default_true")]
    pub register_webhook_on_start: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            webhook_base_url: None,
            send_timeout_seconds: default_telegram_timeout_seconds(),
            webhook_timeout_seconds: default_telegram_timeout_seconds(),
            max_message_length: default_max_message_length(),
            register_webhook_on_start: true,
        }
    }
}

impl TelegramConfig {
    pub fn webhook_url(&self) -> Option<String> {
        self.webhook_base_url
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .map(|base| format!("{}/telegram-webhook", base.trim_end_matches('/')))
    }
}

fn default_telegram_timeout_seconds() -> u64 {
    8
}

fn default_max_message_length() -> usize {
    4000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_directory_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub primary: DatasetConfig,
    #[serde(default)]
    pub unavailable: DatasetConfig,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_seconds: default_directory_timeout_seconds(),
            primary: DatasetConfig::default(),
            unavailable: DatasetConfig::default(),
        }
    }
}

impl DirectoryConfig {
    pub fn primary_ttl(&self) -> Duration {
        Duration::from_secs(self.primary.ttl_seconds.unwrap_or(3600))
    }

    pub fn unavailable_ttl(&self) -> Duration {
        Duration::from_secs(self.unavailable.ttl_seconds.unwrap_or(1800))
    }
}

fn default_directory_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub query_id: String,
    #[serde(default)]
    pub api_key: String,
    /// Defaults to 3600 for the primary dataset and 1800 for the unavailable one.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_registry_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub agents_table: String,
    #[serde(default)]
    pub orders_table: String,
    #[serde(default)]
    pub assignments_table: String,
    #[serde(default = "default_order_number_field")]
    pub order_number_field: String,
    #[serde(default = "default_assignment_agent_field")]
    pub assignment_agent_field: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout_seconds: default_registry_timeout_seconds(),
            agents_table: String::new(),
            orders_table: String::new(),
            assignments_table: String::new(),
            order_number_field: default_order_number_field(),
            assignment_agent_field: default_assignment_agent_field(),
        }
    }
}

fn default_registry_timeout_seconds() -> u64 {
    15
}

fn default_order_number_field() -> String {
    "order_number".to_string()
}

fn default_assignment_agent_field() -> String {
    "comercial_id".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub preregister_url: String,
    #[serde(default = "default_max_results_shown")]
    pub max_results_shown: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            preregister_url: String::new(),
            max_results_shown: default_max_results_shown(),
        }
    }
}

fn default_max_results_shown() -> usize {
    5
}

impl ComercialConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self::load_with_path(path).await?.0)
    }

    pub async fn load_with_path(path: Option<PathBuf>) -> anyhow::Result<(Self, PathBuf)> {
        let path = path.unwrap_or_else(default_config_path);
        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::from_toml_str(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            // Env-only deployments ship no file.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(config_path = %path.display(), "config file not found; using defaults and environment");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok((cfg, path))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Non-blank values returned by `lookup` replace the file's settings.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("TELEGRAM_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = var("WEBHOOK_URL") {
            self.telegram.webhook_base_url = Some(v);
        }
        if let Some(v) = var("REDASH_BASE_URL") {
            self.directory.base_url = v;
        }
        if let Some(v) = var("REDASH_API_KEY") {
            self.directory.primary.api_key = v;
        }
        if let Some(v) = var("REDASH_UNAVAILABLE_API_KEY") {
            self.directory.unavailable.api_key = v;
        }
        if let Some(v) = var("REDASH_QUERY_ID") {
            self.directory.primary.query_id = v;
        }
        if let Some(v) = var("REDASH_UNAVAILABLE_QUERY_ID") {
            self.directory.unavailable.query_id = v;
        }
        if let Some(v) = var("NOCODB_BASE_URL") {
            self.registry.base_url = v;
        }
        if let Some(v) = var("NOCODB_TOKEN") {
            self.registry.token = v;
        }
        if let Some(v) = var("PORT") {
            let host = self
                .server
                .bind_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind_addr = format!("{host}:{}", v.trim());
        }
        if let Some(v) = var("PREREGISTER_URL") {
            self.bot.preregister_url = v;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.bind_addr()?;
        if self.server.http_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("server.http_timeout_seconds must be > 0"));
        }
        if self.server.http_max_in_flight == 0 {
            return Err(anyhow::anyhow!("server.http_max_in_flight must be > 0"));
        }
        if self.telegram.bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "telegram.bot_token is required (or set TELEGRAM_TOKEN)"
            ));
        }
        if self.telegram.send_timeout_seconds == 0 || self.telegram.webhook_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("telegram timeouts must be > 0"));
        }
        if self.telegram.max_message_length == 0 {
            return Err(anyhow::anyhow!("telegram.max_message_length must be > 0"));
        }
        if self.directory.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "directory.base_url is required (or set REDASH_BASE_URL)"
            ));
        }
        if self.directory.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("directory.timeout_seconds must be > 0"));
        }
        for (name, dataset) in [
            ("primary", &self.directory.primary),
            ("unavailable", &self.directory.unavailable),
        ] {
            if dataset.query_id.trim().is_empty() {
                return Err(anyhow::anyhow!("directory.{name}.query_id is required"));
            }
            if dataset.ttl_seconds == Some(0) {
                return Err(anyhow::anyhow!("directory.{name}.ttl_seconds must be > 0"));
            }
        }
        if self.registry.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "registry.base_url is required (or set NOCODB_BASE_URL)"
            ));
        }
        if self.registry.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("registry.timeout_seconds must be > 0"));
        }
        for (name, table) in [
            ("agents_table", &self.registry.agents_table),
            ("orders_table", &self.registry.orders_table),
            ("assignments_table", &self.registry.assignments_table),
        ] {
            if table.trim().is_empty() {
                return Err(anyhow::anyhow!("registry.{name} is required"));
            }
        }
        if self.bot.max_results_shown == 0 {
            return Err(anyhow::anyhow!("bot.max_results_shown must be > 0"));
        }
        let worst_case = self.worst_case_request_seconds();
        if self.server.http_timeout_seconds < worst_case {
            return Err(anyhow::anyhow!(
                "server.http_timeout_seconds ({}) must be at least {worst_case}s: two directory fetches plus one telegram send",
                self.server.http_timeout_seconds
            ));
        }
        Ok(())
    }

    /// Longest chain a single request can run: both datasets refreshed, then a reply sent.
    pub fn worst_case_request_seconds(&self) -> u64 {
        2 * self.directory.timeout_seconds + self.telegram.send_timeout_seconds
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server.bind_addr.trim().parse().map_err(|e| {
            anyhow::anyhow!("invalid server.bind_addr {:?}: {e}", self.server.bind_addr)
        })
    }
}

/// `COMERCIAL_CONFIG` if set, otherwise `./comercial.toml`.
pub fn default_config_path() -> PathBuf {
    match std::env::var("COMERCIAL_CONFIG") {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
        _ => Path::new(".").join(DEFAULT_CONFIG_FILE),
    }
}
