pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toml_config::TomlConfig;

pub const DEFAULT_PORT: u16 = 1935;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_LOG_DIR: &str = "./logs";

// Identity values the platform injects when it launches the process.
pub const ENV_WEBSOCKET_URL: &str = "FLEET_WEBSOCKET_URL";
pub const ENV_PROCESS_ID: &str = "FLEET_PROCESS_ID";
pub const ENV_HOST_ID: &str = "FLEET_HOST_ID";
pub const ENV_FLEET_ID: &str = "FLEET_ID";
pub const ENV_AUTH_TOKEN: &str = "FLEET_AUTH_TOKEN";

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "small-gameserver")]
#[command(about = "Example game-server process for a managed game-hosting platform")]
pub struct CliConfig {
    /// TCP port players connect to (default 1935)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for the per-process log file (default ./logs)
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Optional TOML configuration file
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Enable system monitoring")]
    pub monitor: bool,
}

/// Fully resolved configuration the rest of the process runs on.
/// Precedence: CLI flag, then TOML value, then environment, then default.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bind_address: String,
    pub log_dir: String,
    pub log_json: bool,
    pub verbose: bool,

    pub websocket_url: String,
    pub process_id: String,
    pub host_id: String,
    pub fleet_id: String,
    pub auth_token: String,

    pub poll_interval_seconds: u64,
    pub round_seconds: u64,
    pub log_flush_seconds: u64,
    pub health_interval_seconds: u64,
    pub request_timeout_seconds: u64,

    pub monitor_enabled: bool,
    pub memory_limit_mb: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
            log_json: false,
            verbose: false,
            websocket_url: String::new(),
            process_id: String::new(),
            host_id: String::new(),
            fleet_id: String::new(),
            auth_token: String::new(),
            poll_interval_seconds: 10,
            round_seconds: 60,
            log_flush_seconds: 3,
            health_interval_seconds: 60,
            request_timeout_seconds: 20,
            monitor_enabled: false,
            memory_limit_mb: None,
        }
    }
}

fn env_fallback(value: Option<String>, var: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(var).ok())
        .unwrap_or_default()
}

impl ServerConfig {
    /// 解析 CLI 參數並合併 TOML 檔案與環境變數
    #[cfg(feature = "cli")]
    pub fn resolve(cli: CliConfig) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let file = TomlConfig::from_file(path)?;
                file.validate()?;
                file
            }
            None => TomlConfig::default(),
        };
        Ok(Self::merge(cli, file))
    }

    #[cfg(feature = "cli")]
    fn merge(cli: CliConfig, file: TomlConfig) -> Self {
        let defaults = Self::default();
        let verbose_level = matches!(file.logging.level.as_deref(), Some("debug") | Some("trace"));
        // Read before the literal below starts moving fields out of `file`.
        let monitoring_enabled = file.monitoring_enabled();

        Self {
            port: cli.port.or(file.server.port).unwrap_or(defaults.port),
            bind_address: file
                .server
                .bind_address
                .unwrap_or(defaults.bind_address),
            log_dir: cli
                .log_dir
                .or(file.logging.dir)
                .unwrap_or(defaults.log_dir),
            log_json: matches!(file.logging.format.as_deref(), Some("json")),
            verbose: cli.verbose || verbose_level,
            websocket_url: env_fallback(file.platform.websocket_url, ENV_WEBSOCKET_URL),
            process_id: env_fallback(file.platform.process_id, ENV_PROCESS_ID),
            host_id: env_fallback(file.platform.host_id, ENV_HOST_ID),
            fleet_id: env_fallback(file.platform.fleet_id, ENV_FLEET_ID),
            auth_token: env_fallback(file.platform.auth_token, ENV_AUTH_TOKEN),
            poll_interval_seconds: file
                .session
                .poll_interval_seconds
                .unwrap_or(defaults.poll_interval_seconds),
            round_seconds: file.session.round_seconds.unwrap_or(defaults.round_seconds),
            log_flush_seconds: file
                .session
                .log_flush_seconds
                .unwrap_or(defaults.log_flush_seconds),
            health_interval_seconds: file
                .session
                .health_interval_seconds
                .unwrap_or(defaults.health_interval_seconds),
            request_timeout_seconds: file
                .session
                .request_timeout_seconds
                .unwrap_or(defaults.request_timeout_seconds),
            monitor_enabled: cli.monitor || monitoring_enabled,
            memory_limit_mb: file.monitoring.memory_limit_mb,
        }
    }
}

fn require(field: &str, value: &str, env_var: &str) -> Result<()> {
    validation::validate_required_field(&format!("{} (or env {})", field, env_var), value)
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_port("server.port", self.port)?;
        validation::validate_non_empty_string("server.bind_address", &self.bind_address)?;
        validation::validate_path("logging.dir", &self.log_dir)?;

        require("platform.websocket_url", &self.websocket_url, ENV_WEBSOCKET_URL)?;
        validation::validate_websocket_url("platform.websocket_url", &self.websocket_url)?;
        require("platform.process_id", &self.process_id, ENV_PROCESS_ID)?;
        require("platform.host_id", &self.host_id, ENV_HOST_ID)?;
        require("platform.fleet_id", &self.fleet_id, ENV_FLEET_ID)?;
        require("platform.auth_token", &self.auth_token, ENV_AUTH_TOKEN)?;

        validation::validate_positive_number(
            "session.poll_interval_seconds",
            self.poll_interval_seconds,
            1,
        )?;
        validation::validate_positive_number("session.round_seconds", self.round_seconds, 1)?;
        validation::validate_positive_number(
            "session.health_interval_seconds",
            self.health_interval_seconds,
            1,
        )?;
        validation::validate_positive_number(
            "session.request_timeout_seconds",
            self.request_timeout_seconds,
            1,
        )?;
        // log_flush_seconds may legitimately be zero (no wait).

        Ok(())
    }
}

impl ConfigProvider for ServerConfig {
    fn port(&self) -> u16 {
        self.port
    }

    fn bind_address(&self) -> &str {
        &self.bind_address
    }

    fn log_dir(&self) -> &str {
        &self.log_dir
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn websocket_url(&self) -> &str {
        &self.websocket_url
    }

    fn process_id(&self) -> &str {
        &self.process_id
    }

    fn host_id(&self) -> &str {
        &self.host_id
    }

    fn fleet_id(&self) -> &str {
        &self.fleet_id
    }

    fn auth_token(&self) -> &str {
        &self.auth_token
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    fn round_length(&self) -> Duration {
        Duration::from_secs(self.round_seconds)
    }

    fn log_flush_delay(&self) -> Duration {
        Duration::from_secs(self.log_flush_seconds)
    }

    fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_seconds)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn monitor_enabled(&self) -> bool {
        self.monitor_enabled
    }

    fn memory_limit_mb(&self) -> Option<u64> {
        self.memory_limit_mb
    }
}
