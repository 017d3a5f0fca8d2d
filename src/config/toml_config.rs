use crate::utils::error::{Result, ServerError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File-based configuration. Every section and field is optional; whatever is
/// absent falls back to the CLI flag, the environment, or the built-in
/// default when the resolved [`super::ServerConfig`] is assembled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerSection,
    pub platform: PlatformSection,
    pub session: SessionSection,
    pub logging: LoggingSection,
    pub monitoring: MonitoringSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSection {
    pub websocket_url: Option<String>,
    pub process_id: Option<String>,
    pub host_id: Option<String>,
    pub fleet_id: Option<String>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub poll_interval_seconds: Option<u64>,
    pub round_seconds: Option<u64>,
    pub log_flush_seconds: Option<u64>,
    pub health_interval_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub dir: Option<String>,
    pub level: Option<String>,
    /// "text" (default) or "json" for structured log collectors.
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSection {
    pub enabled: Option<bool>,
    pub memory_limit_mb: Option<u64>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ServerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ServerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${FLEET_AUTH_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        // 使用正規表達式匹配 ${VAR_NAME} 格式
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let Some(port) = self.server.port {
            validation::validate_port("server.port", port)?;
        }

        if let Some(url) = &self.platform.websocket_url {
            validation::validate_websocket_url("platform.websocket_url", url)?;
        }

        if let Some(interval) = self.session.poll_interval_seconds {
            validation::validate_positive_number("session.poll_interval_seconds", interval, 1)?;
        }
        if let Some(round) = self.session.round_seconds {
            validation::validate_positive_number("session.round_seconds", round, 1)?;
        }
        if let Some(interval) = self.session.health_interval_seconds {
            validation::validate_positive_number("session.health_interval_seconds", interval, 1)?;
        }
        if let Some(timeout) = self.session.request_timeout_seconds {
            validation::validate_positive_number("session.request_timeout_seconds", timeout, 1)?;
        }

        if let Some(level) = &self.logging.level {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level.as_str()) {
                return Err(ServerError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.clone(),
                    reason: format!("Unsupported level. Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        if let Some(format) = &self.logging.format {
            if format != "text" && format != "json" {
                return Err(ServerError::InvalidConfigValueError {
                    field: "logging.format".to_string(),
                    value: format.clone(),
                    reason: "Supported formats: text, json".to_string(),
                });
            }
        }

        Ok(())
    }

    /// 是否啟用系統監控
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled.unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
