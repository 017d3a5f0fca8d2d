use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("WebSocket transport error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Platform rejected {action} (status {status_code}): {message}")]
    PlatformError {
        action: String,
        status_code: u16,
        message: String,
    },

    #[error("Platform connection closed")]
    ConnectionClosed,

    #[error("Timed out waiting for {operation}")]
    TimeoutError { operation: String },

    #[error("Session error: {message}")]
    SessionError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Platform,
    Session,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Informational, process can keep going
    Low,
    /// Transient, worth retrying (exit code 2)
    Medium,
    /// Process failed (exit code 1)
    High,
    /// Environment is broken (exit code 3)
    Critical,
}

impl ServerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ServerError::ConfigValidationError { .. }
            | ServerError::InvalidConfigValueError { .. }
            | ServerError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ServerError::WebSocketError(_)
            | ServerError::ConnectionClosed
            | ServerError::TimeoutError { .. } => ErrorCategory::Transport,
            ServerError::PlatformError { .. } => ErrorCategory::Platform,
            ServerError::SessionError { .. } => ErrorCategory::Session,
            ServerError::IoError(_) | ServerError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Transport => ErrorSeverity::Medium,
            ErrorCategory::Platform => ErrorSeverity::High,
            ErrorCategory::Session => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ServerError::ConfigValidationError { field, message } => {
                format!("Configuration problem in '{}': {}", field, message)
            }
            ServerError::InvalidConfigValueError {
                field,
                value,
                reason,
            } => {
                format!("'{}' is not a valid value for '{}': {}", value, field, reason)
            }
            ServerError::MissingConfigError { field } => {
                format!("Required setting '{}' was not provided", field)
            }
            ServerError::PlatformError {
                action, message, ..
            } => {
                format!("The hosting platform rejected {}: {}", action, message)
            }
            ServerError::ConnectionClosed => {
                "The connection to the hosting platform was closed".to_string()
            }
            ServerError::TimeoutError { operation } => {
                format!("The hosting platform did not answer {} in time", operation)
            }
            ServerError::SessionError { message } => {
                format!("Game session problem: {}", message)
            }
            other => format!("Server process failed: {}", other),
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the CLI flags, the TOML file and the FLEET_* environment variables"
                    .to_string()
            }
            ErrorCategory::Transport => {
                "Check that the fleet manager endpoint is reachable and the auth token is still valid"
                    .to_string()
            }
            ErrorCategory::Platform => {
                "Check the fleet manager logs for this process id; the call may be invalid for the current session state"
                    .to_string()
            }
            ErrorCategory::Session => {
                "The process may have raced a session transition; the platform will recycle it"
                    .to_string()
            }
            ErrorCategory::System => {
                "Check disk space, file permissions and the log directory".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
