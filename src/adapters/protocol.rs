use crate::domain::model::{GameSession, GameSessionUpdate, StopBackfillRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SDK_LANGUAGE: &str = "Rust";

/// Actions the platform pushes to the process without a preceding request.
pub mod events {
    pub const START_GAME_SESSION: &str = "StartGameSession";
    pub const UPDATE_GAME_SESSION: &str = "UpdateGameSession";
    pub const TERMINATE_PROCESS: &str = "TerminateProcess";
}

/// Request payload, tagged on the wire by its `action` field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action")]
pub enum RequestPayload {
    #[serde(rename_all = "camelCase")]
    ActivateServerProcess {
        sdk_version: String,
        sdk_language: String,
        port: u16,
        log_paths: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    HeartbeatServerProcess { healthy: bool },
    #[serde(rename_all = "camelCase")]
    ActivateGameSession { game_session_id: String },
    #[serde(rename_all = "camelCase")]
    AcceptPlayerSession {
        game_session_id: String,
        player_session_id: String,
    },
    StopMatchBackfill(StopBackfillRequest),
    TerminateServerProcess,
}

impl RequestPayload {
    pub fn action_name(&self) -> &'static str {
        match self {
            RequestPayload::ActivateServerProcess { .. } => "ActivateServerProcess",
            RequestPayload::HeartbeatServerProcess { .. } => "HeartbeatServerProcess",
            RequestPayload::ActivateGameSession { .. } => "ActivateGameSession",
            RequestPayload::AcceptPlayerSession { .. } => "AcceptPlayerSession",
            RequestPayload::StopMatchBackfill(_) => "StopMatchBackfill",
            RequestPayload::TerminateServerProcess => "TerminateServerProcess",
        }
    }
}

/// Outbound message: `{"action": ..., "requestId": ..., <payload fields>}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub request_id: String,
    #[serde(flatten)]
    pub payload: RequestPayload,
}

impl RequestEnvelope {
    pub fn new(payload: RequestPayload) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            payload,
        }
    }

    pub fn action_name(&self) -> &'static str {
        self.payload.action_name()
    }
}

/// Envelope fields shared by every inbound message. Replies echo the request
/// id of the call they answer; pushed events carry only an action.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl InboundEnvelope {
    /// A reply without a status code is treated as a bare acknowledgement.
    pub fn is_success(&self) -> bool {
        match self.status_code {
            Some(code) => (200..300).contains(&code),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameSessionEvent {
    pub game_session: GameSession,
}

/// Payload of the `UpdateGameSession` push. Shares the session-update shape
/// the domain already models.
pub type UpdateGameSessionEvent = GameSessionUpdate;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateProcessEvent {
    /// Epoch seconds; the platform hard-kills the process at this time.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub termination_time: Option<DateTime<Utc>>,
}
