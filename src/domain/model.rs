use crate::utils::error::Result;
use serde::{Deserialize, Serialize};

/// Game session as delivered by the platform when it places a session on
/// this process. Everything beyond the id is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSession {
    pub game_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fleet_id: Option<String>,
    #[serde(rename = "maximumPlayerSessionCount")]
    pub max_players: u32,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Opaque JSON blob produced by the matchmaker. Parsed lazily via
    /// [`MatchmakerData::parse`]; absent for sessions created without
    /// matchmaking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matchmaker_data: Option<String>,
}

/// Why the platform pushed a session update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateReason {
    MatchmakingDataUpdated,
    BackfillFailed,
    BackfillTimedOut,
    BackfillCancelled,
    #[serde(other)]
    #[default]
    Unknown,
}

/// Session update pushed mid-session, usually because backfill changed the
/// matchmaker data or a new backfill ticket was issued.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_session: Option<GameSession>,
    pub update_reason: UpdateReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backfill_ticket_id: Option<String>,
}

/// The pieces of the matchmaker blob this process cares about. The blob
/// carries much more (teams, players, attributes); those stay opaque.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchmakerData {
    pub match_id: Option<String>,
    pub auto_backfill_ticket_id: Option<String>,
    pub matchmaking_configuration_arn: Option<String>,
}

impl MatchmakerData {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Identifies the backfill to cancel when the session is torn down.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopBackfillRequest {
    pub ticket_id: String,
    pub game_session_arn: String,
    pub matchmaking_configuration_arn: String,
}

/// Registered with the platform at process-ready: where to route players and
/// which log files to collect when the process goes away.
#[derive(Debug, Clone)]
pub struct ProcessParameters {
    pub port: u16,
    pub log_paths: Vec<String>,
}
