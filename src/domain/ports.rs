use crate::domain::model::{GameSession, GameSessionUpdate, ProcessParameters, StopBackfillRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Calls this process issues against the hosting platform. The production
/// implementation speaks the platform's WebSocket API; tests substitute a
/// scripted fake.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Announce the process as ready to host sessions. `handler` receives the
    /// platform's callbacks from this point on.
    async fn process_ready(
        &self,
        params: ProcessParameters,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<()>;

    /// Acknowledge a placed session so the platform starts routing players.
    async fn activate_game_session(&self, game_session_id: &str) -> Result<()>;

    /// Validate a player session token against the current game session.
    async fn accept_player_session(&self, player_session_id: &str) -> Result<()>;

    /// Cancel an in-flight backfill ticket during session teardown.
    async fn stop_match_backfill(&self, request: StopBackfillRequest) -> Result<()>;

    /// Tell the platform this process is shutting down cleanly.
    async fn process_ending(&self) -> Result<()>;

    /// Id of the session currently placed on this process, if any.
    fn game_session_id(&self) -> Option<String>;
}

/// Callbacks the platform invokes on this process.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    async fn on_start_game_session(&self, session: GameSession);

    async fn on_update_game_session(&self, update: GameSessionUpdate);

    async fn on_process_terminate(&self);

    /// Returning `false` tells the platform to recycle the process.
    async fn on_health_check(&self) -> bool;
}

pub trait ConfigProvider: Send + Sync {
    fn port(&self) -> u16;
    fn bind_address(&self) -> &str;
    fn log_dir(&self) -> &str;
    fn verbose(&self) -> bool;

    fn websocket_url(&self) -> &str;
    fn process_id(&self) -> &str;
    fn host_id(&self) -> &str;
    fn fleet_id(&self) -> &str;
    fn auth_token(&self) -> &str;

    fn poll_interval(&self) -> Duration;
    fn round_length(&self) -> Duration;
    fn log_flush_delay(&self) -> Duration;
    fn health_interval(&self) -> Duration;
    fn request_timeout(&self) -> Duration;

    fn monitor_enabled(&self) -> bool;
    fn memory_limit_mb(&self) -> Option<u64>;
}
