use crate::domain::model::{GameSession, GameSessionUpdate, MatchmakerData, StopBackfillRequest};
use crate::domain::ports::{SessionBackend, SessionHandler};
use crate::utils::error::{Result, ServerError};
use crate::utils::monitor::HealthMonitor;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Broadcast when the process should stop running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    /// Clean stop: session teardown already ran, exit 0.
    Requested,
    /// A lifecycle callback hit an unrecoverable error.
    Fatal(String),
}

#[derive(Debug, Default)]
struct BackfillState {
    ticket_id: Option<String>,
    matchmaking_configuration_arn: Option<String>,
}

/// Owns the lifecycle callback side of the process: reacts to the fleet
/// manager's events and runs the session teardown.
pub struct GameProcess {
    backend: Arc<dyn SessionBackend>,
    monitor: HealthMonitor,
    backfill: Mutex<BackfillState>,
    session_running: AtomicBool,
    accepting_connections: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<Option<Shutdown>>,
    log_flush_delay: Duration,
}

impl GameProcess {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        monitor: HealthMonitor,
        accepting_connections: Arc<AtomicBool>,
        shutdown_tx: watch::Sender<Option<Shutdown>>,
        log_flush_delay: Duration,
    ) -> Self {
        Self {
            backend,
            monitor,
            backfill: Mutex::new(BackfillState::default()),
            session_running: AtomicBool::new(false),
            accepting_connections,
            shutdown_tx,
            log_flush_delay,
        }
    }

    /// The placed session's id is cached by the backend once the start event
    /// arrives; non-empty means the round can begin.
    pub fn has_started_game_session(&self) -> bool {
        self.backend
            .game_session_id()
            .map(|id| !id.is_empty())
            .unwrap_or(false)
    }

    pub fn is_session_running(&self) -> bool {
        self.session_running.load(Ordering::SeqCst)
    }

    fn signal(&self, shutdown: Shutdown) {
        let _ = self.shutdown_tx.send(Some(shutdown));
    }

    async fn store_matchmaker_identifiers(&self, session: &GameSession) {
        let raw = match session.matchmaker_data.as_deref() {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                debug!("No matchmaker data on this session, skipping backfill setup");
                return;
            }
        };
        info!("MatchmakerData: {}", raw);

        // Sessions created without matchmaking carry no backfill keys. The
        // teardown simply has nothing to cancel in that case.
        match MatchmakerData::parse(raw) {
            Ok(data) => {
                let mut backfill = self.backfill.lock().await;
                if let Some(ticket) = data.auto_backfill_ticket_id.filter(|t| !t.is_empty()) {
                    info!("AutoBackfillTicketId: {}", ticket);
                    backfill.ticket_id = Some(ticket);
                }
                backfill.matchmaking_configuration_arn = data.matchmaking_configuration_arn;
            }
            Err(e) => warn!("⚠️ Could not parse matchmaker data: {}", e),
        }
    }

    async fn stop_backfill(
        &self,
        ticket_id: String,
        configuration_arn: Option<String>,
    ) -> Result<()> {
        let game_session_arn = self
            .backend
            .game_session_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServerError::SessionError {
                message: format!(
                    "backfill ticket {} held but no game session id cached",
                    ticket_id
                ),
            })?;

        self.backend
            .stop_match_backfill(StopBackfillRequest {
                ticket_id,
                game_session_arn,
                matchmaking_configuration_arn: configuration_arn.unwrap_or_default(),
            })
            .await
    }

    /// Session teardown: stop accepting players, cancel any pending backfill,
    /// let the log agent catch up, then announce the process is ending. Ends
    /// by signalling a clean shutdown so the main loop and listener exit.
    pub async fn terminate_game_session(&self) {
        info!("🏁 Terminating game session");
        self.accepting_connections.store(false, Ordering::SeqCst);

        let (ticket_id, configuration_arn) = {
            let mut backfill = self.backfill.lock().await;
            (
                backfill.ticket_id.take(),
                backfill.matchmaking_configuration_arn.take(),
            )
        };
        if let Some(ticket_id) = ticket_id {
            if let Err(e) = self.stop_backfill(ticket_id, configuration_arn).await {
                warn!("⚠️ Failed to stop match backfill: {}", e);
            }
        }

        // The platform's log agent tails the log file; give it a moment to
        // ship the last lines before the process goes away.
        tokio::time::sleep(self.log_flush_delay).await;

        if let Err(e) = self.backend.process_ending().await {
            warn!("⚠️ Process-ending call failed: {}", e);
        }

        self.session_running.store(false, Ordering::SeqCst);
        self.monitor.log_final_stats();
        info!("✅ Game session terminated");
        self.signal(Shutdown::Requested);
    }
}

#[async_trait]
impl SessionHandler for GameProcess {
    async fn on_start_game_session(&self, session: GameSession) {
        info!("🎮 Game session started: {}", session.game_session_id);
        self.session_running.store(true, Ordering::SeqCst);

        self.store_matchmaker_identifiers(&session).await;

        if let Err(e) = self
            .backend
            .activate_game_session(&session.game_session_id)
            .await
        {
            error!("❌ Failed to activate game session: {}", e);
            self.signal(Shutdown::Fatal(format!(
                "could not activate game session {}: {}",
                session.game_session_id, e
            )));
        }
    }

    async fn on_update_game_session(&self, update: GameSessionUpdate) {
        info!("🔄 Game session updated (reason {:?})", update.update_reason);

        // Backfill restarts hand out a fresh ticket; an empty id means the
        // previous ticket still stands.
        if let Some(ticket) = update.backfill_ticket_id.filter(|t| !t.is_empty()) {
            info!("New backfill ticket: {}", ticket);
            self.backfill.lock().await.ticket_id = Some(ticket);
        }
    }

    async fn on_process_terminate(&self) {
        info!("🛑 Process termination requested by fleet manager");
        if self.is_session_running() {
            self.terminate_game_session().await;
        } else {
            // Nothing to tear down; the platform reclaims the process.
            info!("No game session running, nothing to terminate");
        }
    }

    async fn on_health_check(&self) -> bool {
        let healthy = self.monitor.is_healthy();
        if healthy {
            debug!("Health check: healthy");
        } else {
            warn!("⚠️ Health check: reporting unhealthy");
        }
        self.monitor.log_stats("Health check");
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ProcessParameters;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingBackend {
        session_id: StdMutex<Option<String>>,
        activated: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl SessionBackend for RecordingBackend {
        async fn process_ready(
            &self,
            _params: ProcessParameters,
            _handler: Arc<dyn SessionHandler>,
        ) -> Result<()> {
            Ok(())
        }

        async fn activate_game_session(&self, game_session_id: &str) -> Result<()> {
            self.activated.lock().unwrap().push(game_session_id.to_string());
            Ok(())
        }

        async fn accept_player_session(&self, _player_session_id: &str) -> Result<()> {
            Ok(())
        }

        async fn stop_match_backfill(&self, _request: StopBackfillRequest) -> Result<()> {
            Ok(())
        }

        async fn process_ending(&self) -> Result<()> {
            Ok(())
        }

        fn game_session_id(&self) -> Option<String> {
            self.session_id.lock().unwrap().clone()
        }
    }

    fn test_process(
        backend: Arc<RecordingBackend>,
    ) -> (GameProcess, watch::Receiver<Option<Shutdown>>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(None);
        let process = GameProcess::new(
            backend,
            HealthMonitor::new(false, None),
            Arc::new(AtomicBool::new(true)),
            shutdown_tx,
            Duration::from_millis(0),
        );
        (process, shutdown_rx)
    }

    #[tokio::test]
    async fn test_session_start_activates_backend() {
        let backend = Arc::new(RecordingBackend::default());
        let (process, _rx) = test_process(Arc::clone(&backend));

        let session = GameSession {
            game_session_id: "gsess-1".to_string(),
            ..Default::default()
        };
        process.on_start_game_session(session).await;

        assert!(process.is_session_running());
        assert_eq!(backend.activated.lock().unwrap().as_slice(), ["gsess-1"]);
    }

    #[tokio::test]
    async fn test_has_started_follows_backend_cache() {
        let backend = Arc::new(RecordingBackend::default());
        let (process, _rx) = test_process(Arc::clone(&backend));

        assert!(!process.has_started_game_session());
        *backend.session_id.lock().unwrap() = Some("gsess-2".to_string());
        assert!(process.has_started_game_session());
    }

    #[tokio::test]
    async fn test_terminate_without_session_does_not_signal() {
        let backend = Arc::new(RecordingBackend::default());
        let (process, shutdown_rx) = test_process(backend);

        process.on_process_terminate().await;
        assert!(shutdown_rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_empty_backfill_ticket_keeps_previous() {
        let backend = Arc::new(RecordingBackend::default());
        let (process, _rx) = test_process(backend);

        process.backfill.lock().await.ticket_id = Some("ticket-old".to_string());
        process
            .on_update_game_session(GameSessionUpdate {
                backfill_ticket_id: Some(String::new()),
                ..Default::default()
            })
            .await;

        assert_eq!(
            process.backfill.lock().await.ticket_id.as_deref(),
            Some("ticket-old")
        );
    }
}
