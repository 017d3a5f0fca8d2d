use crate::core::listener::PlayerListener;
use crate::core::process::{GameProcess, Shutdown};
use crate::domain::model::ProcessParameters;
use crate::domain::ports::{ConfigProvider, SessionBackend, SessionHandler};
use crate::utils::error::{Result, ServerError};
use crate::utils::monitor::HealthMonitor;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info};

/// Drives the whole process: announce readiness, serve players, wait out the
/// round, tear the session down.
pub struct ServerEngine {
    backend: Arc<dyn SessionBackend>,
    process: Arc<GameProcess>,
    accepting: Arc<AtomicBool>,
    shutdown_rx: watch::Receiver<Option<Shutdown>>,
    bind_address: String,
    port: u16,
    log_paths: Vec<String>,
    poll_interval: Duration,
    round_length: Duration,
}

impl ServerEngine {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        config: &dyn ConfigProvider,
        monitor: HealthMonitor,
        log_paths: Vec<String>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(None);
        let accepting = Arc::new(AtomicBool::new(false));
        let process = Arc::new(GameProcess::new(
            Arc::clone(&backend),
            monitor,
            Arc::clone(&accepting),
            shutdown_tx,
            config.log_flush_delay(),
        ));

        Self {
            backend,
            process,
            accepting,
            shutdown_rx,
            bind_address: config.bind_address().to_string(),
            port: config.port(),
            log_paths,
            poll_interval: config.poll_interval(),
            round_length: config.round_length(),
        }
    }

    pub fn process(&self) -> Arc<GameProcess> {
        Arc::clone(&self.process)
    }

    /// Full process lifetime. Returns once the round is over (exit 0) or a
    /// fatal callback error came in (exit non-zero via the error severity).
    pub async fn run(mut self) -> Result<()> {
        info!("🚀 Registering process as ready on port {}", self.port);
        self.backend
            .process_ready(
                ProcessParameters {
                    port: self.port,
                    log_paths: self.log_paths.clone(),
                },
                Arc::clone(&self.process) as Arc<dyn SessionHandler>,
            )
            .await?;

        let listener = PlayerListener::bind(
            &self.bind_address,
            self.port,
            Arc::clone(&self.backend),
            Arc::clone(&self.accepting),
            self.shutdown_rx.clone(),
        )
        .await?;
        let listener_task = tokio::spawn(listener.serve());

        let outcome = self.wait_for_round_end().await;

        // Every exit path above has signalled shutdown, so the listener loop
        // is already on its way out.
        let _ = timeout(Duration::from_secs(1), listener_task).await;
        outcome
    }

    async fn wait_for_round_end(&mut self) -> Result<()> {
        info!("⏳ Waiting for a game session to be placed on this process");
        loop {
            if self.process.has_started_game_session() {
                info!(
                    "🎮 Game session is live, round runs for {:?}",
                    self.round_length
                );
                if let Some(shutdown) = self.wait_or_shutdown(self.round_length).await {
                    return Self::conclude(shutdown);
                }
                info!("🏁 Round time is up");
                self.process.terminate_game_session().await;
                return Ok(());
            }

            if let Some(shutdown) = self.wait_or_shutdown(self.poll_interval).await {
                return Self::conclude(shutdown);
            }
            debug!("No game session yet, polling again");
        }
    }

    /// Sleep for `duration`, cut short by a shutdown signal.
    async fn wait_or_shutdown(&mut self, duration: Duration) -> Option<Shutdown> {
        tokio::select! {
            _ = sleep(duration) => None,
            changed = self.shutdown_rx.changed() => match changed {
                Ok(()) => self.shutdown_rx.borrow().clone(),
                // Sender dropped; treat as a clean stop.
                Err(_) => Some(Shutdown::Requested),
            },
        }
    }

    fn conclude(shutdown: Shutdown) -> Result<()> {
        match shutdown {
            Shutdown::Requested => {
                info!("✅ Shutdown requested, teardown already completed");
                Ok(())
            }
            Shutdown::Fatal(message) => Err(ServerError::SessionError { message }),
        }
    }
}
