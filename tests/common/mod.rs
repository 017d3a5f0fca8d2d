#![allow(dead_code)]

use async_trait::async_trait;
use small_gameserver::core::{ConfigProvider, SessionBackend, SessionHandler};
use small_gameserver::domain::model::{ProcessParameters, StopBackfillRequest};
use small_gameserver::utils::error::{Result, ServerError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted stand-in for the fleet manager. Records every call in order and
/// can be told to fail activation or reject tokens.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<String>>,
    session_id: Mutex<Option<String>>,
    handler: Mutex<Option<Arc<dyn SessionHandler>>>,
    pub fail_activate: AtomicBool,
    valid_tokens: Mutex<Option<HashSet<String>>>,
    captured_backfill: Mutex<Option<StopBackfillRequest>>,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Simulate the platform placing a session on the process (the real
    /// client caches the id when the start event arrives).
    pub fn place_session(&self, id: &str) {
        *self.session_id.lock().unwrap() = Some(id.to_string());
    }

    pub fn handler(&self) -> Option<Arc<dyn SessionHandler>> {
        self.handler.lock().unwrap().clone()
    }

    /// Only these tokens validate; without a whitelist every token passes.
    pub fn set_valid_tokens(&self, tokens: &[&str]) {
        let set = tokens.iter().map(|t| t.to_string()).collect();
        *self.valid_tokens.lock().unwrap() = Some(set);
    }

    pub fn captured_backfill(&self) -> Option<StopBackfillRequest> {
        self.captured_backfill.lock().unwrap().clone()
    }

    pub async fn wait_for_handler(&self) -> Arc<dyn SessionHandler> {
        for _ in 0..100 {
            if let Some(handler) = self.handler() {
                return handler;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("process_ready was never called");
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    async fn process_ready(
        &self,
        params: ProcessParameters,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<()> {
        self.record(format!("process_ready:{}", params.port));
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn activate_game_session(&self, game_session_id: &str) -> Result<()> {
        self.record(format!("activate:{}", game_session_id));
        if self.fail_activate.load(Ordering::SeqCst) {
            return Err(ServerError::PlatformError {
                action: "ActivateGameSession".to_string(),
                status_code: 400,
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn accept_player_session(&self, player_session_id: &str) -> Result<()> {
        self.record(format!("accept:{}", player_session_id));
        let allowed = match &*self.valid_tokens.lock().unwrap() {
            Some(tokens) => tokens.contains(player_session_id),
            None => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(ServerError::PlatformError {
                action: "AcceptPlayerSession".to_string(),
                status_code: 400,
                message: format!("unknown player session {}", player_session_id),
            })
        }
    }

    async fn stop_match_backfill(&self, request: StopBackfillRequest) -> Result<()> {
        self.record(format!("stop_backfill:{}", request.ticket_id));
        *self.captured_backfill.lock().unwrap() = Some(request);
        Ok(())
    }

    async fn process_ending(&self) -> Result<()> {
        self.record("process_ending".to_string());
        Ok(())
    }

    fn game_session_id(&self) -> Option<String> {
        self.session_id.lock().unwrap().clone()
    }
}

/// Config with test-friendly timings. Port 0 binds an ephemeral port.
pub struct TestConfig {
    pub poll: Duration,
    pub round: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(20),
            round: Duration::from_millis(50),
        }
    }
}

impl ConfigProvider for TestConfig {
    fn port(&self) -> u16 {
        0
    }

    fn bind_address(&self) -> &str {
        "127.0.0.1"
    }

    fn log_dir(&self) -> &str {
        "./logs"
    }

    fn verbose(&self) -> bool {
        false
    }

    fn websocket_url(&self) -> &str {
        "ws://127.0.0.1:0"
    }

    fn process_id(&self) -> &str {
        "proc-test"
    }

    fn host_id(&self) -> &str {
        "host-test"
    }

    fn fleet_id(&self) -> &str {
        "fleet-test"
    }

    fn auth_token(&self) -> &str {
        "token-test"
    }

    fn poll_interval(&self) -> Duration {
        self.poll
    }

    fn round_length(&self) -> Duration {
        self.round
    }

    fn log_flush_delay(&self) -> Duration {
        Duration::from_millis(0)
    }

    fn health_interval(&self) -> Duration {
        Duration::from_secs(60)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn monitor_enabled(&self) -> bool {
        false
    }

    fn memory_limit_mb(&self) -> Option<u64> {
        None
    }
}
