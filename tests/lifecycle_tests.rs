mod common;

use common::{FakeBackend, TestConfig};
use small_gameserver::core::{GameProcess, ServerEngine, SessionHandler, Shutdown};
use small_gameserver::domain::model::{GameSession, GameSessionUpdate, UpdateReason};
use small_gameserver::utils::monitor::HealthMonitor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

fn session(id: &str) -> GameSession {
    GameSession {
        game_session_id: id.to_string(),
        max_players: 2,
        port: 1935,
        ..Default::default()
    }
}

fn matchmade_session(id: &str, ticket: &str) -> GameSession {
    let mut session = session(id);
    session.matchmaker_data = Some(format!(
        r#"{{"matchId":"m-1","autoBackfillTicketId":"{}","matchmakingConfigurationArn":"arn:config/demo"}}"#,
        ticket
    ));
    session
}

struct Harness {
    backend: Arc<FakeBackend>,
    process: GameProcess,
    shutdown_rx: watch::Receiver<Option<Shutdown>>,
    accepting: Arc<AtomicBool>,
}

fn harness() -> Harness {
    let backend = Arc::new(FakeBackend::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(None);
    let accepting = Arc::new(AtomicBool::new(true));
    let process = GameProcess::new(
        Arc::clone(&backend) as _,
        HealthMonitor::new(false, None),
        Arc::clone(&accepting),
        shutdown_tx,
        Duration::from_millis(0),
    );
    Harness {
        backend,
        process,
        shutdown_rx,
        accepting,
    }
}

#[tokio::test]
async fn test_start_callback_activates_session() {
    let h = harness();
    h.backend.place_session("gsess-1");

    h.process.on_start_game_session(session("gsess-1")).await;

    assert!(h.process.is_session_running());
    assert_eq!(h.backend.calls(), ["activate:gsess-1"]);
}

#[tokio::test]
async fn test_teardown_stops_backfill_before_process_ending() {
    let h = harness();
    h.backend.place_session("gsess-arn-1");

    h.process
        .on_start_game_session(matchmade_session("gsess-arn-1", "backfill-42"))
        .await;
    h.process.terminate_game_session().await;

    let calls = h.backend.calls();
    let backfill_pos = calls
        .iter()
        .position(|c| c.starts_with("stop_backfill"))
        .expect("backfill was never stopped");
    let ending_pos = calls
        .iter()
        .position(|c| c == "process_ending")
        .expect("process_ending was never sent");
    assert!(backfill_pos < ending_pos);

    let captured = h.backend.captured_backfill().unwrap();
    assert_eq!(captured.ticket_id, "backfill-42");
    assert_eq!(captured.game_session_arn, "gsess-arn-1");
    assert_eq!(captured.matchmaking_configuration_arn, "arn:config/demo");

    // Teardown stops accepting players and signals a clean shutdown.
    assert!(!h.accepting.load(Ordering::SeqCst));
    assert_eq!(*h.shutdown_rx.borrow(), Some(Shutdown::Requested));
    assert!(!h.process.is_session_running());
}

#[tokio::test]
async fn test_session_update_replaces_backfill_ticket() {
    let h = harness();
    h.backend.place_session("gsess-2");

    h.process
        .on_start_game_session(matchmade_session("gsess-2", "ticket-first"))
        .await;
    h.process
        .on_update_game_session(GameSessionUpdate {
            update_reason: UpdateReason::MatchmakingDataUpdated,
            backfill_ticket_id: Some("ticket-second".to_string()),
            ..Default::default()
        })
        .await;
    h.process.terminate_game_session().await;

    let captured = h.backend.captured_backfill().unwrap();
    assert_eq!(captured.ticket_id, "ticket-second");
}

#[tokio::test]
async fn test_session_without_matchmaker_data_skips_backfill() {
    let h = harness();
    h.backend.place_session("gsess-3");

    h.process.on_start_game_session(session("gsess-3")).await;
    h.process.terminate_game_session().await;

    let calls = h.backend.calls();
    assert!(!calls.iter().any(|c| c.starts_with("stop_backfill")));
    assert!(calls.iter().any(|c| c == "process_ending"));
}

#[tokio::test]
async fn test_malformed_matchmaker_data_is_tolerated() {
    let h = harness();
    h.backend.place_session("gsess-4");

    let mut broken = session("gsess-4");
    broken.matchmaker_data = Some("definitely{not json".to_string());
    h.process.on_start_game_session(broken).await;

    // The session still activates and tears down without a backfill stop.
    assert_eq!(h.backend.calls(), ["activate:gsess-4"]);
    h.process.terminate_game_session().await;
    assert!(!h.backend.calls().iter().any(|c| c.starts_with("stop_backfill")));
}

#[tokio::test]
async fn test_backfill_stop_without_cached_session_still_ends_process() {
    let h = harness();
    // The backend never cached a session id, so the backfill stop cannot be
    // built; teardown must still announce the process ending.
    h.process
        .on_start_game_session(matchmade_session("gsess-orphan", "ticket-orphan"))
        .await;
    h.process.terminate_game_session().await;

    let calls = h.backend.calls();
    assert!(!calls.iter().any(|c| c.starts_with("stop_backfill")));
    assert!(calls.iter().any(|c| c == "process_ending"));
    assert_eq!(*h.shutdown_rx.borrow(), Some(Shutdown::Requested));
}

#[tokio::test]
async fn test_terminate_without_session_is_a_no_op() {
    let h = harness();

    h.process.on_process_terminate().await;

    assert!(h.backend.calls().is_empty());
    assert!(h.shutdown_rx.borrow().is_none());
}

#[tokio::test]
async fn test_terminate_with_running_session_tears_down() {
    let h = harness();
    h.backend.place_session("gsess-5");

    h.process.on_start_game_session(session("gsess-5")).await;
    h.process.on_process_terminate().await;

    assert!(h.backend.calls().iter().any(|c| c == "process_ending"));
    assert_eq!(*h.shutdown_rx.borrow(), Some(Shutdown::Requested));
}

#[tokio::test]
async fn test_activation_failure_signals_fatal() {
    let h = harness();
    h.backend.place_session("gsess-6");
    h.backend.fail_activate.store(true, Ordering::SeqCst);

    h.process.on_start_game_session(session("gsess-6")).await;

    assert!(matches!(
        &*h.shutdown_rx.borrow(),
        Some(Shutdown::Fatal(message)) if message.contains("gsess-6")
    ));
}

#[tokio::test]
async fn test_health_check_defaults_to_healthy() {
    let h = harness();
    assert!(h.process.on_health_check().await);
}

#[tokio::test]
async fn test_engine_runs_full_round() {
    let backend = Arc::new(FakeBackend::default());
    let config = TestConfig::default();
    let engine = ServerEngine::new(
        Arc::clone(&backend) as _,
        &config,
        HealthMonitor::new(false, None),
        vec!["./logs/test.log".to_string()],
    );
    let run = tokio::spawn(engine.run());

    // Act like the platform: wait for process-ready, then place a session.
    let handler = backend.wait_for_handler().await;
    backend.place_session("gsess-e2e");
    handler.on_start_game_session(session("gsess-e2e")).await;

    let outcome = timeout(Duration::from_secs(5), run)
        .await
        .expect("engine did not finish in time")
        .expect("engine task panicked");
    assert!(outcome.is_ok());

    let calls = backend.calls();
    assert_eq!(calls.first().unwrap(), "process_ready:0");
    assert!(calls.iter().any(|c| c == "activate:gsess-e2e"));
    assert_eq!(calls.last().unwrap(), "process_ending");
}

#[tokio::test]
async fn test_engine_exits_early_on_terminate_callback() {
    let backend = Arc::new(FakeBackend::default());
    // A round long enough that only the terminate callback can end the test.
    let config = TestConfig {
        poll: Duration::from_millis(20),
        round: Duration::from_secs(30),
    };
    let engine = ServerEngine::new(
        Arc::clone(&backend) as _,
        &config,
        HealthMonitor::new(false, None),
        vec!["./logs/test.log".to_string()],
    );
    let run = tokio::spawn(engine.run());

    let handler = backend.wait_for_handler().await;
    backend.place_session("gsess-term");
    handler.on_start_game_session(session("gsess-term")).await;
    handler.on_process_terminate().await;

    let outcome = timeout(Duration::from_secs(5), run)
        .await
        .expect("engine did not react to the terminate callback")
        .expect("engine task panicked");
    assert!(outcome.is_ok());
    assert!(backend.calls().iter().any(|c| c == "process_ending"));
}

#[tokio::test]
async fn test_engine_fails_on_fatal_callback_error() {
    let backend = Arc::new(FakeBackend::default());
    let config = TestConfig {
        poll: Duration::from_millis(20),
        round: Duration::from_secs(30),
    };
    let engine = ServerEngine::new(
        Arc::clone(&backend) as _,
        &config,
        HealthMonitor::new(false, None),
        vec!["./logs/test.log".to_string()],
    );
    let run = tokio::spawn(engine.run());

    let handler = backend.wait_for_handler().await;
    backend.fail_activate.store(true, Ordering::SeqCst);
    backend.place_session("gsess-fatal");
    handler.on_start_game_session(session("gsess-fatal")).await;

    let outcome = timeout(Duration::from_secs(5), run)
        .await
        .expect("engine did not react to the fatal error")
        .expect("engine task panicked");
    assert!(outcome.is_err());
}
