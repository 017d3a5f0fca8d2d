use crate::adapters::protocol::{
    events, InboundEnvelope, RequestEnvelope, RequestPayload, StartGameSessionEvent,
    TerminateProcessEvent, UpdateGameSessionEvent, SDK_LANGUAGE, SDK_VERSION,
};
use crate::domain::model::{ProcessParameters, StopBackfillRequest};
use crate::domain::ports::{ConfigProvider, SessionBackend, SessionHandler};
use crate::utils::error::{Result, ServerError};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::{timeout, Duration, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type PendingMap = HashMap<String, oneshot::Sender<InboundEnvelope>>;

/// Where and as whom to connect. The platform injects the identity values
/// into the process environment when it launches the build.
#[derive(Debug, Clone)]
pub struct FleetEndpoint {
    pub websocket_url: String,
    pub process_id: String,
    pub host_id: String,
    pub fleet_id: String,
    pub auth_token: String,
}

impl FleetEndpoint {
    pub fn from_config(config: &dyn ConfigProvider) -> Self {
        Self {
            websocket_url: config.websocket_url().to_string(),
            process_id: config.process_id().to_string(),
            host_id: config.host_id().to_string(),
            fleet_id: config.fleet_id().to_string(),
            auth_token: config.auth_token().to_string(),
        }
    }

    fn connect_url(&self) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.websocket_url).map_err(|e| {
            ServerError::InvalidConfigValueError {
                field: "websocket_url".to_string(),
                value: self.websocket_url.clone(),
                reason: e.to_string(),
            }
        })?;
        url.query_pairs_mut()
            .append_pair("processId", &self.process_id)
            .append_pair("hostId", &self.host_id)
            .append_pair("fleetId", &self.fleet_id)
            .append_pair("authToken", &self.auth_token)
            .append_pair("sdkVersion", SDK_VERSION)
            .append_pair("sdkLanguage", SDK_LANGUAGE);
        Ok(url)
    }
}

struct ClientInner {
    sink: Mutex<WsSink>,
    pending: Mutex<PendingMap>,
    handler: RwLock<Option<Arc<dyn SessionHandler>>>,
    game_session_id: std::sync::RwLock<Option<String>>,
    terminated: AtomicBool,
    request_timeout: Duration,
    health_interval: Duration,
}

impl ClientInner {
    /// Send one request and wait for the platform's reply to it. Replies are
    /// matched on `requestId` by the reader task.
    async fn call(&self, payload: RequestPayload) -> Result<InboundEnvelope> {
        let envelope = RequestEnvelope::new(payload);
        let action = envelope.action_name();
        let request_id = envelope.request_id.clone();

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), reply_tx);

        let json = serde_json::to_string(&envelope)?;
        debug!("📤 {} ({})", action, request_id);

        let send_result = self.sink.lock().await.send(Message::text(json)).await;
        if let Err(e) = send_result {
            self.pending.lock().await.remove(&request_id);
            return Err(ServerError::WebSocketError(e));
        }

        let reply = match timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            // Reader task dropped the sender: socket is gone.
            Ok(Err(_)) => return Err(ServerError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                return Err(ServerError::TimeoutError {
                    operation: action.to_string(),
                });
            }
        };

        if reply.is_success() {
            debug!("📥 {} ok (status {:?})", action, reply.status_code);
            Ok(reply)
        } else {
            Err(ServerError::PlatformError {
                action: action.to_string(),
                status_code: reply.status_code.unwrap_or_default(),
                message: reply
                    .error_message
                    .unwrap_or_else(|| "no error message".to_string()),
            })
        }
    }

    async fn current_handler(&self) -> Option<Arc<dyn SessionHandler>> {
        self.handler.read().await.clone()
    }

    fn cache_game_session_id(&self, id: &str) {
        if let Ok(mut cached) = self.game_session_id.write() {
            *cached = Some(id.to_string());
        }
    }
}

/// Lifecycle client for the fleet manager's WebSocket API. One instance per
/// process; cloning shares the connection.
#[derive(Clone)]
pub struct FleetClient {
    inner: Arc<ClientInner>,
}

impl FleetClient {
    /// Open the WebSocket connection and start the reader task. Callbacks are
    /// not delivered until [`SessionBackend::process_ready`] registers a
    /// handler.
    pub async fn connect(
        endpoint: FleetEndpoint,
        request_timeout: Duration,
        health_interval: Duration,
    ) -> Result<Self> {
        let url = endpoint.connect_url()?;
        info!("🔌 Connecting to fleet manager at {}", url.host_str().unwrap_or("?"));

        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (sink, stream) = ws_stream.split();

        let inner = Arc::new(ClientInner {
            sink: Mutex::new(sink),
            pending: Mutex::new(HashMap::new()),
            handler: RwLock::new(None),
            game_session_id: std::sync::RwLock::new(None),
            terminated: AtomicBool::new(false),
            request_timeout,
            health_interval,
        });

        tokio::spawn(Self::read_loop(stream, Arc::clone(&inner)));

        info!("✅ Connected to fleet manager");
        Ok(Self { inner })
    }

    async fn read_loop(mut stream: SplitStream<WsStream>, inner: Arc<ClientInner>) {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => Self::dispatch(&inner, text.as_str()).await,
                Ok(Message::Close(_)) => {
                    info!("Fleet manager closed the connection");
                    break;
                }
                // Ping/Pong handled by tungstenite itself.
                Ok(_) => {}
                Err(e) => {
                    warn!("❌ WebSocket receive error: {}", e);
                    break;
                }
            }
        }

        // Fail every in-flight request so callers do not sit out their
        // full timeout against a dead socket.
        let mut pending = inner.pending.lock().await;
        if !pending.is_empty() {
            warn!("Connection lost with {} request(s) in flight", pending.len());
        }
        pending.clear();
        debug!("Reader task stopped");
    }

    async fn dispatch(inner: &Arc<ClientInner>, text: &str) {
        let envelope: InboundEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping unparseable message: {}", e);
                return;
            }
        };

        // Replies echo the request id of the call they answer.
        if let Some(request_id) = envelope.request_id.as_deref() {
            if let Some(reply_tx) = inner.pending.lock().await.remove(request_id) {
                let _ = reply_tx.send(envelope);
                return;
            }
        }

        let Some(action) = envelope.action.as_deref() else {
            debug!("Dropping message without action");
            return;
        };
        let Some(handler) = inner.current_handler().await else {
            warn!("Event '{}' before process-ready, dropping", action);
            return;
        };

        // Callbacks run on their own task: they issue requests through this
        // client, and those replies come through this reader loop.
        match action {
            events::START_GAME_SESSION => match serde_json::from_str::<StartGameSessionEvent>(text) {
                Ok(event) => {
                    inner.cache_game_session_id(&event.game_session.game_session_id);
                    info!("📥 StartGameSession: {}", event.game_session.game_session_id);
                    tokio::spawn(async move {
                        handler.on_start_game_session(event.game_session).await;
                    });
                }
                Err(e) => warn!("Malformed StartGameSession event: {}", e),
            },
            events::UPDATE_GAME_SESSION => match serde_json::from_str::<UpdateGameSessionEvent>(text) {
                Ok(update) => {
                    info!("📥 UpdateGameSession (reason {:?})", update.update_reason);
                    tokio::spawn(async move {
                        handler.on_update_game_session(update).await;
                    });
                }
                Err(e) => warn!("Malformed UpdateGameSession event: {}", e),
            },
            events::TERMINATE_PROCESS => {
                match serde_json::from_str::<TerminateProcessEvent>(text) {
                    Ok(event) => {
                        if let Some(deadline) = event.termination_time {
                            info!("📥 TerminateProcess, hard deadline {}", deadline);
                        } else {
                            info!("📥 TerminateProcess");
                        }
                        tokio::spawn(async move {
                            handler.on_process_terminate().await;
                        });
                    }
                    Err(e) => warn!("Malformed TerminateProcess event: {}", e),
                }
            }
            other => debug!("Ignoring unknown action '{}'", other),
        }
    }

    /// Every `health_interval`, ask the handler for a verdict and report it.
    /// The first report goes out immediately after process-ready.
    async fn heartbeat_loop(inner: Arc<ClientInner>) {
        let mut ticker = tokio::time::interval(inner.health_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if inner.terminated.load(Ordering::SeqCst) {
                break;
            }
            let Some(handler) = inner.current_handler().await else {
                continue;
            };

            let healthy = match timeout(inner.request_timeout, handler.on_health_check()).await {
                Ok(verdict) => verdict,
                Err(_) => {
                    warn!("Health check did not answer in time, reporting unhealthy");
                    false
                }
            };

            match inner
                .call(RequestPayload::HeartbeatServerProcess { healthy })
                .await
            {
                Ok(_) => debug!("💓 Heartbeat sent (healthy: {})", healthy),
                Err(ServerError::ConnectionClosed) | Err(ServerError::WebSocketError(_)) => {
                    warn!("Heartbeat stopped: connection lost");
                    break;
                }
                Err(e) => warn!("Heartbeat failed: {}", e),
            }
        }
        debug!("Heartbeat task stopped");
    }
}

#[async_trait]
impl SessionBackend for FleetClient {
    async fn process_ready(
        &self,
        params: ProcessParameters,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<()> {
        *self.inner.handler.write().await = Some(handler);

        self.inner
            .call(RequestPayload::ActivateServerProcess {
                sdk_version: SDK_VERSION.to_string(),
                sdk_language: SDK_LANGUAGE.to_string(),
                port: params.port,
                log_paths: params.log_paths.clone(),
            })
            .await?;

        tokio::spawn(Self::heartbeat_loop(Arc::clone(&self.inner)));

        info!("✅ Process registered as ready on port {}", params.port);
        Ok(())
    }

    async fn activate_game_session(&self, game_session_id: &str) -> Result<()> {
        self.inner
            .call(RequestPayload::ActivateGameSession {
                game_session_id: game_session_id.to_string(),
            })
            .await?;
        info!("✅ Game session activated: {}", game_session_id);
        Ok(())
    }

    async fn accept_player_session(&self, player_session_id: &str) -> Result<()> {
        let game_session_id =
            self.game_session_id()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ServerError::SessionError {
                    message: "no active game session to accept players into".to_string(),
                })?;

        self.inner
            .call(RequestPayload::AcceptPlayerSession {
                game_session_id,
                player_session_id: player_session_id.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn stop_match_backfill(&self, request: StopBackfillRequest) -> Result<()> {
        info!("🛑 Stopping match backfill ticket {}", request.ticket_id);
        self.inner
            .call(RequestPayload::StopMatchBackfill(request))
            .await?;
        Ok(())
    }

    async fn process_ending(&self) -> Result<()> {
        self.inner.terminated.store(true, Ordering::SeqCst);
        let result = self.inner.call(RequestPayload::TerminateServerProcess).await;

        // Best effort: the process exits right after this either way.
        let _ = self.inner.sink.lock().await.send(Message::Close(None)).await;

        result.map(|_| {
            info!("✅ Process ending acknowledged by fleet manager");
        })
    }

    fn game_session_id(&self) -> Option<String> {
        self.inner
            .game_session_id
            .read()
            .ok()
            .and_then(|cached| cached.clone())
    }
}
