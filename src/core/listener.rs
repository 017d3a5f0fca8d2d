use crate::core::process::Shutdown;
use crate::domain::ports::SessionBackend;
use crate::utils::error::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Replies the sample clients assert on. Do not reword.
const TOKEN_VALID_REPLY: &str = "Your connection was accepted and token valid";
const TOKEN_INVALID_REPLY: &str = "Your token is invalid";

const MAX_TOKEN_READ: usize = 1024;

/// Accepts one TCP connection per player and validates the session token the
/// client sends as its first message.
pub struct PlayerListener {
    listener: TcpListener,
    backend: Arc<dyn SessionBackend>,
    accepting: Arc<AtomicBool>,
    shutdown_rx: watch::Receiver<Option<Shutdown>>,
}

impl PlayerListener {
    pub async fn bind(
        bind_address: &str,
        port: u16,
        backend: Arc<dyn SessionBackend>,
        accepting: Arc<AtomicBool>,
        shutdown_rx: watch::Receiver<Option<Shutdown>>,
    ) -> Result<Self> {
        let addr = format!("{}:{}", bind_address, port);
        let listener = TcpListener::bind(&addr).await?;
        accepting.store(true, Ordering::SeqCst);
        info!("🎧 Listening for player connections on {}", addr);

        Ok(Self {
            listener,
            backend,
            accepting,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Ends on a shutdown signal or once the process stops
    /// accepting connections (session teardown has begun).
    pub async fn serve(mut self) -> Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            if !self.accepting.load(Ordering::SeqCst) {
                                debug!("Closing connection from {}: no longer accepting", peer);
                                drop(stream);
                                break;
                            }
                            debug!("Player connected from {}", peer);
                            let backend = Arc::clone(&self.backend);
                            tokio::spawn(async move {
                                handle_player(stream, peer, backend).await;
                            });
                        }
                        Err(e) => warn!("⚠️ Accept failed: {}", e),
                    }
                }
                changed = self.shutdown_rx.changed() => {
                    match changed {
                        Ok(()) if self.shutdown_rx.borrow().is_some() => break,
                        Ok(()) => continue,
                        // Sender gone: the process is exiting.
                        Err(_) => break,
                    }
                }
            }
        }
        info!("Player listener stopped");
        Ok(())
    }
}

/// One short exchange per connection: read the token, validate it against the
/// platform, write the verdict, close.
async fn handle_player(mut stream: TcpStream, peer: SocketAddr, backend: Arc<dyn SessionBackend>) {
    let mut buffer = [0u8; MAX_TOKEN_READ];
    let read = match stream.read(&mut buffer).await {
        Ok(0) => {
            debug!("{} disconnected before sending a token", peer);
            return;
        }
        Ok(n) => n,
        Err(e) => {
            warn!("⚠️ Read from {} failed: {}", peer, e);
            return;
        }
    };

    // First line is the token; clients may or may not send a trailing newline.
    let raw = String::from_utf8_lossy(&buffer[..read]);
    let token = raw.lines().next().unwrap_or("").trim();

    let reply = if token.is_empty() {
        info!("Empty session token from {}, rejecting", peer);
        TOKEN_INVALID_REPLY
    } else {
        match backend.accept_player_session(token).await {
            Ok(()) => {
                info!("✅ Player session accepted: {}", token);
                TOKEN_VALID_REPLY
            }
            Err(e) => {
                warn!("❌ Player session rejected ({}): {}", token, e);
                TOKEN_INVALID_REPLY
            }
        }
    };

    if let Err(e) = stream.write_all(reply.as_bytes()).await {
        warn!("⚠️ Reply to {} failed: {}", peer, e);
    }
}
