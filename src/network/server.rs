//! Relay Server
//!
//! TCP relay for hexlink games. One router task owns all membership state
//! and makes every routing decision, so sessions are never locked. Each
//! connection gets a reader task that cuts frames and forwards them to the
//! router, and a writer task fed through a bounded channel.
//!
//! ```text
//!   accept ──▶ reader task ──┐
//!   accept ──▶ reader task ──┼──▶ router (RelayState) ──▶ writer tasks
//!   accept ──▶ reader task ──┘
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::network::codec::{FrameBuffer, MAX_FRAME_SIZE};
use crate::network::session::{ConnectionId, Outbound, RelayState};

/// Frames queued per connection before it is considered stalled.
const WRITER_QUEUE: usize = 256;

/// Events queued for the router.
const ROUTER_QUEUE: usize = 1024;

/// Socket read size.
const READ_CHUNK: usize = 8 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest frame accepted from a client.
    pub max_frame_size: u32,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], crate::DEFAULT_PORT)),
            max_connections: 1000,
            max_frame_size: MAX_FRAME_SIZE,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("HEXLINK_BIND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            max_connections: std::env::var("HEXLINK_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            max_frame_size: std::env::var("HEXLINK_MAX_FRAME")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_frame_size),
            version: defaults.version,
        }
    }
}

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

enum RouterEvent {
    Frame { conn: ConnectionId, frame: Vec<u8> },
    Closed { conn: ConnectionId },
}

/// The relay.
pub struct RelayServer {
    config: ServerConfig,
    listener: TcpListener,
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Bind the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, RelayServerError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            config,
            listener,
            shutdown_tx,
        })
    }

    /// Address actually bound, useful with port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Sender that stops `run` when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Accept and route until shutdown.
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<(), RelayServerError> {
        info!(
            "Relay {} listening on {}",
            self.config.version,
            self.local_addr()?
        );

        let (events_tx, mut events_rx) = mpsc::channel::<RouterEvent>(ROUTER_QUEUE);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut state = RelayState::new();
        let mut writers: HashMap<ConnectionId, mpsc::Sender<Vec<u8>>> = HashMap::new();
        let mut next_id: ConnectionId = 1;

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if writers.len() >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            let conn = next_id;
                            next_id += 1;
                            info!(conn, "New connection from {}", addr);

                            let writer = self.spawn_connection(conn, stream, events_tx.clone());
                            writers.insert(conn, writer);
                            state.connect(conn);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }

                Some(event) = events_rx.recv() => {
                    let outbound = match event {
                        RouterEvent::Frame { conn, frame } => {
                            match state.handle_frame(conn, &frame) {
                                Ok(out) => out,
                                Err(e) => {
                                    warn!(conn, error = %e, "Malformed frame, dropping connection");
                                    writers.remove(&conn);
                                    Self::drop_session(&mut state, conn)
                                }
                            }
                        }
                        RouterEvent::Closed { conn } => {
                            info!(conn, "Client disconnected");
                            writers.remove(&conn);
                            Self::drop_session(&mut state, conn)
                        }
                    };
                    Self::deliver(&mut state, &mut writers, outbound);
                }

                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    fn drop_session(state: &mut RelayState, conn: ConnectionId) -> Vec<Outbound> {
        state.disconnect(conn).unwrap_or_else(|e| {
            error!(conn, error = %e, "Failed to encode roster update");
            Vec::new()
        })
    }

    /// Queue frames on their writers. A connection whose queue is full is
    /// dropped; the resulting roster update is delivered in turn.
    fn deliver(
        state: &mut RelayState,
        writers: &mut HashMap<ConnectionId, mpsc::Sender<Vec<u8>>>,
        mut outbound: Vec<Outbound>,
    ) {
        while !outbound.is_empty() {
            let mut stalled = Vec::new();
            for Outbound { to, frame } in outbound.drain(..) {
                let Some(writer) = writers.get(&to) else {
                    continue;
                };
                match writer.try_send(frame) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => stalled.push(to),
                    Err(mpsc::error::TrySendError::Closed(_)) => {}
                }
            }
            for conn in stalled {
                if writers.remove(&conn).is_some() {
                    warn!(conn, "Client not keeping up, dropping connection");
                    outbound.extend(Self::drop_session(state, conn));
                }
            }
        }
    }

    fn spawn_connection(
        &self,
        conn: ConnectionId,
        stream: TcpStream,
        events: mpsc::Sender<RouterEvent>,
    ) -> mpsc::Sender<Vec<u8>> {
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        let (frame_tx, frame_rx) = mpsc::channel::<Vec<u8>>(WRITER_QUEUE);
        let max_frame_size = self.config.max_frame_size;
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(write_loop(conn, writer, frame_rx));
        tokio::spawn(async move {
            read_loop(conn, reader, &events, max_frame_size, shutdown_rx).await;
            let _ = events.send(RouterEvent::Closed { conn }).await;
        });

        frame_tx
    }
}

async fn read_loop(
    conn: ConnectionId,
    mut reader: OwnedReadHalf,
    events: &mpsc::Sender<RouterEvent>,
    max_frame_size: u32,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut frames = FrameBuffer::new(max_frame_size);
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = match read {
                    Ok(0) => return,
                    Ok(n) => n,
                    Err(e) => {
                        debug!(conn, "Read error: {}", e);
                        return;
                    }
                };
                frames.extend(&buf[..n]);
                loop {
                    match frames.next_frame() {
                        Ok(Some(frame)) => {
                            #[cfg(feature = "debug-tracing")]
                            tracing::trace!(conn, frame = %hex::encode(&frame), "Frame in");
                            if events.send(RouterEvent::Frame { conn, frame }).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(conn, error = %e, "Bad frame, dropping connection");
                            return;
                        }
                    }
                }
            }
            _ = shutdown_rx.recv() => return,
        }
    }
}

async fn write_loop(conn: ConnectionId, mut writer: OwnedWriteHalf, mut frames: mpsc::Receiver<Vec<u8>>) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            debug!(conn, "Write error: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}
