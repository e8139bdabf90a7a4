//! Peer Connection
//!
//! Client side of the relay protocol. Socket I/O runs on a dedicated thread
//! driving a single-threaded tokio runtime; the game thread never blocks on
//! the socket.
//!
//! ```text
//!   game thread                          I/O thread
//!   ───────────                          ──────────
//!   PacketSender ──── tokio mpsc ────▶   write_all
//!   handle_tasks ◀─── std mpsc ──────    read
//!     FrameBuffer → PacketDispatcher
//! ```
//!
//! Raw byte chunks cross threads; frames are cut on the game thread by a
//! per-connection `FrameBuffer`.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::network::codec::{
    encode_frame, CodecError, FrameBuffer, Packet, PacketReader, HOST, MAX_FRAME_SIZE,
};
use crate::network::dispatch::{Dispatched, PacketDispatcher};

/// Socket read size.
const READ_CHUNK: usize = 8 * 1024;

/// Connection errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame or packet; the connection was closed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The connection is gone.
    #[error("connection closed")]
    Closed,

    /// The I/O thread or its runtime could not be started.
    #[error("failed to start I/O thread: {0}")]
    RuntimeStart(#[source] std::io::Error),
}

// =============================================================================
// CONFIG
// =============================================================================

/// Client connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay address.
    pub server_addr: String,
    /// Nickname to log in with.
    pub nickname: String,
    /// Game to join; empty to have the relay mint one.
    pub game_id: String,
    /// Faction this player controls.
    pub faction: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", crate::DEFAULT_PORT),
            nickname: "player".to_string(),
            game_id: String::new(),
            faction: 0,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_addr: std::env::var("HEXLINK_SERVER").unwrap_or(defaults.server_addr),
            nickname: std::env::var("HEXLINK_NICKNAME").unwrap_or(defaults.nickname),
            game_id: std::env::var("HEXLINK_GAME").unwrap_or(defaults.game_id),
            faction: std::env::var("HEXLINK_FACTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.faction),
        }
    }
}

// =============================================================================
// SENDER
// =============================================================================

/// Cloneable handle for queueing outgoing frames.
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl PacketSender {
    /// Encode and queue `packet` for `destination`.
    pub fn send<P: Packet>(&self, destination: &str, packet: &P) -> Result<(), ConnectionError> {
        let frame = encode_frame(destination, packet)?;
        self.send_frame(frame)
    }

    /// Queue `packet` for the game host.
    pub fn send_to_host<P: Packet>(&self, packet: &P) -> Result<(), ConnectionError> {
        self.send(HOST, packet)
    }

    /// Queue an already encoded frame.
    pub fn send_frame(&self, frame: Vec<u8>) -> Result<(), ConnectionError> {
        #[cfg(feature = "debug-tracing")]
        tracing::trace!(frame = %hex::encode(&frame), "Queueing frame");
        self.tx.send(frame).map_err(|_| ConnectionError::Closed)
    }

    /// True once the I/O thread has stopped accepting frames.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

enum IoEvent {
    Data(Vec<u8>),
    Closed(Option<String>),
}

/// A live connection to the relay, dispatching into a context of type `S`.
pub struct PeerConnection<S> {
    dispatcher: PacketDispatcher<S>,
    frames: FrameBuffer,
    incoming: std_mpsc::Receiver<IoEvent>,
    sender: PacketSender,
    shutdown: Option<oneshot::Sender<()>>,
    io_thread: Option<JoinHandle<()>>,
    closed: bool,
}

impl<S> std::fmt::Debug for PeerConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("dispatcher", &self.dispatcher)
            .field("buffered", &self.frames.buffered())
            .field("closed", &self.closed)
            .finish()
    }
}

impl<S> PeerConnection<S> {
    /// Connect to `addr` and start the I/O thread. Returns once the socket
    /// is connected or the attempt failed.
    pub fn connect(addr: &str) -> Result<Self, ConnectionError> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), ConnectionError>>();
        let (incoming_tx, incoming_rx) = std_mpsc::channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let addr = addr.to_string();

        let io_thread = std::thread::Builder::new()
            .name("hexlink-io".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(ConnectionError::RuntimeStart(e)));
                        return;
                    }
                };
                runtime.block_on(async move {
                    let stream = match TcpStream::connect(&addr).await {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(ConnectionError::Io(e)));
                            return;
                        }
                    };
                    let _ = stream.set_nodelay(true);
                    info!(%addr, "Connected to relay");
                    let _ = ready_tx.send(Ok(()));
                    run_io(stream, outgoing_rx, incoming_tx, shutdown_rx).await;
                });
            })
            .map_err(ConnectionError::RuntimeStart)?;

        let connected = ready_rx.recv().unwrap_or(Err(ConnectionError::Closed));
        if let Err(e) = connected {
            let _ = io_thread.join();
            return Err(e);
        }

        Ok(Self {
            dispatcher: PacketDispatcher::new(),
            frames: FrameBuffer::new(MAX_FRAME_SIZE),
            incoming: incoming_rx,
            sender: PacketSender { tx: outgoing_tx },
            shutdown: Some(shutdown_tx),
            io_thread: Some(io_thread),
            closed: false,
        })
    }

    /// Handle for sending from elsewhere, e.g. inside packet handlers.
    pub fn sender(&self) -> PacketSender {
        self.sender.clone()
    }

    /// Encode and queue `packet` for `destination`.
    pub fn send<P: Packet>(&self, destination: &str, packet: &P) -> Result<(), ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        self.sender.send(destination, packet)
    }

    /// Queue `packet` for the game host.
    pub fn send_to_host<P: Packet>(&self, packet: &P) -> Result<(), ConnectionError> {
        self.send(HOST, packet)
    }

    /// Register a typed handler for `P`.
    pub fn register_handler<P, F>(&mut self, handler: F)
    where
        P: Packet,
        F: FnMut(&mut S, P) + 'static,
    {
        self.dispatcher.register::<P, F>(handler);
    }

    /// Register a handler that reads the payload itself.
    pub fn register_raw_handler<F>(&mut self, packet_id: impl Into<String>, handler: F)
    where
        F: FnMut(&mut S, &mut PacketReader<'_>) -> Result<(), CodecError> + 'static,
    {
        self.dispatcher.register_raw(packet_id, handler);
    }

    /// Drop every handler.
    pub fn clear_handlers(&mut self) {
        self.dispatcher.clear();
    }

    /// Pull everything the I/O thread received and dispatch each complete
    /// frame. Returns the number of frames handled. A malformed frame
    /// closes the connection.
    pub fn handle_tasks(&mut self, ctx: &mut S) -> Result<usize, ConnectionError> {
        loop {
            match self.incoming.try_recv() {
                Ok(IoEvent::Data(bytes)) => self.frames.extend(&bytes),
                Ok(IoEvent::Closed(reason)) => {
                    info!(reason = reason.as_deref().unwrap_or("eof"), "Relay connection closed");
                    self.closed = true;
                    break;
                }
                Err(std_mpsc::TryRecvError::Empty) => break,
                Err(std_mpsc::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }

        let mut handled = 0;
        loop {
            let frame = match self.frames.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => return Err(self.fail(e)),
            };

            #[cfg(feature = "debug-tracing")]
            tracing::trace!(frame = %hex::encode(&frame), "Received frame");

            match self.dispatcher.dispatch(ctx, &frame) {
                Ok(Dispatched::Handled(_)) => handled += 1,
                Ok(Dispatched::Unhandled(id)) => debug!(packet = %id, "Dropped frame"),
                Err(e) => return Err(self.fail(e)),
            }
        }
        Ok(handled)
    }

    fn fail(&mut self, err: CodecError) -> ConnectionError {
        warn!(error = %err, "Malformed frame from relay, closing connection");
        self.frames.clear();
        self.close();
        ConnectionError::Codec(err)
    }

    /// True once the socket closed or `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop the I/O thread and wait for it. Queued frames are flushed
    /// first; a partially received frame is discarded.
    pub fn close(&mut self) {
        self.closed = true;
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.io_thread.take() {
            if handle.join().is_err() {
                warn!("I/O thread panicked");
            }
        }
        self.frames.clear();
    }
}

impl<S> Drop for PeerConnection<S> {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_io(
    stream: TcpStream,
    mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    incoming: std_mpsc::Sender<IoEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                while let Ok(frame) = outgoing.try_recv() {
                    if writer.write_all(&frame).await.is_err() {
                        break;
                    }
                }
                let _ = writer.shutdown().await;
                break;
            }

            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    let _ = incoming.send(IoEvent::Closed(None));
                    break;
                }
                Ok(n) => {
                    if incoming.send(IoEvent::Data(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = incoming.send(IoEvent::Closed(Some(e.to_string())));
                    break;
                }
            },

            frame = outgoing.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = writer.write_all(&frame).await {
                        let _ = incoming.send(IoEvent::Closed(Some(e.to_string())));
                        break;
                    }
                }
                None => break,
            },
        }
    }
    debug!("I/O loop finished");
}
