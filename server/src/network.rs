//! Server network layer handling TCP connections and session dispatch

use crate::config::ServerConfig;
use crate::connection_manager::ConnectionManager;
use crate::session::{Closure, ConnectionId, Response};
use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

const READ_BUFFER_SIZE: usize = 1024;

/// Transport failures, always scoped to a single connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("short write")]
    ShortWrite,
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

impl ConnectionError {
    fn from_write(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::WriteZero {
            ConnectionError::ShortWrite
        } else {
            ConnectionError::Write(error)
        }
    }
}

/// Messages sent from connection tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    BytesReceived {
        id: ConnectionId,
        bytes: Vec<u8>,
    },
    Disconnected {
        id: ConnectionId,
    },
    ConnectionFailed {
        id: ConnectionId,
        error: ConnectionError,
    },
}

/// Main server: accepts robots and runs every session on one loop
pub struct Server {
    listener: TcpListener,
    connections: ConnectionManager,
    config: ServerConfig,

    // Communication channel from connection tasks
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            connections: ConnectionManager::new(config.max_connections),
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Registers a connection and spawns its reader and writer tasks
    fn accept_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let Some(id) = self.connections.add_connection(addr, outgoing_tx) else {
            warn!("Rejecting connection from {}: server full", addr);
            return;
        };

        let (reader, writer) = stream.into_split();
        tokio::spawn(write_loop(id, writer, outgoing_rx, self.server_tx.clone()));
        let reader = tokio::spawn(read_loop(id, reader, self.server_tx.clone()));
        self.connections.attach_reader(id, reader);
    }

    /// Processes events coming from connection tasks
    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::BytesReceived { id, bytes } => {
                match self.connections.deliver(id, &bytes) {
                    Some(response) => self.dispatch(id, response),
                    None => debug!("Dropping {} bytes for closed connection {}", bytes.len(), id),
                }
            }
            ServerMessage::Disconnected { id } => {
                if self.connections.remove_connection(&id) {
                    info!("Connection {} closed by peer", id);
                }
            }
            ServerMessage::ConnectionFailed { id, error } => {
                if self.connections.remove_connection(&id) {
                    warn!("Connection {} failed: {}", id, error);
                }
            }
        }
    }

    /// Queues a session's replies and closes the connection when told to
    fn dispatch(&mut self, id: ConnectionId, response: Response) {
        for command in &response.commands {
            debug!("session {} -> {}", id, command);
        }
        let queued = self.connections.send(id, &response.commands);

        match response.closure {
            None if queued => return,
            None => warn!("Connection {}: writer gone", id),
            Some(Closure::Completed) => info!("Connection {}: session completed", id),
            Some(Closure::Failed(error)) => warn!("Connection {}: {}", id, error),
        }
        self.connections.remove_connection(&id);
    }

    fn sweep_idle(&mut self) {
        for id in self.connections.check_timeouts(self.config.idle_timeout) {
            warn!("Connection {} timed out", id);
        }
    }

    /// Main server loop coordinating all operations
    ///
    /// Returns only if accepting fails in a way that will not recover, such
    /// as running out of file descriptors.
    pub async fn run(&mut self) -> io::Result<()> {
        let mut sweep = interval(self.config.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.accept_connection(stream, addr),
                        Err(e) if is_transient(&e) => warn!("Accept failed: {}", e),
                        Err(e) => {
                            error!("Accept failed, shutting down: {}", e);
                            return Err(e);
                        }
                    }
                },

                Some(message) = self.server_rx.recv() => {
                    self.handle_message(message);
                },

                _ = sweep.tick() => {
                    self.sweep_idle();
                },
            }
        }
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Forwards everything read from a connection to the main loop until EOF
/// or an error
pub async fn read_loop<R>(
    id: ConnectionId,
    mut reader: R,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        let message = match reader.read(&mut buffer).await {
            Ok(0) => ServerMessage::Disconnected { id },
            Ok(len) => ServerMessage::BytesReceived {
                id,
                bytes: buffer[..len].to_vec(),
            },
            Err(e) => ServerMessage::ConnectionFailed {
                id,
                error: ConnectionError::Read(e),
            },
        };

        let done = !matches!(message, ServerMessage::BytesReceived { .. });
        if let Err(e) = server_tx.send(message) {
            error!("Failed to send to main loop: {}", e);
            break;
        }
        if done {
            break;
        }
    }
}

/// Writes queued frames in order. Shuts the write side down once the
/// queue is closed, after everything queued has been written.
pub async fn write_loop<W>(
    id: ConnectionId,
    mut writer: W,
    mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = outgoing.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            let _ = server_tx.send(ServerMessage::ConnectionFailed {
                id,
                error: ConnectionError::from_write(e),
            });
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Connection {}: shutdown failed: {}", id, e);
    }
}
