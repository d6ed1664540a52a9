//! Registry of open robot connections
//!
//! This module handles the server-side bookkeeping for accepted connections:
//! - Connection lifecycle (accept, close, idle timeout)
//! - Ownership of each connection's protocol session
//! - Routing of outgoing commands to the connection's writer task
//! - Capacity limits
//!
//! Connections are keyed by an id handed out on accept, never by the socket
//! itself, so closing and re-accepting cannot confuse two sessions.

use log::info;
use shared::ServerCommand;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::{ConnectionId, Response, Session};

/// One accepted connection and everything the server holds for it
///
/// Dropping a connection aborts its reader task and closes the outgoing
/// queue, which lets the writer flush what is queued and shut the socket.
#[derive(Debug)]
pub struct Connection {
    /// Unique id assigned on accept
    pub id: ConnectionId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// Last time any bytes arrived on this connection
    pub last_seen: Instant,
    pub session: Session,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        addr: SocketAddr,
        outgoing: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            session: Session::new(id),
            outgoing,
            reader: None,
        }
    }

    /// Returns true if nothing arrived within the timeout.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Queues commands for the writer task. Returns false once the writer
    /// has gone away.
    pub fn send(&self, commands: &[ServerCommand]) -> bool {
        commands
            .iter()
            .all(|command| self.outgoing.send(command.encode()).is_ok())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Owns all open connections
pub struct ConnectionManager {
    connections: HashMap<ConnectionId, Connection>,
    next_connection_id: ConnectionId,
    max_connections: usize,
}

impl ConnectionManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Registers a freshly accepted connection.
    ///
    /// Returns None if the server is at capacity; the caller should drop
    /// the socket.
    pub fn add_connection(
        &mut self,
        addr: SocketAddr,
        outgoing: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Option<ConnectionId> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let id = self.next_connection_id;
        self.next_connection_id = self.next_connection_id.wrapping_add(1).max(1);

        info!("Connection {} accepted from {}", id, addr);
        self.connections.insert(id, Connection::new(id, addr, outgoing));
        Some(id)
    }

    /// Hands the reader task to the connection so it is aborted on close.
    /// A reader for a connection that is already gone is aborted right away.
    pub fn attach_reader(&mut self, id: ConnectionId, reader: JoinHandle<()>) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => {
                connection.reader = Some(reader);
                true
            }
            None => {
                reader.abort();
                false
            }
        }
    }

    /// Closes a connection. Returns false if it was already gone.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        if let Some(connection) = self.connections.remove(id) {
            info!("Connection {} from {} closed", connection.id, connection.addr);
            true
        } else {
            false
        }
    }

    /// Feeds received bytes into the connection's session.
    ///
    /// Returns None for unknown connections, e.g. when bytes were still in
    /// flight while the connection was closed.
    pub fn deliver(&mut self, id: ConnectionId, chunk: &[u8]) -> Option<Response> {
        let connection = self.connections.get_mut(&id)?;
        connection.last_seen = Instant::now();
        Some(connection.session.receive(chunk))
    }

    /// Queues commands for a connection. Returns false if the connection or
    /// its writer is gone.
    pub fn send(&self, id: ConnectionId, commands: &[ServerCommand]) -> bool {
        self.connections
            .get(&id)
            .map(|connection| connection.send(commands))
            .unwrap_or(false)
    }

    #[cfg(test)]
    fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Closes and returns every connection idle for longer than `timeout`.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ConnectionId> {
        let timed_out: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, connection)| connection.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for id in &timed_out {
            self.remove_connection(id);
        }

        timed_out
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connections are open
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
