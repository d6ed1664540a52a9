//! # Robot Server Library
//!
//! This library implements the server side of the robot protocol: it
//! authenticates robots that connect over TCP, steers each one to the
//! origin of its grid one command at a time, and collects the message the
//! robot picks up there.
//!
//! ## Core Responsibilities
//!
//! ### Authentication
//! Every robot logs in with a username and a key id. Server and robot prove
//! knowledge of a shared key pair by exchanging the username hash offset by
//! their half of the pair. See [`auth`].
//!
//! ### Navigation
//! Robots report only their position. The server infers heading from the
//! first successful move, tracks it through its own turn commands, detects
//! obstacles as moves without effect and drives a fixed detour around them.
//! See [`navigation`].
//!
//! ### Protocol Sequencing
//! Each connection runs a strict state machine, from username to logout.
//! Malformed input closes the connection, in some states after an error
//! reply. See [`session`].
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Session Processing
//! Connection tasks only move bytes. All protocol work for all sessions is
//! done sequentially on the main server loop, which owns every session
//! through the [`connection_manager`]. No session state is shared, so no
//! locking is needed.
//!
//! ### Failure Isolation
//! Read errors, write errors, protocol violations and idle timeouts close
//! only the connection they happened on. Only a failing listener ends the
//! server.
//!
//! ## Module Organization
//!
//! - `auth`: challenge/response handshake state
//! - `navigation`: position and heading tracking, steering, detours
//! - `session`: per-connection state machine and frame budgets
//! - `connection_manager`: owned registry of open connections
//! - `network`: listener, connection tasks, main loop
//! - `config`: server settings
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod connection_manager;
pub mod navigation;
pub mod network;
pub mod session;
