//! # Simulated Robot Library
//!
//! This library provides a robot that speaks the server's protocol, used to
//! exercise the server by hand and in end-to-end tests.
//!
//! ## Module Organization
//!
//! ### Robot Module (`robot`)
//! A robot on an infinite grid with obstacle cells:
//! - Forward moves that stall on obstacles
//! - Turns in place
//! - Seeded random placement of robot and obstacles
//!
//! ### Network Module (`network`)
//! Drives the robot from a server connection:
//! - Login with username and key id, checking the server's challenge
//! - Position reports for every motion command
//! - Secret handover at the origin
//! - Optionally split writes to test frame reassembly
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{RobotClient, RobotConfig};
//! use client::robot::SimulatedRobot;
//! use shared::{Heading, Position};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut robot = SimulatedRobot::new(Position::new(3, -2), Heading::Up);
//!     let client = RobotClient::connect("127.0.0.1:5555", RobotConfig::default()).await?;
//!     let summary = client.run(&mut robot).await?;
//!     println!("Arrived after {} commands", summary.commands);
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod robot;
