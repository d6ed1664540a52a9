//! Integration tests for the robot server
//!
//! These tests run a real server on a loopback port and talk to it either
//! byte by byte or through the simulated robot.

use client::network::{ClientError, RobotClient, RobotConfig};
use client::robot::SimulatedRobot;
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::ServerConfig;
use server::navigation::{Navigator, Step};
use server::network::Server;
use shared::{FrameAssembler, Heading, Position, ServerCommand};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

const IO_TIMEOUT: Duration = Duration::from_secs(3);

async fn start_server(idle_timeout: Duration) -> SocketAddr {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        idle_timeout,
        ..ServerConfig::default()
    };
    let mut server = Server::bind(config).await.expect("Failed to bind server");
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

/// Raw protocol peer that checks the server's frames one at a time
struct Peer {
    stream: TcpStream,
    frames: FrameAssembler,
}

impl Peer {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.expect("Failed to connect"),
            frames: FrameAssembler::new(),
        }
    }

    async fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Next frame, or None once the server has closed the connection
    async fn recv(&mut self) -> Option<Vec<u8>> {
        let mut buffer = [0u8; 128];
        loop {
            if let Some(frame) = self.frames.next_frame(64).unwrap() {
                return Some(frame);
            }
            let len = timeout(IO_TIMEOUT, self.stream.read(&mut buffer))
                .await
                .expect("Timed out waiting for the server")
                .unwrap_or(0);
            if len == 0 {
                return None;
            }
            self.frames.extend(&buffer[..len]);
        }
    }

    async fn expect(&mut self, text: &str) {
        let frame = self.recv().await.expect("Connection closed early");
        assert_eq!(String::from_utf8_lossy(&frame), text);
    }

    async fn expect_closed(&mut self) {
        assert_eq!(self.recv().await, None);
    }

    async fn login(&mut self) {
        self.send(b"Mario\x07\x08").await;
        self.expect("107 KEY REQUEST").await;
        self.send(b"0\x07\x08").await;
        self.expect("2731").await;
        self.send(b"11749\x07\x08").await;
        self.expect("200 OK").await;
        self.expect("102 MOVE").await;
    }
}

/// LOGIN HANDSHAKE TESTS
mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn successful_login() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;
        peer.login().await;
    }

    #[tokio::test]
    async fn terminator_split_across_reads() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;

        peer.send(b"Mario\x07").await;
        sleep(Duration::from_millis(50)).await;
        peer.send(b"\x08").await;

        peer.expect("107 KEY REQUEST").await;
    }

    #[tokio::test]
    async fn several_frames_in_one_write() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;

        peer.send(b"Mario\x07\x080\x07\x0811749\x07\x08").await;

        peer.expect("107 KEY REQUEST").await;
        peer.expect("2731").await;
        peer.expect("200 OK").await;
        peer.expect("102 MOVE").await;
    }

    #[tokio::test]
    async fn longest_username_is_accepted() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;

        peer.send(b"abcdefghijklmnopqr\x07\x08").await;
        peer.expect("107 KEY REQUEST").await;
    }

    #[tokio::test]
    async fn overlong_username_is_a_syntax_error() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;

        peer.send(b"abcdefghijklmnopqrs\x07\x08").await;
        peer.expect("301 SYNTAX ERROR").await;
        peer.expect_closed().await;
    }

    #[tokio::test]
    async fn key_out_of_range() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;

        peer.send(b"Mario\x07\x08").await;
        peer.expect("107 KEY REQUEST").await;
        peer.send(b"5\x07\x08").await;
        peer.expect("303 KEY OUT OF RANGE").await;
        peer.expect_closed().await;
    }

    #[tokio::test]
    async fn malformed_key_closes_silently() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;

        peer.send(b"Mario\x07\x08").await;
        peer.expect("107 KEY REQUEST").await;
        peer.send(b"ab\x07\x08").await;
        peer.expect_closed().await;
    }

    #[tokio::test]
    async fn wrong_confirmation() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;

        peer.send(b"Mario\x07\x08").await;
        peer.expect("107 KEY REQUEST").await;
        peer.send(b"0\x07\x08").await;
        peer.expect("2731").await;
        peer.send(b"11748\x07\x08").await;
        peer.expect("300 LOGIN FAILED").await;
        peer.expect_closed().await;
    }
}

/// NAVIGATION TESTS
mod navigation_tests {
    use super::*;

    #[tokio::test]
    async fn straight_line_to_origin_and_secret() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;
        peer.login().await;

        // Facing down from (0, 3).
        peer.send(b"OK 0 2\x07\x08").await;
        peer.expect("102 MOVE").await;
        peer.send(b"OK 0 1\x07\x08").await;
        peer.expect("102 MOVE").await;
        peer.send(b"OK 0 0\x07\x08").await;
        peer.expect("105 GET MESSAGE").await;
        peer.send(b"Hello there\x07\x08").await;
        peer.expect("106 LOGOUT").await;
        peer.expect_closed().await;
    }

    #[tokio::test]
    async fn malformed_report_closes_silently() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut peer = Peer::connect(addr).await;
        peer.login().await;

        peer.send(b"OK 1\x07\x08").await;
        peer.expect_closed().await;
    }

    #[tokio::test]
    async fn simulated_robot_around_obstacle() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut robot = SimulatedRobot::new(Position::new(0, -5), Heading::Up)
            .with_obstacles([Position::new(0, -2)]);

        let client = RobotClient::connect(&addr.to_string(), RobotConfig::default())
            .await
            .unwrap();
        let summary = client.run(&mut robot).await.unwrap();

        assert_eq!(summary.final_position, Position::ORIGIN);
        assert_eq!(robot.bumps(), 1);
    }

    #[tokio::test]
    async fn one_byte_writes() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut robot = SimulatedRobot::new(Position::new(4, 3), Heading::Left);
        let config = RobotConfig {
            chunk_size: Some(1),
            ..RobotConfig::default()
        };

        let client = RobotClient::connect(&addr.to_string(), config).await.unwrap();
        let summary = client.run(&mut robot).await.unwrap();

        assert_eq!(summary.final_position, Position::ORIGIN);
    }

    #[tokio::test]
    async fn unknown_key_is_refused() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut robot = SimulatedRobot::new(Position::new(1, 1), Heading::Up);
        let config = RobotConfig {
            key_id: 9,
            ..RobotConfig::default()
        };

        let client = RobotClient::connect(&addr.to_string(), config).await.unwrap();
        let result = client.run(&mut robot).await;

        assert!(matches!(
            result,
            Err(ClientError::Refused(ServerCommand::KeyOutOfRange))
        ));
    }

    /// Drives a seeded random robot with the server's navigator, no sockets
    #[test]
    fn random_layouts_converge() {
        let mut rng = StdRng::seed_from_u64(2024);

        for _ in 0..200 {
            let mut robot = SimulatedRobot::random(&mut rng, 10, 6);
            let start = robot.position();
            let mut navigator = Navigator::new();
            let mut command = ServerCommand::Move;
            let mut arrived = false;

            for _ in 0..1000 {
                let report = robot.execute(command).expect("motion command");
                match navigator.on_report(report).unwrap() {
                    Step::Arrived => {
                        arrived = true;
                        break;
                    }
                    Step::Command(next) => command = next,
                }
            }

            assert!(arrived, "robot starting at {} never arrived", start);
            assert!(robot.position().is_origin());
        }
    }
}

/// CONNECTION HANDLING TESTS
mod connection_tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_robots() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut handles = Vec::new();

        for seed in 0..8u64 {
            handles.push(tokio::spawn(async move {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut robot = SimulatedRobot::random(&mut rng, 10, 3);
                let config = RobotConfig {
                    username: format!("robot-{}", seed).into_bytes(),
                    key_id: (seed % 5) as u32,
                    chunk_size: Some(1 + seed as usize % 4),
                    ..RobotConfig::default()
                };
                let client = RobotClient::connect(&addr.to_string(), config).await?;
                client.run(&mut robot).await
            }));
        }

        for handle in handles {
            let summary = handle.await.unwrap().unwrap();
            assert_eq!(summary.final_position, Position::ORIGIN);
        }
    }

    #[tokio::test]
    async fn idle_connection_times_out() {
        let addr = start_server(Duration::from_millis(200)).await;
        let mut peer = Peer::connect(addr).await;

        peer.send(b"Mario\x07\x08").await;
        peer.expect("107 KEY REQUEST").await;

        // No reply to anything sent after the timeout.
        sleep(Duration::from_millis(600)).await;
        peer.expect_closed().await;
    }

    #[tokio::test]
    async fn slow_robot_within_timeout_survives() {
        let addr = start_server(Duration::from_millis(500)).await;
        let mut peer = Peer::connect(addr).await;

        for byte in b"Mario\x07\x08" {
            peer.send(&[*byte]).await;
            sleep(Duration::from_millis(100)).await;
        }
        peer.expect("107 KEY REQUEST").await;
    }

    #[tokio::test]
    async fn other_sessions_survive_a_failure() {
        let addr = start_server(Duration::from_secs(1)).await;
        let mut good = Peer::connect(addr).await;
        let mut bad = Peer::connect(addr).await;

        good.send(b"Mario\x07\x08").await;
        good.expect("107 KEY REQUEST").await;

        bad.send(b"Mario\x07\x08").await;
        bad.expect("107 KEY REQUEST").await;
        bad.send(b"7\x07\x08").await;
        bad.expect("303 KEY OUT OF RANGE").await;
        bad.expect_closed().await;

        good.send(b"0\x07\x08").await;
        good.expect("2731").await;
    }
}
