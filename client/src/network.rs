//! Robot side of the protocol over a byte stream.

use crate::robot::SimulatedRobot;
use log::{debug, info, warn};
use shared::{
    auth_key, username_hash, ClientMessage, FrameAssembler, FrameError, Position, ServerCommand,
};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Longest server frame, `303 KEY OUT OF RANGE` plus terminator, with slack.
const SERVER_FRAME_MAX: usize = 32;
const READ_BUFFER_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("server closed the connection")]
    Closed,
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("unrecognised server frame {0:?}")]
    Unrecognised(String),
    #[error("server refused: {0}")]
    Refused(ServerCommand),
    #[error("expected {expected}, got {got}")]
    Unexpected {
        expected: &'static str,
        got: ServerCommand,
    },
    #[error("server sent challenge {got}, expected {expected}")]
    Impostor { expected: u16, got: u16 },
    #[error("key id {0} is not in the key table")]
    UnknownKey(u32),
    #[error("no pickup after {0} commands")]
    TooManyCommands(usize),
}

/// How the robot introduces itself and talks on the wire
#[derive(Debug, Clone)]
pub struct RobotConfig {
    pub username: Vec<u8>,
    pub key_id: u32,
    /// Message handed over at the origin
    pub secret: Vec<u8>,
    /// Split every outgoing message into writes of at most this many bytes
    pub chunk_size: Option<usize>,
    /// Give up after this many motion commands
    pub max_commands: usize,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            username: b"Robot".to_vec(),
            key_id: 0,
            secret: b"Secret message".to_vec(),
            chunk_size: None,
            max_commands: 1000,
        }
    }
}

/// What happened during a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub commands: usize,
    pub final_position: Position,
}

pub struct RobotClient<S = TcpStream> {
    stream: S,
    frames: FrameAssembler,
    config: RobotConfig,
}

impl RobotClient<TcpStream> {
    pub async fn connect(addr: &str, config: RobotConfig) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to {}", addr);
        Ok(Self::new(stream, config))
    }
}

impl<S> RobotClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: RobotConfig) -> Self {
        Self {
            stream,
            frames: FrameAssembler::new(),
            config,
        }
    }

    /// Logs in, follows motion commands until the pickup, hands over the
    /// secret and waits for the logout.
    pub async fn run(mut self, robot: &mut SimulatedRobot) -> Result<RunSummary, ClientError> {
        self.authenticate().await?;

        let mut commands = 0;
        loop {
            let command = self.next_command().await?;
            debug!("<- {}", command);

            match command {
                ServerCommand::Move | ServerCommand::TurnLeft | ServerCommand::TurnRight => {
                    commands += 1;
                    if commands > self.config.max_commands {
                        return Err(ClientError::TooManyCommands(self.config.max_commands));
                    }
                    // Motion commands always produce a report.
                    if let Some(position) = robot.execute(command) {
                        self.send(ClientMessage::Report(position)).await?;
                    }
                }
                ServerCommand::PickUp => {
                    let secret = ClientMessage::Secret(self.config.secret.clone());
                    self.send(secret).await?;
                    self.expect_command(ServerCommand::Logout, "logout").await?;
                    info!(
                        "Delivered secret at {} after {} commands",
                        robot.position(),
                        commands
                    );
                    return Ok(RunSummary {
                        commands,
                        final_position: robot.position(),
                    });
                }
                other if other.is_error() => return Err(ClientError::Refused(other)),
                other => {
                    return Err(ClientError::Unexpected {
                        expected: "a motion command",
                        got: other,
                    })
                }
            }
        }
    }

    async fn authenticate(&mut self) -> Result<(), ClientError> {
        let hash = username_hash(&self.config.username);

        self.send(ClientMessage::Username(self.config.username.clone()))
            .await?;
        self.expect_command(ServerCommand::KeyRequest, "key request").await?;

        self.send(ClientMessage::KeyId(self.config.key_id)).await?;
        let challenge = match self.next_command().await? {
            ServerCommand::Confirmation(value) => value,
            other if other.is_error() => return Err(ClientError::Refused(other)),
            other => {
                return Err(ClientError::Unexpected {
                    expected: "server confirmation",
                    got: other,
                })
            }
        };

        let key =
            auth_key(self.config.key_id).ok_or(ClientError::UnknownKey(self.config.key_id))?;
        let expected = key.server_confirmation(hash);
        if challenge != expected {
            warn!(
                "Server challenge {} does not match key {}",
                challenge, self.config.key_id
            );
            return Err(ClientError::Impostor {
                expected,
                got: challenge,
            });
        }

        let answer = key.client_confirmation(hash);
        self.send(ClientMessage::Confirmation(u32::from(answer))).await?;
        self.expect_command(ServerCommand::Ok, "login confirmation").await?;
        info!("Logged in with key {}", self.config.key_id);
        Ok(())
    }

    async fn expect_command(
        &mut self,
        wanted: ServerCommand,
        expected: &'static str,
    ) -> Result<(), ClientError> {
        match self.next_command().await? {
            command if command == wanted => Ok(()),
            command if command.is_error() => Err(ClientError::Refused(command)),
            command => Err(ClientError::Unexpected {
                expected,
                got: command,
            }),
        }
    }

    async fn send(&mut self, message: ClientMessage) -> Result<(), ClientError> {
        let bytes = message.encode();
        let chunk_size = self.config.chunk_size.unwrap_or(bytes.len()).max(1);
        for chunk in bytes.chunks(chunk_size) {
            self.stream.write_all(chunk).await?;
            self.stream.flush().await?;
        }
        Ok(())
    }

    async fn next_command(&mut self) -> Result<ServerCommand, ClientError> {
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        loop {
            if let Some(frame) = self.frames.next_frame(SERVER_FRAME_MAX)? {
                return ServerCommand::decode(&frame).ok_or_else(|| {
                    ClientError::Unrecognised(String::from_utf8_lossy(&frame).into_owned())
                });
            }

            let len = self.stream.read(&mut buffer).await?;
            if len == 0 {
                return Err(ClientError::Closed);
            }
            self.frames.extend(&buffer[..len]);
        }
    }
}
