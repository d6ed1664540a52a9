//! Per-connection protocol state machine.
//!
//! A [`Session`] owns everything the server knows about one robot: the
//! reassembly buffer, the login handshake and the navigator. The reactor
//! feeds it raw chunks and gets back a [`Response`] listing the commands to
//! write and whether the connection must be closed afterwards. Nothing in
//! here touches a socket.

use std::fmt;

use log::{debug, info, warn};
use shared::message::{decode_bounded, decode_position, decode_text};
use shared::{
    DecodeError, FrameAssembler, FrameError, ServerCommand, CONFIRMATION_FRAME_MAX,
    CONFIRMATION_MAX, KEY_ID_FRAME_MAX, KEY_ID_MAX, MESSAGE_FRAME_MAX, POSITION_FRAME_MAX,
    USERNAME_FRAME_MAX,
};
use thiserror::Error;

use crate::auth::{AuthError, Handshake};
use crate::navigation::{NavigationError, Navigator, Step};

pub type ConnectionId = u32;

/// Externally visible protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitUsername,
    AwaitKeyId,
    AwaitConfirmation,
    AwaitMoveAck,
    AwaitFinalMessage,
    Closed,
}

impl SessionState {
    /// Frame budget, terminator included, for frames received in this state.
    pub fn frame_limit(self) -> usize {
        match self {
            SessionState::AwaitUsername => USERNAME_FRAME_MAX,
            SessionState::AwaitKeyId => KEY_ID_FRAME_MAX,
            SessionState::AwaitConfirmation => CONFIRMATION_FRAME_MAX,
            SessionState::AwaitMoveAck => POSITION_FRAME_MAX,
            SessionState::AwaitFinalMessage => MESSAGE_FRAME_MAX,
            SessionState::Closed => 0,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("bad username: {0}")]
    Username(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

impl SessionError {
    /// Error reply written before the connection is closed. Failures after
    /// the login close without a word.
    pub fn reply(&self) -> Option<ServerCommand> {
        match self {
            SessionError::Username(_) => Some(ServerCommand::SyntaxError),
            SessionError::Auth(AuthError::KeyOutOfRange(_)) => Some(ServerCommand::KeyOutOfRange),
            SessionError::Auth(AuthError::Mismatch(_)) => Some(ServerCommand::LoginFailed),
            _ => None,
        }
    }
}

/// Why a session ended.
#[derive(Debug)]
pub enum Closure {
    /// The secret message was received and the robot logged out.
    Completed,
    Failed(SessionError),
}

/// Outcome of feeding one chunk into a session.
#[derive(Debug, Default)]
pub struct Response {
    /// Commands to write, in order.
    pub commands: Vec<ServerCommand>,
    /// Set when the connection must be closed once the commands are written.
    pub closure: Option<Closure>,
}

impl Response {
    pub fn is_closing(&self) -> bool {
        self.closure.is_some()
    }
}

#[derive(Debug)]
enum Stage {
    AwaitUsername,
    AwaitKeyId(Handshake),
    AwaitConfirmation(Handshake),
    AwaitMoveAck(Navigator),
    AwaitFinalMessage,
    Closed,
}

#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    stage: Stage,
    frames: FrameAssembler,
    username: Option<String>,
    secret: Option<Vec<u8>>,
}

impl Session {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            stage: Stage::AwaitUsername,
            frames: FrameAssembler::new(),
            username: None,
            secret: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        match self.stage {
            Stage::AwaitUsername => SessionState::AwaitUsername,
            Stage::AwaitKeyId(_) => SessionState::AwaitKeyId,
            Stage::AwaitConfirmation(_) => SessionState::AwaitConfirmation,
            Stage::AwaitMoveAck(_) => SessionState::AwaitMoveAck,
            Stage::AwaitFinalMessage => SessionState::AwaitFinalMessage,
            Stage::Closed => SessionState::Closed,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The message picked up at the origin, once received.
    pub fn secret(&self) -> Option<&[u8]> {
        self.secret.as_deref()
    }

    pub fn navigator(&self) -> Option<&Navigator> {
        match &self.stage {
            Stage::AwaitMoveAck(navigator) => Some(navigator),
            _ => None,
        }
    }

    /// Processes a chunk read from the connection.
    ///
    /// All frames completed by the chunk are handled in arrival order. The
    /// first failure closes the session; bytes after it are ignored.
    pub fn receive(&mut self, chunk: &[u8]) -> Response {
        let mut response = Response::default();
        if self.state() == SessionState::Closed {
            warn!("session {}: data after close ignored", self.id);
            return response;
        }

        self.frames.extend(chunk);
        loop {
            let state = self.state();
            let frame = match self.frames.next_frame(state.frame_limit()) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(error) => {
                    let error = match state {
                        SessionState::AwaitUsername => SessionError::Username(error.to_string()),
                        _ => error.into(),
                    };
                    self.fail(error, &mut response);
                    break;
                }
            };

            debug!(
                "session {} [{}] <- {:?}",
                self.id,
                state,
                String::from_utf8_lossy(&frame)
            );
            if let Err(error) = self.handle_frame(&frame, &mut response.commands) {
                self.fail(error, &mut response);
                break;
            }
            if self.state() == SessionState::Closed {
                response.closure = Some(Closure::Completed);
                break;
            }
        }
        response
    }

    fn handle_frame(
        &mut self,
        frame: &[u8],
        commands: &mut Vec<ServerCommand>,
    ) -> Result<(), SessionError> {
        // Any error below leaves the stage closed.
        let stage = std::mem::replace(&mut self.stage, Stage::Closed);

        self.stage = match stage {
            Stage::AwaitUsername => {
                let username = decode_text(frame, USERNAME_FRAME_MAX)
                    .map_err(|error| SessionError::Username(error.to_string()))?;
                self.username = Some(String::from_utf8_lossy(username).into_owned());
                commands.push(ServerCommand::KeyRequest);
                Stage::AwaitKeyId(Handshake::new(username))
            }
            Stage::AwaitKeyId(mut handshake) => {
                let key_id = decode_bounded(frame, KEY_ID_MAX)?;
                let challenge = handshake.select_key(key_id)?;
                commands.push(ServerCommand::Confirmation(challenge));
                Stage::AwaitConfirmation(handshake)
            }
            Stage::AwaitConfirmation(handshake) => {
                let confirmation = decode_bounded(frame, CONFIRMATION_MAX)?;
                handshake.verify(confirmation)?;
                info!(
                    "session {}: robot {:?} logged in, hash {}",
                    self.id,
                    self.username().unwrap_or_default(),
                    handshake.hash()
                );
                commands.push(ServerCommand::Ok);
                commands.push(ServerCommand::Move);
                Stage::AwaitMoveAck(Navigator::new())
            }
            Stage::AwaitMoveAck(mut navigator) => {
                let report = decode_position(frame)?;
                match navigator.on_report(report)? {
                    Step::Command(command) => {
                        commands.push(command);
                        Stage::AwaitMoveAck(navigator)
                    }
                    Step::Arrived => {
                        info!(
                            "session {}: robot at origin after {} commands, {} detours",
                            self.id,
                            navigator.commands_issued() + 1,
                            navigator.detours_taken()
                        );
                        commands.push(ServerCommand::PickUp);
                        Stage::AwaitFinalMessage
                    }
                }
            }
            Stage::AwaitFinalMessage => {
                let secret = decode_text(frame, MESSAGE_FRAME_MAX)?;
                info!(
                    "session {}: secret message {:?}",
                    self.id,
                    String::from_utf8_lossy(secret)
                );
                self.secret = Some(secret.to_vec());
                commands.push(ServerCommand::Logout);
                Stage::Closed
            }
            Stage::Closed => Stage::Closed,
        };
        Ok(())
    }

    fn fail(&mut self, error: SessionError, response: &mut Response) {
        self.stage = Stage::Closed;
        if let Some(reply) = error.reply() {
            response.commands.push(reply);
        }
        response.closure = Some(Closure::Failed(error));
    }
}
