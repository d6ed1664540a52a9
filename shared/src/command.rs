use std::fmt;

use crate::TERMINATOR;

/// Everything the server can say to the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Move,
    TurnLeft,
    TurnRight,
    PickUp,
    Logout,
    KeyRequest,
    /// Reply to the key id: username hash plus the server key.
    Confirmation(u16),
    Ok,
    LoginFailed,
    SyntaxError,
    LogicError,
    KeyOutOfRange,
}

impl ServerCommand {
    const FIXED: [ServerCommand; 11] = [
        ServerCommand::Move,
        ServerCommand::TurnLeft,
        ServerCommand::TurnRight,
        ServerCommand::PickUp,
        ServerCommand::Logout,
        ServerCommand::KeyRequest,
        ServerCommand::Ok,
        ServerCommand::LoginFailed,
        ServerCommand::SyntaxError,
        ServerCommand::LogicError,
        ServerCommand::KeyOutOfRange,
    ];

    fn fixed_text(&self) -> Option<&'static str> {
        let text = match self {
            ServerCommand::Move => "102 MOVE",
            ServerCommand::TurnLeft => "103 TURN LEFT",
            ServerCommand::TurnRight => "104 TURN RIGHT",
            ServerCommand::PickUp => "105 GET MESSAGE",
            ServerCommand::Logout => "106 LOGOUT",
            ServerCommand::KeyRequest => "107 KEY REQUEST",
            ServerCommand::Ok => "200 OK",
            ServerCommand::LoginFailed => "300 LOGIN FAILED",
            ServerCommand::SyntaxError => "301 SYNTAX ERROR",
            ServerCommand::LogicError => "302 LOGIC ERROR",
            ServerCommand::KeyOutOfRange => "303 KEY OUT OF RANGE",
            ServerCommand::Confirmation(_) => return None,
        };
        Some(text)
    }

    /// Wire bytes of the command, terminator included.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.to_string().into_bytes();
        bytes.extend_from_slice(&TERMINATOR);
        bytes
    }

    /// Interprets a frame received from the server. Any all-digit payload
    /// that fits a `u16` is a confirmation value.
    pub fn decode(frame: &[u8]) -> Option<ServerCommand> {
        if let Some(command) = Self::FIXED
            .iter()
            .find(|command| command.fixed_text().map(str::as_bytes) == Some(frame))
        {
            return Some(*command);
        }
        if frame.is_empty() || !frame.iter().all(u8::is_ascii_digit) {
            return None;
        }
        std::str::from_utf8(frame)
            .ok()?
            .parse()
            .ok()
            .map(ServerCommand::Confirmation)
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ServerCommand::LoginFailed
                | ServerCommand::SyntaxError
                | ServerCommand::LogicError
                | ServerCommand::KeyOutOfRange
        )
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerCommand::Confirmation(value) => write!(f, "{}", value),
            other => f.write_str(other.fixed_text().unwrap_or_default()),
        }
    }
}
