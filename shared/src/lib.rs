//! Wire vocabulary shared by the robot server and the simulated robot.
//!
//! Every message on the link, in both directions, is a short ASCII payload
//! followed by the two-byte terminator [`TERMINATOR`]. This crate owns the
//! pieces both ends need to agree on: frame reassembly, the client message
//! grammar, the server command set, the authentication key table and the
//! grid types the robot moves on.

pub mod auth;
pub mod command;
pub mod frame;
pub mod message;

use std::fmt;

pub use auth::{auth_key, username_hash, AuthKey, AUTH_KEYS};
pub use command::ServerCommand;
pub use frame::{FrameAssembler, FrameError};
pub use message::{ClientMessage, DecodeError};

/// Every frame on the wire ends with BEL, BS.
pub const TERMINATOR: [u8; 2] = [0x07, 0x08];

pub const DEFAULT_PORT: u16 = 5555;

// Frame budgets count the payload plus the terminator.
pub const USERNAME_FRAME_MAX: usize = 20;
// Numeric budgets leave room for zero padding; the value range is checked
// by the decoder.
pub const KEY_ID_FRAME_MAX: usize = 12;
pub const CONFIRMATION_FRAME_MAX: usize = 12;
pub const POSITION_FRAME_MAX: usize = 12;
pub const MESSAGE_FRAME_MAX: usize = 100;

/// Largest key id the decoder accepts before the table range check.
pub const KEY_ID_MAX: u32 = 999;
pub const CONFIRMATION_MAX: u32 = 65535;

/// A cell on the robot's grid. `y` grows upwards, `x` grows to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_origin(&self) -> bool {
        *self == Self::ORIGIN
    }

    /// The neighbouring cell one step along `heading`.
    pub fn stepped(&self, heading: Heading) -> Position {
        let (dx, dy) = heading.delta();
        Position::new(self.x + dx, self.y + dy)
    }

    pub fn manhattan_distance(&self) -> u32 {
        self.x.unsigned_abs() + self.y.unsigned_abs()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Facing direction of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heading {
    Up,
    Right,
    Down,
    Left,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::Up, Heading::Right, Heading::Down, Heading::Left];

    /// Heading after a 90 degree counter-clockwise turn.
    pub fn turned_left(self) -> Heading {
        match self {
            Heading::Up => Heading::Left,
            Heading::Left => Heading::Down,
            Heading::Down => Heading::Right,
            Heading::Right => Heading::Up,
        }
    }

    /// Heading after a 90 degree clockwise turn.
    pub fn turned_right(self) -> Heading {
        match self {
            Heading::Up => Heading::Right,
            Heading::Right => Heading::Down,
            Heading::Down => Heading::Left,
            Heading::Left => Heading::Up,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Heading::Up => (0, 1),
            Heading::Right => (1, 0),
            Heading::Down => (0, -1),
            Heading::Left => (-1, 0),
        }
    }

    /// Infers the heading of a straight move from `from` to `to`.
    ///
    /// A shared `x` means the move was vertical, a shared `y` horizontal.
    /// Returns `None` when the cells are equal or differ on both axes.
    pub fn between(from: Position, to: Position) -> Option<Heading> {
        if from == to {
            return None;
        }
        if from.x == to.x {
            Some(if to.y > from.y { Heading::Up } else { Heading::Down })
        } else if from.y == to.y {
            Some(if to.x > from.x { Heading::Right } else { Heading::Left })
        } else {
            None
        }
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Heading::Up => "up",
            Heading::Right => "right",
            Heading::Down => "down",
            Heading::Left => "left",
        };
        f.write_str(name)
    }
}
