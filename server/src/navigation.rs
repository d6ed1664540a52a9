//! Dead-reckoning navigation towards the origin.
//!
//! The robot never tells us which way it faces. The navigator learns its
//! position from the first report, its heading from the delta after one
//! successful move, and from then on keeps a believed heading that it
//! updates itself whenever it issues a turn. Every command is answered by a
//! position report, so a move that leaves the position unchanged means the
//! cell ahead is blocked and a fixed eight-command detour is run around it.
//!
//! Controller phases:
//! - `LocatingPosition`: nothing known yet, the first report gives the position
//! - `DiscoveringHeading`: waiting for a move that actually changes the position
//! - `Navigating`: position and heading known, steering one command at a time
//! - `Bypassing`: replaying a detour, obstacle detection is suspended

use log::debug;
use shared::{Heading, Position, ServerCommand};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("robot cannot get from {from} to {to} in one move")]
    InconsistentReport { from: Position, to: Position },
    #[error("no steering rule at {position} heading {heading}")]
    NoSteeringRule { position: Position, heading: Heading },
}

/// Number of commands in a detour.
pub const DETOUR_LEN: usize = 8;

const DETOUR_LEFT: [ServerCommand; DETOUR_LEN] = [
    ServerCommand::TurnLeft,
    ServerCommand::Move,
    ServerCommand::TurnRight,
    ServerCommand::Move,
    ServerCommand::Move,
    ServerCommand::TurnRight,
    ServerCommand::Move,
    ServerCommand::TurnLeft,
];

const DETOUR_RIGHT: [ServerCommand; DETOUR_LEN] = [
    ServerCommand::TurnRight,
    ServerCommand::Move,
    ServerCommand::TurnLeft,
    ServerCommand::Move,
    ServerCommand::Move,
    ServerCommand::TurnLeft,
    ServerCommand::Move,
    ServerCommand::TurnRight,
];

/// Side on which a detour passes the blocked cell.
///
/// Either detour ends two cells ahead of where it started, facing the
/// original heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detour {
    Left,
    Right,
}

impl Detour {
    pub fn commands(self) -> &'static [ServerCommand; DETOUR_LEN] {
        match self {
            Detour::Left => &DETOUR_LEFT,
            Detour::Right => &DETOUR_RIGHT,
        }
    }

    /// Picks the side facing the origin's axis so the detour does not
    /// drift away from the target.
    pub fn choose(position: Position, heading: Heading) -> Detour {
        match heading {
            Heading::Right if position.y > 0 => Detour::Right,
            Heading::Right => Detour::Left,
            Heading::Left if position.y > 0 => Detour::Left,
            Heading::Left => Detour::Right,
            Heading::Up if position.x > 0 => Detour::Left,
            Heading::Up => Detour::Right,
            Heading::Down if position.x > 0 => Detour::Right,
            Heading::Down => Detour::Left,
        }
    }
}

/// Steering policy: the next command that brings the robot closer to the
/// origin, given where it is and which way it faces.
///
/// On an axis the only acceptable heading points at the origin. Inside a
/// quadrant both headings that shrink one coordinate are acceptable and the
/// robot keeps going while it faces one of them. Otherwise it turns left if
/// that lands on an acceptable heading and right in every other case, which
/// includes facing directly away from the origin on an axis.
///
/// Returns `None` only at the origin itself.
pub fn next_step(position: Position, heading: Heading) -> Option<ServerCommand> {
    let acceptable: &[Heading] = match (position.x.signum(), position.y.signum()) {
        (0, 0) => return None,
        (0, 1) => &[Heading::Down],
        (0, _) => &[Heading::Up],
        (1, 0) => &[Heading::Left],
        (_, 0) => &[Heading::Right],
        (1, 1) => &[Heading::Left, Heading::Down],
        (1, _) => &[Heading::Left, Heading::Up],
        (_, 1) => &[Heading::Right, Heading::Down],
        (_, _) => &[Heading::Right, Heading::Up],
    };

    let command = if acceptable.contains(&heading) {
        ServerCommand::Move
    } else if acceptable.contains(&heading.turned_left()) {
        ServerCommand::TurnLeft
    } else {
        ServerCommand::TurnRight
    };
    Some(command)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    LocatingPosition,
    DiscoveringHeading {
        last: Position,
        turned: bool,
    },
    Navigating {
        position: Position,
        heading: Heading,
        /// The last command sent was a move
        moved: bool,
    },
    Bypassing {
        position: Position,
        heading: Heading,
        detour: Detour,
        next: usize,
    },
}

/// What the session should do after a position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Command(ServerCommand),
    Arrived,
}

/// Per-connection navigation state.
#[derive(Debug)]
pub struct Navigator {
    phase: Phase,
    commands_issued: usize,
    detours_taken: usize,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    /// Starts with nothing known. The caller is expected to have sent the
    /// first move already; its report is the first input.
    pub fn new() -> Self {
        Self {
            phase: Phase::LocatingPosition,
            commands_issued: 0,
            detours_taken: 0,
        }
    }

    /// Handles one position report and decides the next command.
    pub fn on_report(&mut self, report: Position) -> Result<Step, NavigationError> {
        if report.is_origin() {
            return Ok(Step::Arrived);
        }

        let (command, phase) = match self.phase {
            Phase::LocatingPosition => (
                ServerCommand::Move,
                Phase::DiscoveringHeading {
                    last: report,
                    turned: false,
                },
            ),
            Phase::DiscoveringHeading { last, turned } if report == last => {
                // Stalled: turn right once, then only move.
                let command = if turned {
                    ServerCommand::Move
                } else {
                    ServerCommand::TurnRight
                };
                (command, Phase::DiscoveringHeading { last, turned: true })
            }
            Phase::DiscoveringHeading { last, .. } => {
                let heading = Heading::between(last, report).ok_or(
                    NavigationError::InconsistentReport {
                        from: last,
                        to: report,
                    },
                )?;
                debug!("heading discovered: {} at {}", heading, report);
                steer(report, heading)?
            }
            Phase::Navigating {
                position,
                heading,
                moved: true,
            } if report == position => {
                let detour = Detour::choose(report, heading);
                debug!("blocked at {} heading {}, detour {:?}", report, heading, detour);
                self.detours_taken += 1;
                advance_detour(report, heading, detour, 0)
            }
            Phase::Navigating { heading, .. } => steer(report, heading)?,
            Phase::Bypassing {
                heading,
                detour,
                next,
                ..
            } => advance_detour(report, heading, detour, next),
        };

        self.phase = phase;
        self.commands_issued += 1;
        Ok(Step::Command(command))
    }

    /// Believed position, once known.
    pub fn position(&self) -> Option<Position> {
        match self.phase {
            Phase::LocatingPosition => None,
            Phase::DiscoveringHeading { last, .. } => Some(last),
            Phase::Navigating { position, .. } | Phase::Bypassing { position, .. } => {
                Some(position)
            }
        }
    }

    /// Believed heading, once discovered.
    pub fn heading(&self) -> Option<Heading> {
        match self.phase {
            Phase::Navigating { heading, .. } | Phase::Bypassing { heading, .. } => Some(heading),
            _ => None,
        }
    }

    pub fn is_bypassing(&self) -> bool {
        matches!(self.phase, Phase::Bypassing { .. })
    }

    pub fn commands_issued(&self) -> usize {
        self.commands_issued
    }

    pub fn detours_taken(&self) -> usize {
        self.detours_taken
    }
}

fn steer(position: Position, heading: Heading) -> Result<(ServerCommand, Phase), NavigationError> {
    let command =
        next_step(position, heading).ok_or(NavigationError::NoSteeringRule { position, heading })?;
    let heading = match command {
        ServerCommand::TurnLeft => heading.turned_left(),
        ServerCommand::TurnRight => heading.turned_right(),
        _ => heading,
    };
    let phase = Phase::Navigating {
        position,
        heading,
        moved: command == ServerCommand::Move,
    };
    Ok((command, phase))
}

fn advance_detour(
    position: Position,
    heading: Heading,
    detour: Detour,
    index: usize,
) -> (ServerCommand, Phase) {
    let command = detour.commands()[index];
    let next = index + 1;
    let phase = if next == DETOUR_LEN {
        Phase::Navigating {
            position,
            heading,
            moved: false,
        }
    } else {
        Phase::Bypassing {
            position,
            heading,
            detour,
            next,
        }
    };
    (command, phase)
}
