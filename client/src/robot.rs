//! Grid robot simulator.
//!
//! The robot only knows how to move one cell forward and turn in place.
//! A move into an obstacle cell silently does nothing, which is exactly
//! what the server has to detect from the unchanged position report.

use rand::Rng;
use shared::{Heading, Position, ServerCommand};
use std::collections::HashSet;

/// Largest coordinate magnitude `random` will use. Reports must fit the
/// 12 byte position frame, which two-digit coordinates always do.
pub const MAX_RANGE: i32 = 90;

/// Obstacles are kept at least this far apart (Chebyshev distance), so a
/// detour around one never runs into another.
const OBSTACLE_SPACING: i32 = 3;

#[derive(Debug, Clone)]
pub struct SimulatedRobot {
    position: Position,
    heading: Heading,
    obstacles: HashSet<Position>,
    commands_executed: usize,
    bumps: usize,
}

impl SimulatedRobot {
    pub fn new(position: Position, heading: Heading) -> Self {
        Self {
            position,
            heading,
            obstacles: HashSet::new(),
            commands_executed: 0,
            bumps: 0,
        }
    }

    pub fn with_obstacles(mut self, obstacles: impl IntoIterator<Item = Position>) -> Self {
        self.obstacles.extend(obstacles);
        self
    }

    /// Places the robot and up to `obstacles` isolated obstacle cells inside
    /// `-range..=range` on both axes. Neither the origin nor the start cell
    /// is ever blocked.
    pub fn random<R: Rng>(rng: &mut R, range: i32, obstacles: usize) -> Self {
        let range = range.clamp(1, MAX_RANGE);
        let cell = |rng: &mut R| {
            Position::new(rng.gen_range(-range..=range), rng.gen_range(-range..=range))
        };

        let mut start = cell(rng);
        while start.is_origin() {
            start = cell(rng);
        }
        let heading = Heading::ALL[rng.gen_range(0..Heading::ALL.len())];

        let mut placed: Vec<Position> = Vec::new();
        for _ in 0..obstacles * 20 {
            if placed.len() == obstacles {
                break;
            }
            let candidate = cell(rng);
            let isolated = placed.iter().all(|other| {
                (other.x - candidate.x).abs().max((other.y - candidate.y).abs()) >= OBSTACLE_SPACING
            });
            if isolated && !candidate.is_origin() && candidate != start {
                placed.push(candidate);
            }
        }

        Self::new(start, heading).with_obstacles(placed)
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn obstacles(&self) -> &HashSet<Position> {
        &self.obstacles
    }

    pub fn commands_executed(&self) -> usize {
        self.commands_executed
    }

    /// Moves that hit an obstacle.
    pub fn bumps(&self) -> usize {
        self.bumps
    }

    /// Executes a motion command and returns the position to report.
    /// Returns None for commands that are not motions.
    pub fn execute(&mut self, command: ServerCommand) -> Option<Position> {
        match command {
            ServerCommand::Move => {
                let next = self.position.stepped(self.heading);
                if self.obstacles.contains(&next) {
                    self.bumps += 1;
                } else {
                    self.position = next;
                }
            }
            ServerCommand::TurnLeft => self.heading = self.heading.turned_left(),
            ServerCommand::TurnRight => self.heading = self.heading.turned_right(),
            _ => return None,
        }
        self.commands_executed += 1;
        Some(self.position)
    }
}
