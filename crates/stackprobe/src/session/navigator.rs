//! Frame cursor movement.
//!
//! "Up" walks towards older frames (lower index), "down" towards newer
//! ones. When the session hides external frames, a move skips to the
//! nearest eligible frame in the requested direction. A move that finds no
//! eligible frame fails with [`NavigationError::AtBoundary`] and leaves the
//! cursor where it was.

use super::Session;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Up, Direction::Down];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    fn boundary(self) -> &'static str {
        match self {
            Direction::Up => "oldest",
            Direction::Down => "newest",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown direction `{other}`")),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Already at {} frame. Cannot move {direction}.", .direction.boundary())]
    AtBoundary { direction: Direction },
    #[error("Frame {index} is outside the stack (depth {depth}).")]
    OutOfRange { index: usize, depth: usize },
}

/// Nearest eligible frame strictly past the cursor in `direction`.
pub fn next_eligible(session: &Session, direction: Direction) -> Option<usize> {
    let cursor = session.current_index();
    match direction {
        Direction::Up => (0..cursor).rev().find(|&i| session.is_eligible(i)),
        Direction::Down => (cursor + 1..session.depth()).find(|&i| session.is_eligible(i)),
    }
}

/// Move the cursor one eligible frame in `direction`, returning the new index.
pub fn move_frame(session: &mut Session, direction: Direction) -> Result<usize, NavigationError> {
    match next_eligible(session, direction) {
        Some(index) => session.select(index),
        None => Err(NavigationError::AtBoundary { direction }),
    }
}

/// Directions in which [`move_frame`] would currently succeed.
pub fn legal_directions(session: &Session) -> Vec<Direction> {
    Direction::ALL
        .into_iter()
        .filter(|&d| next_eligible(session, d).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{FakeDebugger, session};

    #[test]
    fn four_frame_walk_to_the_top() {
        let mut session = session(4, 1);
        assert_eq!(move_frame(&mut session, Direction::Up), Ok(0));
        assert_eq!(
            move_frame(&mut session, Direction::Up),
            Err(NavigationError::AtBoundary {
                direction: Direction::Up
            })
        );
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn boundary_messages() {
        let up = NavigationError::AtBoundary {
            direction: Direction::Up,
        };
        let down = NavigationError::AtBoundary {
            direction: Direction::Down,
        };
        assert_eq!(up.to_string(), "Already at oldest frame. Cannot move up.");
        assert_eq!(down.to_string(), "Already at newest frame. Cannot move down.");
    }

    #[test]
    fn skips_external_frames() {
        let debugger = FakeDebugger {
            external: [1, 2].into_iter().collect(),
            ..FakeDebugger::with_depth(4)
        };
        let mut session = Session::new(Box::new(debugger), true);
        assert_eq!(move_frame(&mut session, Direction::Up), Ok(0));
        assert_eq!(move_frame(&mut session, Direction::Down), Ok(3));
    }

    #[test]
    fn external_frames_visible_when_policy_off() {
        let debugger = FakeDebugger {
            external: [2].into_iter().collect(),
            ..FakeDebugger::with_depth(4)
        };
        let mut session = Session::new(Box::new(debugger), false);
        assert_eq!(move_frame(&mut session, Direction::Up), Ok(2));
    }

    #[test]
    fn boundary_when_only_external_frames_remain() {
        let debugger = FakeDebugger {
            external: [0, 1].into_iter().collect(),
            ..FakeDebugger::with_depth(3)
        };
        let mut session = Session::new(Box::new(debugger), true);
        assert!(matches!(
            move_frame(&mut session, Direction::Up),
            Err(NavigationError::AtBoundary { .. })
        ));
        assert_eq!(session.current_index(), 2);
        assert!(legal_directions(&session).is_empty());
    }

    #[test]
    fn legal_directions_in_the_middle() {
        let session = session(3, 1);
        assert_eq!(legal_directions(&session), vec![Direction::Up, Direction::Down]);
    }

    #[test]
    fn cursor_stays_in_range_over_random_walk() {
        let mut session = session(5, 2);
        let walk = "uuuduuddddddduudud";
        for step in walk.chars() {
            let direction = if step == 'u' { Direction::Up } else { Direction::Down };
            let before = session.current_index();
            match move_frame(&mut session, direction) {
                Ok(index) => assert_eq!(index, session.current_index()),
                Err(_) => assert_eq!(before, session.current_index()),
            }
            assert!(session.current_index() < 5);
        }
    }

    #[test]
    fn direction_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Up).unwrap(), "\"up\"");
        let d: Direction = serde_json::from_str("\"down\"").unwrap();
        assert_eq!(d, Direction::Down);
    }
}
