//! Pure step function for rotation traversal. The scheduler feeds it the freshly resolved
//! member indices on every tick.

use shared::domain::{RotationGroup, RotationMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    fn step(self, position: usize) -> Option<usize> {
        match self {
            Direction::Forward => position.checked_add(1),
            Direction::Backward => position.checked_sub(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalRules {
    pub mode: RotationMode,
    pub repeat: bool,
}

impl From<&RotationGroup> for TraversalRules {
    fn from(group: &RotationGroup) -> Self {
        Self {
            mode: group.mode,
            repeat: group.repeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    /// Show `index` next and keep rotating in `direction`.
    Advance { index: usize, direction: Direction },
    /// Next index equals the current one; keep running without writing.
    Hold { direction: Direction },
    /// Boundary reached without repeat.
    Stop,
}

/// Computes the next step. `current` not being a member counts as position 0.
pub fn plan_tick(
    rules: TraversalRules,
    indices: &[usize],
    current: usize,
    direction: Direction,
) -> TickPlan {
    if indices.is_empty() {
        return TickPlan::Stop;
    }
    let last = indices.len() - 1;
    let position = indices
        .iter()
        .position(|index| *index == current)
        .unwrap_or(0);

    let (next_position, direction) = match rules.mode {
        RotationMode::Loop => match Direction::Forward.step(position).filter(|p| *p <= last) {
            Some(next) => (next, direction),
            None if rules.repeat => (0, direction),
            None => return TickPlan::Stop,
        },
        RotationMode::PingPong => match direction.step(position).filter(|p| *p <= last) {
            Some(next) => (next, direction),
            None if !rules.repeat => return TickPlan::Stop,
            // A single member has nowhere to bounce to; keep the direction steady.
            None if last == 0 => (0, direction),
            None => {
                let flipped = direction.flipped();
                let bounced = flipped.step(position).unwrap_or(0).min(last);
                (bounced, flipped)
            }
        },
    };

    let index = indices[next_position];
    if index == current {
        TickPlan::Hold { direction }
    } else {
        TickPlan::Advance { index, direction }
    }
}

#[cfg(test)]
#[path = "tests/traversal_tests.rs"]
mod tests;
