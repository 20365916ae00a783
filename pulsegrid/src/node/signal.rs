use super::*;

/// A travelling pulse of activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    direction: Direction,
    pub(crate) last_moved: Option<u64>,
}

impl Signal {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            last_moved: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn moved_at(&self, pulse: u64) -> bool {
        self.last_moved == Some(pulse)
    }
}
