use super::*;
use crate::param::Param;

/// Teleport endpoint. Whatever reaches it is handed to the cell its
/// destination parameters resolve to.
#[derive(Debug, Clone, PartialEq)]
pub struct Hole {
    origin: (usize, usize),
    pub dest_x: Param<i32>,
    pub dest_y: Param<i32>,
    countdown: u8,
}

impl Hole {
    /// Destinations are clamped to a `width` x `height` grid.
    pub fn new(origin: (usize, usize), dest: (i32, i32), width: usize, height: usize) -> Self {
        let max_x = width.saturating_sub(1) as i32;
        let max_y = height.saturating_sub(1) as i32;
        Self {
            origin,
            dest_x: Param::new(dest.0, 0, max_x),
            dest_y: Param::new(dest.1, 0, max_y),
            countdown: 0,
        }
    }

    pub fn origin(&self) -> (usize, usize) {
        self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: (usize, usize)) {
        self.origin = origin;
    }

    /// Draws a destination, jitter included.
    pub fn destination(&mut self) -> (i32, i32) {
        (self.dest_x.computed(), self.dest_y.computed())
    }

    pub fn is_active(&self) -> bool {
        self.countdown > 0
    }

    pub(crate) fn activate(&mut self) {
        self.countdown = HOLE_ACTIVE_PULSES;
    }

    pub(crate) fn deactivate(&mut self) {
        self.countdown = 0;
    }

    pub fn tick(&mut self) {
        self.countdown = self.countdown.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_is_clamped_to_grid() {
        let mut hole = Hole::new((1, 1), (40, -3), 8, 6);
        assert_eq!(hole.destination(), (7, 0));
    }

    #[test]
    fn activation_lasts_one_step() {
        let mut hole = Hole::new((0, 0), (3, 3), 8, 8);
        hole.activate();
        for _ in 1..HOLE_ACTIVE_PULSES {
            hole.tick();
            assert!(hole.is_active());
        }
        hole.tick();
        assert!(!hole.is_active());
    }
}
