//! Patch loaded when `play` is given no bank.

use crate::error::*;
use pulsegrid::behavior::{Cycle, Euclid, Toll};
use pulsegrid::{Behavior, Direction, Grid};

pub const MIN_WIDTH: usize = 11;
pub const MIN_HEIGHT: usize = 7;

/// Lays a small patch over `grid`: a silent Euclidean pulse on the left edge
/// feeding a cycle that spreads out into the rest. Keys are picked from A
/// minor pentatonic; the grid's root and scale are left alone.
pub fn build(grid: &mut Grid) -> Result<()> {
    if grid.width() < MIN_WIDTH || grid.height() < MIN_HEIGHT {
        return Err(CliError::DemoTooSmall(
            grid.width() as u16,
            grid.height() as u16,
        ));
    }

    if let Some(pulse) = grid.add_emitter(0, 3, Behavior::Euclid(Euclid::new(8, 3, 0)), Direction::RIGHT) {
        pulse.note.key.silent = true;
        pulse.retrig = true;
        pulse.arm(Direction::NONE);
    }

    let emitters = [
        (
            4,
            3,
            Behavior::Cycle(Cycle::default()),
            Direction::UP | Direction::RIGHT | Direction::DOWN,
            57,
        ),
        (4, 1, Behavior::Spread, Direction::LEFT | Direction::RIGHT, 64),
        (9, 1, Behavior::Dice, Direction::DOWN | Direction::RIGHT, 69),
        (8, 3, Behavior::Spread, Direction::DOWN, 60),
        (4, 5, Behavior::Toll(Toll::new(2)), Direction::RIGHT, 52),
        (8, 6, Behavior::Pass, Direction::NONE, 72),
    ];
    for (x, y, behavior, directions, key) in emitters.iter().cloned() {
        if let Some(emitter) = grid.add_emitter(x, y, behavior, directions) {
            emitter.note.key.set(key);
        }
    }
    if let Some(dice) = grid.emitter_mut(9, 1) {
        dice.note.key.set_random_amount(2);
        dice.note.set_probability(75);
    }

    grid.add_hole(10, 5, (1, 6));
    Ok(())
}
