//! Compass directions as a 4-bit mask.
//!
//! Grid coordinates grow rightwards (`x`) and downwards (`y`), so `UP` moves
//! towards row 0.

use bitflags::bitflags;

bitflags! {
    pub struct Direction: u8 {
        const UP = 0b0001;
        const RIGHT = 0b0010;
        const DOWN = 0b0100;
        const LEFT = 0b1000;
    }
}

impl Direction {
    pub const NONE: Direction = Direction::empty();

    /// Unit directions in decomposition order.
    pub const CARDINALS: [Direction; 4] = [
        Direction::UP,
        Direction::RIGHT,
        Direction::DOWN,
        Direction::LEFT,
    ];

    /// Splits the mask into its unit directions, in `UP, RIGHT, DOWN, LEFT` order.
    pub fn decompose(self) -> impl Iterator<Item = Direction> {
        Self::CARDINALS
            .iter()
            .copied()
            .filter(move |dir| self.contains(*dir))
    }

    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }

    pub fn is_unit(self) -> bool {
        self.count() == 1
    }

    /// Coordinate offset of the mask. Opposite directions cancel out.
    pub fn delta(self) -> (isize, isize) {
        self.decompose().fold((0, 0), |(dx, dy), dir| {
            let (ux, uy) = match dir {
                d if d == Direction::UP => (0, -1),
                d if d == Direction::RIGHT => (1, 0),
                d if d == Direction::DOWN => (0, 1),
                _ => (-1, 0),
            };
            (dx + ux, dy + uy)
        })
    }

    /// Unit direction pointing along an offset. Horizontal movement wins on
    /// diagonals.
    pub fn from_delta(dx: isize, dy: isize) -> Direction {
        if dx > 0 {
            Direction::RIGHT
        } else if dx < 0 {
            Direction::LEFT
        } else if dy > 0 {
            Direction::DOWN
        } else if dy < 0 {
            Direction::UP
        } else {
            Direction::NONE
        }
    }

    pub fn opposite(self) -> Direction {
        self.decompose()
            .map(|dir| match dir {
                d if d == Direction::UP => Direction::DOWN,
                d if d == Direction::RIGHT => Direction::LEFT,
                d if d == Direction::DOWN => Direction::UP,
                _ => Direction::RIGHT,
            })
            .fold(Direction::NONE, |acc, dir| acc | dir)
    }

    pub fn symbol(self) -> char {
        match self {
            d if d == Direction::UP => '^',
            d if d == Direction::RIGHT => '>',
            d if d == Direction::DOWN => 'v',
            d if d == Direction::LEFT => '<',
            d if d.is_empty() => '.',
            _ => '+',
        }
    }
}
