//! Emitter behaviors: strategies that pick which directions an emitter
//! fires into.

use crate::clock::PULSES_PER_STEP;
use crate::direction::Direction;
use crate::param::Param;
use rand::Rng;

pub const MAX_TOLL_THRESHOLD: u8 = 64;
pub const MAX_EUCLID_STEPS: u8 = 64;

/// Round-robin over the configured directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cycle {
    cursor: usize,
}

impl Cycle {
    pub fn with_cursor(cursor: usize) -> Self {
        Self { cursor }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn select(&mut self, mask: Direction) -> Direction {
        let count = mask.count();
        if count == 0 {
            return Direction::NONE;
        }
        let index = self.cursor % count;
        self.cursor = (index + 1) % count;
        mask.decompose().nth(index).unwrap_or(Direction::NONE)
    }
}

/// Swallows signals until a threshold is reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Toll {
    pub threshold: Param<u8>,
    count: u8,
}

impl Default for Toll {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Toll {
    pub fn new(threshold: u8) -> Self {
        let mut threshold = Param::new(threshold, 1, MAX_TOLL_THRESHOLD);
        threshold.computed();
        Self {
            threshold,
            count: 0,
        }
    }

    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    fn select(&mut self, mask: Direction) -> Direction {
        self.count = self.count.saturating_add(1);
        if self.count < self.threshold.last() {
            return Direction::NONE;
        }
        self.count = 0;
        self.threshold.computed();
        mask
    }
}

/// Gates emission with a Euclidean rhythm laid over the global step count.
#[derive(Debug, Clone, PartialEq)]
pub struct Euclid {
    pub steps: Param<u8>,
    pub triggers: Param<u8>,
    pub offset: Param<u8>,
}

impl Default for Euclid {
    fn default() -> Self {
        Self::new(8, 3, 0)
    }
}

impl Euclid {
    pub fn new(steps: u8, triggers: u8, offset: u8) -> Self {
        Self {
            steps: Param::new(steps, 1, MAX_EUCLID_STEPS),
            triggers: Param::new(triggers, 0, MAX_EUCLID_STEPS),
            offset: Param::new(offset, 0, MAX_EUCLID_STEPS - 1),
        }
    }

    /// Whether position `index` of a `steps`-long pattern holds an onset.
    pub fn is_onset(steps: u8, triggers: u8, index: u64) -> bool {
        if steps == 0 {
            return false;
        }
        let steps = u64::from(steps);
        let triggers = u64::from(triggers).min(steps);
        (index % steps) * triggers % steps < triggers
    }

    fn select(&mut self, mask: Direction, pulse: u64) -> Direction {
        let steps = self.steps.computed();
        let triggers = self.triggers.computed();
        let offset = u64::from(self.offset.computed());
        let index = pulse / PULSES_PER_STEP + offset;
        if Self::is_onset(steps, triggers, index) {
            mask
        } else {
            Direction::NONE
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    /// Fires its whole mask. Armed when placed.
    Bang,
    /// Fires its whole mask when hit.
    Spread,
    /// Forwards the signal in the direction it was travelling.
    Pass,
    Cycle(Cycle),
    /// One random direction of the mask.
    Dice,
    Toll(Toll),
    Euclid(Euclid),
    /// Never emits; activating it floods its neighbourhood instead.
    Zone,
}

impl Behavior {
    pub const NAMES: [&'static str; 8] = [
        "bang", "spread", "pass", "cycle", "dice", "toll", "euclid", "zone",
    ];

    pub fn from_name(name: &str) -> Option<Behavior> {
        Some(match name {
            "bang" => Behavior::Bang,
            "spread" => Behavior::Spread,
            "pass" => Behavior::Pass,
            "cycle" => Behavior::Cycle(Cycle::default()),
            "dice" => Behavior::Dice,
            "toll" => Behavior::Toll(Toll::default()),
            "euclid" => Behavior::Euclid(Euclid::default()),
            "zone" => Behavior::Zone,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Behavior::Bang => "bang",
            Behavior::Spread => "spread",
            Behavior::Pass => "pass",
            Behavior::Cycle(_) => "cycle",
            Behavior::Dice => "dice",
            Behavior::Toll(_) => "toll",
            Behavior::Euclid(_) => "euclid",
            Behavior::Zone => "zone",
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Behavior::Bang => 'B',
            Behavior::Spread => 'S',
            Behavior::Pass => 'P',
            Behavior::Cycle(_) => 'C',
            Behavior::Dice => 'D',
            Behavior::Toll(_) => 'T',
            Behavior::Euclid(_) => 'E',
            Behavior::Zone => 'Z',
        }
    }

    pub fn armed_at_start(&self) -> bool {
        matches!(self, Behavior::Bang)
    }

    pub fn is_zone(&self) -> bool {
        matches!(self, Behavior::Zone)
    }

    /// Picks the directions to emit into.
    pub fn emit_directions(&mut self, mask: Direction, incoming: Direction, pulse: u64) -> Direction {
        match self {
            Behavior::Bang | Behavior::Spread => mask,
            Behavior::Pass => incoming,
            Behavior::Cycle(cycle) => cycle.select(mask),
            Behavior::Dice => {
                let count = mask.count();
                if count == 0 {
                    return Direction::NONE;
                }
                let pick = rand::rng().random_range(0..count);
                mask.decompose().nth(pick).unwrap_or(Direction::NONE)
            }
            Behavior::Toll(toll) => toll.select(mask),
            Behavior::Euclid(euclid) => euclid.select(mask, pulse),
            Behavior::Zone => Direction::NONE,
        }
    }
}
