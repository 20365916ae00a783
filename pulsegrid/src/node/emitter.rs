use super::*;

/// A stationary node that sounds a note when hit and re-emits signals
/// according to its [`Behavior`].
#[derive(Debug, Clone, PartialEq)]
pub struct Emitter {
    pub behavior: Behavior,
    /// Directions the behavior chooses from.
    pub directions: Direction,
    incoming: Direction,
    armed: bool,
    triggered: bool,
    /// Re-arm after every emission.
    pub retrig: bool,
    /// Still fires and emits, but sends nothing to the outputs.
    pub muted: bool,
    pub(crate) last_processed: Option<u64>,
    pub note: Note,
}

impl Emitter {
    pub fn new(behavior: Behavior, directions: Direction, defaults: &NoteDefaults) -> Self {
        Self {
            armed: behavior.armed_at_start(),
            behavior,
            directions,
            incoming: Direction::NONE,
            triggered: false,
            retrig: false,
            muted: false,
            last_processed: None,
            note: Note::new(defaults),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Travel direction of the signal that last armed this emitter.
    pub fn incoming(&self) -> Direction {
        self.incoming
    }

    pub fn arm(&mut self, incoming: Direction) {
        self.armed = true;
        self.incoming = incoming;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub(crate) fn processed_at(&self, pulse: u64) -> bool {
        self.last_processed == Some(pulse)
    }

    /// Fires an armed emitter: plays the note (unless muted) and leaves it
    /// due to emit. Returns false if it was not armed.
    pub fn trigger(&mut self, root: u8, scale: Scale, pulse: u64, bus: &Bus) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = false;
        if !self.muted {
            self.note.transpose_and_play(root, scale, bus);
        }
        self.triggered = true;
        self.last_processed = Some(pulse);
        true
    }

    /// Consumes the pending emission and returns the directions to fire.
    pub(crate) fn take_emission(&mut self, pulse: u64) -> Direction {
        self.triggered = false;
        self.last_processed = Some(pulse);
        let directions = self
            .behavior
            .emit_directions(self.directions, self.incoming, pulse);
        if self.retrig {
            self.armed = true;
        }
        directions
    }

    /// Back to the state it had when placed. Behavior state is kept.
    pub fn rewind(&mut self, bus: &Bus) {
        self.note.stop(bus);
        self.armed = self.behavior.armed_at_start();
        self.triggered = false;
        self.incoming = Direction::NONE;
        self.last_processed = None;
    }
}
