pub mod signal;
pub use signal::Signal;
pub mod emitter;
pub use emitter::Emitter;
pub mod hole;
pub use hole::Hole;

use crate::behavior::Behavior;
use crate::direction::Direction;
use crate::note::{Note, NoteDefaults};
use crate::output::Bus;
use crate::theory::Scale;

/// Pulses a hole stays lit after a teleport.
pub const HOLE_ACTIVE_PULSES: u8 = 4;

/// Colour class a front end should draw a cell with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    Signal,
    Idle,
    Armed,
    Sounding,
    Muted,
    Hole,
}

/// What a front end needs to draw one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    pub symbol: char,
    pub tint: Tint,
    pub active: bool,
}

/// Anything that can sit in a grid cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Signal(Signal),
    Emitter(Box<Emitter>),
    Hole(Hole),
}

impl Node {
    /// Per-pulse housekeeping: note lengths and hole activation windows.
    pub fn tick(&mut self, bus: &Bus) {
        match self {
            Node::Signal(_) => {}
            Node::Emitter(emitter) => emitter.note.tick(bus),
            Node::Hole(hole) => hole.tick(),
        }
    }

    /// Stops any sounding note.
    pub fn stop(&mut self, bus: &Bus) {
        if let Node::Emitter(emitter) = self {
            emitter.note.stop(bus);
        }
    }

    pub fn as_emitter(&self) -> Option<&Emitter> {
        match self {
            Node::Emitter(emitter) => Some(&**emitter),
            _ => None,
        }
    }

    pub fn as_emitter_mut(&mut self) -> Option<&mut Emitter> {
        match self {
            Node::Emitter(emitter) => Some(&mut **emitter),
            _ => None,
        }
    }

    pub fn as_hole(&self) -> Option<&Hole> {
        match self {
            Node::Hole(hole) => Some(hole),
            _ => None,
        }
    }

    pub fn as_hole_mut(&mut self) -> Option<&mut Hole> {
        match self {
            Node::Hole(hole) => Some(hole),
            _ => None,
        }
    }

    /// A copy fit for pasting elsewhere. Behavior state (cycle cursor, toll
    /// count) comes along; sounding notes and pulse stamps do not. Signals
    /// are transient and never copied.
    pub fn duplicate(&self) -> Option<Node> {
        match self {
            Node::Signal(_) => None,
            Node::Emitter(emitter) => {
                let mut copy = emitter.clone();
                copy.note.forget();
                copy.last_processed = None;
                Some(Node::Emitter(copy))
            }
            Node::Hole(hole) => {
                let mut copy = hole.clone();
                copy.deactivate();
                Some(Node::Hole(copy))
            }
        }
    }

    pub fn view(&self) -> CellView {
        match self {
            Node::Signal(signal) => CellView {
                symbol: signal.direction().symbol(),
                tint: Tint::Signal,
                active: true,
            },
            Node::Emitter(emitter) => {
                let tint = if emitter.muted {
                    Tint::Muted
                } else if emitter.note.is_playing() {
                    Tint::Sounding
                } else if emitter.is_armed() {
                    Tint::Armed
                } else {
                    Tint::Idle
                };
                CellView {
                    symbol: emitter.behavior.symbol(),
                    tint,
                    active: emitter.note.is_playing() || emitter.is_triggered(),
                }
            }
            Node::Hole(hole) => CellView {
                symbol: 'O',
                tint: Tint::Hole,
                active: hole.is_active(),
            },
        }
    }
}

impl From<Signal> for Node {
    fn from(signal: Signal) -> Self {
        Node::Signal(signal)
    }
}

impl From<Emitter> for Node {
    fn from(emitter: Emitter) -> Self {
        Node::Emitter(Box::new(emitter))
    }
}

impl From<Hole> for Node {
    fn from(hole: Hole) -> Self {
        Node::Hole(hole)
    }
}
