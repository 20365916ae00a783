//! Pulse-driven generative grid sequencer engine.
//!
//! A [`Grid`] of cells holds travelling signals and stationary emitters. A
//! [`Clock`] advances the grid one pulse at a time; every fourth pulse
//! signals move and emitters fire, sounding notes through the per-device
//! queues in [`output`].

pub mod behavior;
pub mod clock;
pub mod direction;
pub mod error;
pub mod grid;
pub mod node;
pub mod note;
pub mod output;
pub mod param;
pub mod sequencer;
pub mod theory;

pub use behavior::Behavior;
pub use clock::Clock;
pub use direction::Direction;
pub use error::{Error, Result};
pub use grid::{Grid, Selection};
pub use node::{CellView, Emitter, Hole, Node, Signal, Tint};
pub use note::{Note, NoteDefaults};
pub use output::{Bus, DeviceSink, Message, Outputs, OverflowPolicy};
pub use param::Param;
pub use sequencer::Sequencer;
pub use theory::Scale;
