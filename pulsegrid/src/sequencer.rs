//! Transport: wires the clock to the grid and the outputs.

use crate::clock::{Clock, PULSES_PER_STEP, STEPS_PER_QUARTER_NOTE};
use crate::error::*;
use crate::grid::Grid;
use crate::output::{Bus, Message};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

const MIDI_CLOCKS_PER_QUARTER: u64 = 24;

/// MIDI clock bytes due while pulse `pulse` runs, keeping 24 per quarter
/// note over the grid's 16 pulses per quarter.
fn midi_clocks_at(pulse: u64) -> u64 {
    let pulses_per_quarter = PULSES_PER_STEP * STEPS_PER_QUARTER_NOTE;
    (pulse + 1) * MIDI_CLOCKS_PER_QUARTER / pulses_per_quarter
        - pulse * MIDI_CLOCKS_PER_QUARTER / pulses_per_quarter
}

fn lock(grid: &Mutex<Grid>) -> MutexGuard<'_, Grid> {
    grid.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Sequencer {
    grid: Arc<Mutex<Grid>>,
    playing: Arc<AtomicBool>,
    clock: Clock,
    bus: Bus,
}

impl Sequencer {
    /// Starts the clock, paused. Fails if the grid's bus has no device.
    pub fn new(grid: Grid, tempo: u16) -> Result<Sequencer> {
        let bus = grid.bus().clone();
        if bus.is_empty() {
            return Err(Error::NoOutputDevice);
        }

        let grid = Arc::new(Mutex::new(grid));
        let playing = Arc::new(AtomicBool::new(false));

        let clock = {
            let grid = grid.clone();
            let playing = playing.clone();
            let bus = bus.clone();
            Clock::start(tempo, move || {
                let mut grid = lock(&grid);
                if !playing.load(Ordering::Acquire) {
                    return;
                }
                for _ in 0..midi_clocks_at(grid.pulse()) {
                    bus.send(Message::Clock);
                }
                grid.update();
            })?
        };
        info!(tempo = clock.tempo(), devices = ?bus.device_names(), "sequencer ready");

        Ok(Sequencer {
            grid,
            playing,
            clock,
            bus,
        })
    }

    pub fn play(&self) {
        let _grid = lock(&self.grid);
        if !self.playing.swap(true, Ordering::AcqRel) {
            self.bus.send(Message::TransportStart);
            info!("playing");
        }
    }

    /// Stops advancing and silences every sounding note.
    pub fn pause(&self) {
        let mut grid = lock(&self.grid);
        if self.playing.swap(false, Ordering::AcqRel) {
            grid.silence();
            self.bus.send(Message::TransportStop);
            info!(pulse = grid.pulse(), "paused");
        }
    }

    pub fn toggle(&self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Requests a tempo change; out-of-range values are ignored.
    pub fn set_tempo(&self, bpm: u16) -> bool {
        self.clock.set_tempo(bpm)
    }

    pub fn tempo(&self) -> u16 {
        self.clock.tempo()
    }

    /// Locks the grid. Holding the guard pauses the simulation.
    pub fn grid(&self) -> MutexGuard<'_, Grid> {
        lock(&self.grid)
    }

    /// Shared handle for callers that need the grid from another thread.
    pub fn grid_handle(&self) -> Arc<Mutex<Grid>> {
        self.grid.clone()
    }

    /// Back to pulse zero without changing the transport state.
    pub fn rewind(&self) {
        lock(&self.grid).rewind();
    }

    /// Stops the clock and flushes note-offs into the output queues. The
    /// queues themselves are drained by `Outputs::shutdown`.
    pub fn shutdown(&mut self) {
        if !self.clock.is_running() {
            return;
        }
        self.clock.stop();
        let mut grid = lock(&self.grid);
        grid.silence();
        if self.playing.swap(false, Ordering::AcqRel) {
            self.bus.send(Message::TransportStop);
        }
        info!(pulse = grid.pulse(), "sequencer stopped");
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
