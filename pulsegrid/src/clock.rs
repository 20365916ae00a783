//! Tempo-driven pulse source.
//!
//! The clock owns a dedicated thread. Tempo changes are requests sent over a
//! channel and only take effect after the next pulse has fired, so the
//! schedule is never rewritten while a pulse is in flight.

use crate::error::*;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const PULSES_PER_STEP: u64 = 4;
pub const STEPS_PER_QUARTER_NOTE: u64 = 4;

pub const MIN_TEMPO: u16 = 1;
pub const MAX_TEMPO: u16 = 300;
pub const DEFAULT_TEMPO: u16 = 120;

/// Pulses this far behind schedule are dropped instead of fired in a burst.
const MAX_LAG_PULSES: u32 = 8;

pub fn is_valid_tempo(bpm: u16) -> bool {
    (MIN_TEMPO..=MAX_TEMPO).contains(&bpm)
}

/// Time between two pulses at `bpm` beats per minute.
pub fn pulse_interval(bpm: u16) -> Duration {
    let pulses_per_minute = u64::from(bpm.max(MIN_TEMPO)) * PULSES_PER_STEP * STEPS_PER_QUARTER_NOTE;
    Duration::from_nanos(60_000_000_000 / pulses_per_minute)
}

/// The clock's schedule, separated from the thread so it can be driven by
/// hand.
#[derive(Debug, Clone)]
pub struct Timer {
    tempo: u16,
    interval: Duration,
    next: Instant,
    pending: Option<u16>,
}

impl Timer {
    /// The first pulse is due at `start`.
    pub fn new(tempo: u16, start: Instant) -> Self {
        let tempo = tempo.max(MIN_TEMPO).min(MAX_TEMPO);
        Self {
            tempo,
            interval: pulse_interval(tempo),
            next: start,
            pending: None,
        }
    }

    pub fn tempo(&self) -> u16 {
        self.tempo
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Instant {
        self.next
    }

    /// Queues a tempo for the next firing. Out-of-range values are ignored.
    pub fn request(&mut self, bpm: u16) -> bool {
        if !is_valid_tempo(bpm) {
            return false;
        }
        self.pending = Some(bpm);
        true
    }

    /// Schedules the pulse after the one that just fired, committing any
    /// pending tempo first. Returns the new tempo if one was committed.
    pub fn fired(&mut self, now: Instant) -> Option<u16> {
        let committed = self.pending.take().filter(|bpm| *bpm != self.tempo);
        if let Some(bpm) = committed {
            self.tempo = bpm;
            self.interval = pulse_interval(bpm);
        }

        self.next += self.interval;
        if now > self.next + self.interval * MAX_LAG_PULSES {
            warn!(
                behind = ?(now - self.next),
                "clock fell behind, resynchronising"
            );
            self.next = now;
        }
        committed
    }
}

enum Request {
    Tempo(u16),
    Stop,
}

/// Handle to the running clock thread. Dropping it stops the thread.
pub struct Clock {
    requests: Sender<Request>,
    tempo: Arc<AtomicU16>,
    handle: Option<JoinHandle<()>>,
}

impl Clock {
    /// Spawns the clock. `on_pulse` runs on the clock thread once per pulse;
    /// a pulse never starts before the previous call returned.
    pub fn start<F>(tempo: u16, mut on_pulse: F) -> Result<Clock>
    where
        F: FnMut() + Send + 'static,
    {
        let (requests, rx) = unbounded::<Request>();
        let mut timer = Timer::new(tempo, Instant::now());
        let committed = Arc::new(AtomicU16::new(timer.tempo()));
        let shared = committed.clone();

        let handle = thread::Builder::new()
            .name("clock".to_owned())
            .spawn(move || {
                debug!(tempo = timer.tempo(), "clock started");
                loop {
                    match rx.recv_deadline(timer.deadline()) {
                        Ok(Request::Tempo(bpm)) => {
                            timer.request(bpm);
                        }
                        Ok(Request::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            on_pulse();
                            if let Some(bpm) = timer.fired(Instant::now()) {
                                shared.store(bpm, Ordering::Release);
                                info!(bpm, "tempo changed");
                            }
                        }
                    }
                }
                debug!("clock stopped");
            })
            .map_err(|err| Error::Spawn("clock", err))?;

        Ok(Clock {
            requests,
            tempo: committed,
            handle: Some(handle),
        })
    }

    /// Asks for a new tempo. Values outside `1..=300` are ignored and
    /// return false.
    pub fn set_tempo(&self, bpm: u16) -> bool {
        if !is_valid_tempo(bpm) {
            return false;
        }
        self.requests.send(Request::Tempo(bpm)).is_ok()
    }

    /// The tempo the clock is currently running at.
    pub fn tempo(&self) -> u16 {
        self.tempo.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the thread and waits for the pulse in progress to finish.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.requests.send(Request::Stop);
            let _ = handle.join();
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn interval_at_120_bpm() {
        assert_eq!(pulse_interval(120), Duration::from_micros(31_250));
        assert_eq!(pulse_interval(60), Duration::from_micros(62_500));
        assert_eq!(pulse_interval(300), Duration::from_micros(12_500));
    }

    #[test]
    fn timer_rejects_out_of_range_tempo() {
        let mut timer = Timer::new(120, Instant::now());
        assert!(!timer.request(0));
        assert!(!timer.request(301));
        assert_eq!(timer.fired(timer.deadline()), None);
        assert_eq!(timer.tempo(), 120);
    }

    #[test]
    fn timer_clamps_start_tempo() {
        assert_eq!(Timer::new(0, Instant::now()).tempo(), MIN_TEMPO);
        assert_eq!(Timer::new(999, Instant::now()).tempo(), MAX_TEMPO);
    }

    #[test]
    fn tempo_applies_after_the_next_firing() {
        let start = Instant::now();
        let mut timer = Timer::new(120, start);
        assert!(timer.request(60));
        // still on the old schedule until a pulse fires
        assert_eq!(timer.deadline(), start);
        assert_eq!(timer.tempo(), 120);

        assert_eq!(timer.fired(start), Some(60));
        assert_eq!(timer.deadline(), start + Duration::from_micros(62_500));
        assert_eq!(timer.fired(timer.deadline()), None);
        assert_eq!(timer.deadline(), start + Duration::from_micros(125_000));
    }

    #[test]
    fn timer_keeps_a_fixed_grid() {
        let start = Instant::now();
        let mut timer = Timer::new(120, start);
        for n in 1..=10u32 {
            // firing late does not push later pulses back
            timer.fired(timer.deadline() + Duration::from_micros(500));
            assert_eq!(timer.deadline(), start + Duration::from_micros(31_250) * n);
        }
    }

    #[test]
    fn timer_resyncs_when_far_behind() {
        let start = Instant::now();
        let mut timer = Timer::new(120, start);
        let late = start + Duration::from_secs(5);
        timer.fired(late);
        assert_eq!(timer.deadline(), late);
    }

    #[test]
    fn clock_thread_pulses_and_commits_tempo() {
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        let mut clock = Clock::start(300, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(!clock.set_tempo(0));
        assert!(clock.set_tempo(250));
        thread::sleep(Duration::from_millis(150));
        assert_eq!(clock.tempo(), 250);

        clock.stop();
        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 3, "only {} pulses", fired);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), fired);
        assert!(!clock.is_running());
    }
}
