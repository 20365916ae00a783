//! The audible state carried by every emitter.

use crate::output::{Bus, Message};
use crate::param::{jitter_offset, Param};
use crate::theory::{self, Scale, MAX_KEY};
use rand::Rng;

/// A length of this many pulses never auto-stops.
pub const INFINITE_LENGTH: u8 = 127;
pub const MAX_CONTROLS: usize = 4;
pub const MAX_CHANNEL: u8 = 15;
pub const MAX_PROBABILITY: u8 = 100;

/// Seed values for newly placed emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteDefaults {
    pub key: u8,
    pub channel: u8,
    pub velocity: u8,
    pub length: u8,
    pub probability: u8,
}

impl Default for NoteDefaults {
    fn default() -> Self {
        Self {
            key: 60,
            channel: 0,
            velocity: 100,
            length: 4,
            probability: MAX_PROBABILITY,
        }
    }
}

/// A pitch whose jitter is measured in scale degrees rather than semitones.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    param: Param<u8>,
    pub silent: bool,
}

impl Key {
    pub fn new(key: u8) -> Self {
        Self {
            param: Param::new(key, 0, MAX_KEY),
            silent: false,
        }
    }

    pub fn param(&self) -> &Param<u8> {
        &self.param
    }

    pub fn value(&self) -> u8 {
        self.param.value()
    }

    pub fn set(&mut self, key: u8) {
        self.param.set(key);
    }

    pub fn random_amount(&self) -> i32 {
        self.param.random_amount()
    }

    pub fn set_random_amount(&mut self, degrees: i32) {
        self.param.set_random_amount(degrees);
    }

    pub fn last(&self) -> u8 {
        self.param.last()
    }

    pub fn computed(&mut self, root: u8, scale: Scale) -> u8 {
        let degrees = jitter_offset(self.param.random_amount()) as i32;
        let key = theory::transpose(self.param.value(), root, scale, degrees);
        self.param.commit(i64::from(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Controller(u8),
    AfterTouch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub kind: ControlKind,
    pub value: Param<u8>,
}

impl Control {
    pub fn controller(number: u8, value: u8) -> Self {
        Self {
            kind: ControlKind::Controller(number.min(119)),
            value: Param::new(value, 0, 127),
        }
    }

    pub fn after_touch(value: u8) -> Self {
        Self {
            kind: ControlKind::AfterTouch,
            value: Param::new(value, 0, 127),
        }
    }

    fn fire(&mut self, channel: u8, bus: &Bus) {
        let value = self.value.computed();
        bus.send(match self.kind {
            ControlKind::Controller(controller) => Message::ControlChange {
                channel,
                controller,
                value,
            },
            ControlKind::AfterTouch => Message::AfterTouch { channel, value },
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub key: Key,
    pub channel: Param<u8>,
    pub velocity: Param<u8>,
    /// In pulses.
    pub length: Param<u8>,
    probability: u8,
    pub controls: [Option<Control>; MAX_CONTROLS],
    triggered: bool,
    elapsed: u8,
}

impl Note {
    pub fn new(defaults: &NoteDefaults) -> Self {
        let mut note = Self {
            key: Key::new(defaults.key),
            channel: Param::new(defaults.channel, 0, MAX_CHANNEL),
            velocity: Param::new(defaults.velocity, 0, 127),
            length: Param::new(defaults.length, 1, INFINITE_LENGTH),
            probability: MAX_PROBABILITY,
            controls: Default::default(),
            triggered: false,
            elapsed: 0,
        };
        note.set_probability(defaults.probability);
        note
    }

    pub fn probability(&self) -> u8 {
        self.probability
    }

    /// Percent chance that a trigger actually sounds. Values above 100 are
    /// ignored.
    pub fn set_probability(&mut self, probability: u8) {
        if probability > MAX_PROBABILITY {
            return;
        }
        self.probability = probability;
    }

    pub fn is_playing(&self) -> bool {
        self.triggered
    }

    pub fn elapsed(&self) -> u8 {
        self.elapsed
    }

    fn passes_gate(&self) -> bool {
        self.probability >= MAX_PROBABILITY
            || rand::rng().random_range(0..MAX_PROBABILITY) < self.probability
    }

    /// Plays the note in the given key. Returns whether a note-on was sent.
    pub fn transpose_and_play(&mut self, root: u8, scale: Scale, bus: &Bus) -> bool {
        if self.key.silent || !self.passes_gate() {
            return false;
        }

        self.stop(bus);

        let pitch = self.key.computed(root, scale);
        let channel = self.channel.computed();
        let velocity = self.velocity.computed();
        self.length.computed();

        bus.send(Message::NoteOn {
            channel,
            pitch,
            velocity,
        });
        for control in self.controls.iter_mut().flatten() {
            control.fire(channel, bus);
        }

        self.triggered = true;
        self.elapsed = 0;
        true
    }

    /// Advances the length countdown by one pulse.
    pub fn tick(&mut self, bus: &Bus) {
        if !self.triggered {
            return;
        }
        self.elapsed = self.elapsed.saturating_add(1);
        let length = self.length.last();
        if length != INFINITE_LENGTH && self.elapsed >= length {
            self.stop(bus);
        }
    }

    /// Sends a note-off for whatever is sounding, using the values it was
    /// played with.
    pub fn stop(&mut self, bus: &Bus) {
        if !self.triggered {
            return;
        }
        bus.send(Message::NoteOff {
            channel: self.channel.last(),
            pitch: self.key.last(),
        });
        self.triggered = false;
        self.elapsed = 0;
    }

    /// Forgets the sounding state without sending anything. Used for copies
    /// whose original still owns the note-off.
    pub(crate) fn forget(&mut self) {
        self.triggered = false;
        self.elapsed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{DeviceSink, Outputs, OverflowPolicy};
    use crate::Result;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<Message>>>);

    impl Log {
        fn push(&mut self, msg: Message) -> Result<()> {
            self.0.lock().unwrap().push(msg);
            Ok(())
        }
    }

    impl DeviceSink for Log {
        fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<()> {
            self.push(Message::NoteOn {
                channel,
                pitch,
                velocity,
            })
        }
        fn note_off(&mut self, channel: u8, pitch: u8) -> Result<()> {
            self.push(Message::NoteOff { channel, pitch })
        }
        fn silence(&mut self, channel: u8) -> Result<()> {
            self.push(Message::Silence { channel })
        }
        fn silence_all(&mut self) -> Result<()> {
            self.push(Message::SilenceAll)
        }
        fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<()> {
            self.push(Message::ControlChange {
                channel,
                controller,
                value,
            })
        }
        fn after_touch(&mut self, channel: u8, value: u8) -> Result<()> {
            self.push(Message::AfterTouch { channel, value })
        }
        fn send_clock(&mut self) -> Result<()> {
            self.push(Message::Clock)
        }
        fn transport_start(&mut self) -> Result<()> {
            self.push(Message::TransportStart)
        }
        fn transport_stop(&mut self) -> Result<()> {
            self.push(Message::TransportStop)
        }
    }

    fn recording() -> (Outputs, Log) {
        let log = Log::default();
        let sink = log.clone();
        let mut outputs = Outputs::new();
        outputs
            .open("log", 256, OverflowPolicy::Block, move || {
                Ok(Box::new(sink) as Box<dyn DeviceSink>)
            })
            .unwrap();
        (outputs, log)
    }

    #[test]
    fn play_then_length_elapses() {
        let (mut outputs, log) = recording();
        let bus = outputs.bus();
        let mut note = Note::new(&NoteDefaults {
            key: 61,
            channel: 2,
            velocity: 90,
            length: 3,
            probability: 100,
        });
        note.controls[0] = Some(Control::controller(74, 40));
        note.controls[2] = Some(Control::after_touch(12));

        assert!(note.transpose_and_play(0, Scale::Major, &bus));
        assert!(note.is_playing());
        note.tick(&bus);
        note.tick(&bus);
        assert!(note.is_playing());
        note.tick(&bus);
        assert!(!note.is_playing());
        outputs.shutdown();

        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                Message::NoteOn {
                    channel: 2,
                    pitch: 60,
                    velocity: 90
                },
                Message::ControlChange {
                    channel: 2,
                    controller: 74,
                    value: 40
                },
                Message::AfterTouch {
                    channel: 2,
                    value: 12
                },
                Message::NoteOff {
                    channel: 2,
                    pitch: 60
                },
            ]
        );
    }

    #[test]
    fn retrigger_stops_with_the_played_pitch() {
        let (mut outputs, log) = recording();
        let bus = outputs.bus();
        let mut note = Note::new(&NoteDefaults::default());
        note.transpose_and_play(0, Scale::Chromatic, &bus);
        // changing the base must not change the note-off
        note.key.set(72);
        note.channel.set(5);
        note.transpose_and_play(0, Scale::Chromatic, &bus);
        outputs.shutdown();

        let log = log.0.lock().unwrap();
        assert_eq!(
            log[1],
            Message::NoteOff {
                channel: 0,
                pitch: 60
            }
        );
        assert_eq!(
            log[2],
            Message::NoteOn {
                channel: 5,
                pitch: 72,
                velocity: 100
            }
        );
    }

    #[test]
    fn infinite_length_never_stops() {
        let bus = Bus::default();
        let mut note = Note::new(&NoteDefaults {
            length: INFINITE_LENGTH,
            ..NoteDefaults::default()
        });
        note.transpose_and_play(0, Scale::Chromatic, &bus);
        for _ in 0..1000 {
            note.tick(&bus);
        }
        assert!(note.is_playing());
    }

    #[test]
    fn silent_key_and_zero_probability_do_not_play() {
        let bus = Bus::default();
        let mut note = Note::new(&NoteDefaults::default());
        note.key.silent = true;
        assert!(!note.transpose_and_play(0, Scale::Chromatic, &bus));

        let mut note = Note::new(&NoteDefaults {
            probability: 0,
            ..NoteDefaults::default()
        });
        for _ in 0..100 {
            assert!(!note.transpose_and_play(0, Scale::Chromatic, &bus));
        }
        assert!(!note.is_playing());
    }

    #[test]
    fn probability_above_hundred_is_ignored() {
        let mut note = Note::new(&NoteDefaults::default());
        note.set_probability(40);
        note.set_probability(101);
        assert_eq!(note.probability(), 40);
    }

    #[test]
    fn key_jitter_stays_in_scale() {
        let mut key = Key::new(60);
        key.set_random_amount(4);
        for _ in 0..200 {
            let pitch = key.computed(0, Scale::PentatonicMajor);
            assert!(theory::in_scale(pitch, 0, Scale::PentatonicMajor));
            assert!((60..=72).contains(&pitch));
        }
    }
}
