//! Built-in sine synth on the default cpal output, for playing without any
//! MIDI hardware.

use cpal::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use dasp::signal::Signal;
use pulsegrid::DeviceSink;
use std::f64::consts::TAU;
use tracing::{info, warn};

const VOICE_GAIN: f32 = 0.12;
const RELEASE_SECONDS: f64 = 0.05;
const MAX_VOICES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    On { channel: u8, pitch: u8, velocity: u8 },
    Off { channel: u8, pitch: u8 },
    /// Release every voice, or every voice on one channel.
    Silence(Option<u8>),
}

fn frequency(pitch: u8) -> f64 {
    440.0 * 2f64.powf((f64::from(pitch) - 69.0) / 12.0)
}

#[derive(Debug, Clone)]
struct Voice {
    channel: u8,
    pitch: u8,
    phase: f64,
    step: f64,
    level: f32,
    releasing: bool,
}

/// Mixes the sounding voices into stereo frames. Events are picked up once
/// per buffer.
pub struct VoiceBank {
    sample_rate: f64,
    release_step: f32,
    voices: Vec<Voice>,
    events: Receiver<Event>,
}

impl VoiceBank {
    pub fn new(sample_rate: u32, events: Receiver<Event>) -> Self {
        let sample_rate = f64::from(sample_rate.max(1));
        Self {
            sample_rate,
            release_step: (f64::from(VOICE_GAIN) / (sample_rate * RELEASE_SECONDS)) as f32,
            voices: Vec::new(),
            events,
        }
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::On {
                channel,
                pitch,
                velocity,
            } => {
                self.release(|voice| voice.channel == channel && voice.pitch == pitch);
                if self.voices.len() >= MAX_VOICES {
                    self.voices.remove(0);
                }
                self.voices.push(Voice {
                    channel,
                    pitch,
                    phase: 0.0,
                    step: frequency(pitch) / self.sample_rate,
                    level: VOICE_GAIN * f32::from(velocity.min(127)) / 127.0,
                    releasing: false,
                });
            }
            Event::Off { channel, pitch } => {
                self.release(|voice| voice.channel == channel && voice.pitch == pitch)
            }
            Event::Silence(Some(channel)) => self.release(|voice| voice.channel == channel),
            Event::Silence(None) => self.release(|_| true),
        }
    }

    fn release<F: Fn(&Voice) -> bool>(&mut self, matches: F) {
        for voice in self.voices.iter_mut().filter(|voice| matches(&**voice)) {
            voice.releasing = true;
        }
    }

    pub fn poll(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
    }

    /// Fills an interleaved stereo buffer.
    pub fn fill(&mut self, data: &mut [f32]) {
        self.poll();
        for frame in data.chunks_mut(2) {
            let [left, right] = self.next();
            frame[0] = left;
            if let Some(sample) = frame.get_mut(1) {
                *sample = right;
            }
        }
    }
}

impl Signal for VoiceBank {
    type Frame = [f32; 2];

    fn next(&mut self) -> Self::Frame {
        let mut mix = 0.0f32;
        for voice in &mut self.voices {
            mix += (voice.phase * TAU).sin() as f32 * voice.level;
            voice.phase = (voice.phase + voice.step).fract();
            if voice.releasing {
                voice.level -= self.release_step;
            }
        }
        self.voices.retain(|voice| voice.level > 0.0);
        [mix, mix]
    }
}

/// Device sink feeding a [`VoiceBank`] running inside a cpal stream. The
/// stream lives as long as the sink.
pub struct SynthSink {
    events: Sender<Event>,
    _stream: cpal::Stream,
}

impl SynthSink {
    pub fn open(sample_rate: u32) -> pulsegrid::Result<Self> {
        let device_error = |reason: String| pulsegrid::Error::DeviceOpen {
            name: "synth".to_owned(),
            reason,
        };

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| device_error("no default audio output".to_owned()))?;

        let (events, rx) = unbounded();
        let mut bank = VoiceBank::new(sample_rate, rx);
        let stream = device
            .build_output_stream(
                &cpal::StreamConfig {
                    channels: 2,
                    sample_rate: cpal::SampleRate(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                },
                move |data: &mut [f32], _| bank.fill(data),
                |err| warn!("audio stream error: {}", err),
            )
            .map_err(|err| device_error(err.to_string()))?;
        stream
            .play()
            .map_err(|err| device_error(err.to_string()))?;

        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_owned()),
            sample_rate,
            "synth output started"
        );
        Ok(Self {
            events,
            _stream: stream,
        })
    }

    fn push(&self, event: Event) -> pulsegrid::Result<()> {
        self.events
            .send(event)
            .map_err(|_| pulsegrid::Error::Device("synth stream closed".to_owned()))
    }
}

impl DeviceSink for SynthSink {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> pulsegrid::Result<()> {
        self.push(Event::On {
            channel,
            pitch,
            velocity,
        })
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> pulsegrid::Result<()> {
        self.push(Event::Off { channel, pitch })
    }

    fn silence(&mut self, channel: u8) -> pulsegrid::Result<()> {
        self.push(Event::Silence(Some(channel)))
    }

    fn silence_all(&mut self) -> pulsegrid::Result<()> {
        self.push(Event::Silence(None))
    }

    // no timbre controls
    fn control_change(&mut self, _channel: u8, _controller: u8, _value: u8) -> pulsegrid::Result<()> {
        Ok(())
    }

    fn after_touch(&mut self, _channel: u8, _value: u8) -> pulsegrid::Result<()> {
        Ok(())
    }

    fn send_clock(&mut self) -> pulsegrid::Result<()> {
        Ok(())
    }

    fn transport_start(&mut self) -> pulsegrid::Result<()> {
        Ok(())
    }

    fn transport_stop(&mut self) -> pulsegrid::Result<()> {
        self.push(Event::Silence(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8_000;

    fn bank() -> (Sender<Event>, VoiceBank) {
        let (tx, rx) = unbounded();
        (tx, VoiceBank::new(RATE, rx))
    }

    fn peak(bank: &mut VoiceBank, frames: usize) -> f32 {
        let mut data = vec![0.0; frames * 2];
        bank.fill(&mut data);
        data.iter().fold(0.0f32, |peak, sample| peak.max(sample.abs()))
    }

    #[test]
    fn a4_is_440() {
        assert!((frequency(69) - 440.0).abs() < 1e-9);
        assert!((frequency(81) - 880.0).abs() < 1e-9);
    }

    #[test]
    fn note_sounds_until_released() {
        let (tx, mut bank) = bank();
        assert_eq!(peak(&mut bank, 64), 0.0);

        tx.send(Event::On {
            channel: 0,
            pitch: 69,
            velocity: 127,
        })
        .unwrap();
        let level = peak(&mut bank, 64);
        assert!(level > 0.0 && level <= VOICE_GAIN + 1e-6);

        tx.send(Event::Off { channel: 0, pitch: 69 }).unwrap();
        // release takes RELEASE_SECONDS
        peak(&mut bank, RATE as usize / 10);
        assert_eq!(bank.voice_count(), 0);
        assert_eq!(peak(&mut bank, 64), 0.0);
    }

    #[test]
    fn silence_is_per_channel() {
        let (tx, mut bank) = bank();
        for channel in 0..2 {
            tx.send(Event::On {
                channel,
                pitch: 60,
                velocity: 100,
            })
            .unwrap();
        }
        tx.send(Event::Silence(Some(1))).unwrap();
        peak(&mut bank, RATE as usize / 10);
        assert_eq!(bank.voice_count(), 1);

        tx.send(Event::Silence(None)).unwrap();
        peak(&mut bank, RATE as usize / 10);
        assert_eq!(bank.voice_count(), 0);
    }

    #[test]
    fn retrigger_replaces_the_voice() {
        let (tx, mut bank) = bank();
        for _ in 0..3 {
            tx.send(Event::On {
                channel: 0,
                pitch: 64,
                velocity: 90,
            })
            .unwrap();
        }
        peak(&mut bank, RATE as usize / 10);
        assert_eq!(bank.voice_count(), 1);
    }
}
