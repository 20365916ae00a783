//! Hardware MIDI output through midir.

use crate::error::*;
use midir::{MidiOutput, MidiOutputConnection};
use pulsegrid::DeviceSink;
use tracing::info;

const CLIENT_NAME: &str = "pulsegrid";

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const CHANNEL_PRESSURE: u8 = 0xD0;
const TIMING_CLOCK: u8 = 0xF8;
const START: u8 = 0xFA;
const STOP: u8 = 0xFC;
const ALL_NOTES_OFF: u8 = 123;
const CHANNELS: u8 = 16;

fn status(kind: u8, channel: u8) -> u8 {
    kind | (channel & 0x0f)
}

/// Anything raw MIDI bytes can be written to.
pub trait MidiWrite {
    fn write(&mut self, bytes: &[u8]) -> pulsegrid::Result<()>;
}

impl MidiWrite for MidiOutputConnection {
    fn write(&mut self, bytes: &[u8]) -> pulsegrid::Result<()> {
        self.send(bytes)
            .map_err(|err| pulsegrid::Error::Device(err.to_string()))
    }
}

/// Names of the MIDI output ports currently visible.
pub fn port_names() -> Result<Vec<String>> {
    let output = MidiOutput::new(CLIENT_NAME).map_err(|err| CliError::Midi(err.to_string()))?;
    Ok(output
        .ports()
        .iter()
        .filter_map(|port| output.port_name(port).ok())
        .collect())
}

pub struct MidiSink<W = MidiOutputConnection> {
    out: W,
}

impl MidiSink {
    /// Connects to the first port whose name contains `hint`, or to the first
    /// port at all.
    pub fn connect(hint: Option<&str>) -> pulsegrid::Result<Self> {
        let device = |reason: String| pulsegrid::Error::DeviceOpen {
            name: "midi".to_owned(),
            reason,
        };

        let output = MidiOutput::new(CLIENT_NAME).map_err(|err| device(err.to_string()))?;
        let ports = output.ports();
        let (port, name) = ports
            .iter()
            .filter_map(|port| Some((port, output.port_name(port).ok()?)))
            .find(|(_, name)| hint.map_or(true, |hint| name.contains(hint)))
            .ok_or_else(|| match hint {
                Some(hint) => device(format!("no port matching {:?}", hint)),
                None => device("no MIDI output ports".to_owned()),
            })?;

        let out = output
            .connect(port, CLIENT_NAME)
            .map_err(|err| device(err.to_string()))?;
        info!(port = %name, "midi output connected");
        Ok(Self { out })
    }
}

impl<W: MidiWrite> MidiSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }
}

impl<W: MidiWrite> DeviceSink for MidiSink<W> {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> pulsegrid::Result<()> {
        self.out.write(&[status(NOTE_ON, channel), pitch & 0x7f, velocity & 0x7f])
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> pulsegrid::Result<()> {
        self.out.write(&[status(NOTE_OFF, channel), pitch & 0x7f, 0])
    }

    fn silence(&mut self, channel: u8) -> pulsegrid::Result<()> {
        self.out.write(&[status(CONTROL_CHANGE, channel), ALL_NOTES_OFF, 0])
    }

    fn silence_all(&mut self) -> pulsegrid::Result<()> {
        for channel in 0..CHANNELS {
            self.silence(channel)?;
        }
        Ok(())
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> pulsegrid::Result<()> {
        self.out.write(&[
            status(CONTROL_CHANGE, channel),
            controller & 0x7f,
            value & 0x7f,
        ])
    }

    fn after_touch(&mut self, channel: u8, value: u8) -> pulsegrid::Result<()> {
        self.out.write(&[status(CHANNEL_PRESSURE, channel), value & 0x7f])
    }

    fn send_clock(&mut self) -> pulsegrid::Result<()> {
        self.out.write(&[TIMING_CLOCK])
    }

    fn transport_start(&mut self) -> pulsegrid::Result<()> {
        self.out.write(&[START])
    }

    fn transport_stop(&mut self) -> pulsegrid::Result<()> {
        self.out.write(&[STOP])
    }
}
