use pulsegrid::{Bus, DeviceSink, Message, Outputs, OverflowPolicy, Result};
use std::sync::{Arc, Mutex};

/// Sink that keeps every message it is asked to send.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Message>>>);

#[allow(dead_code)]
impl Recorder {
    pub fn messages(&self) -> Vec<Message> {
        self.0.lock().unwrap().clone()
    }

    pub fn notes_on(&self) -> Vec<(u8, u8)> {
        self.messages()
            .into_iter()
            .filter_map(|msg| match msg {
                Message::NoteOn { channel, pitch, .. } => Some((channel, pitch)),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, msg: Message) -> Result<()> {
        self.0.lock().unwrap().push(msg);
        Ok(())
    }
}

impl DeviceSink for Recorder {
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

/// One recording device behind a blocking queue.
pub fn recording() -> (Outputs, Bus, Recorder) {
    let recorder = Recorder::default();
    let sink = recorder.clone();
    let mut outputs = Outputs::new();
    outputs
        .open("recorder", 4096, OverflowPolicy::Block, move || {
            Ok(Box::new(sink) as Box<dyn DeviceSink>)
        })
        .unwrap();
    let bus = outputs.bus();
    (outputs, bus, recorder)
}
