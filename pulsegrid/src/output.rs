//! Per-device outbound queues.
//!
//! The simulation only ever enqueues through a [`Bus`]; each device owns a
//! worker thread that drains its queue and performs the blocking send.

use crate::error::*;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Everything the engine can ask a device to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    Silence { channel: u8 },
    SilenceAll,
    ControlChange { channel: u8, controller: u8, value: u8 },
    AfterTouch { channel: u8, value: u8 },
    Clock,
    TransportStart,
    TransportStop,
}

impl Message {
    pub fn deliver(&self, sink: &mut dyn DeviceSink) -> Result<()> {
        match *self {
            Message::NoteOn {
                channel,
                pitch,
                velocity,
            } => sink.note_on(channel, pitch, velocity),
            Message::NoteOff { channel, pitch } => sink.note_off(channel, pitch),
            Message::Silence { channel } => sink.silence(channel),
            Message::SilenceAll => sink.silence_all(),
            Message::ControlChange {
                channel,
                controller,
                value,
            } => sink.control_change(channel, controller, value),
            Message::AfterTouch { channel, value } => sink.after_touch(channel, value),
            Message::Clock => sink.send_clock(),
            Message::TransportStart => sink.transport_start(),
            Message::TransportStop => sink.transport_stop(),
        }
    }
}

/// A physical output. Implementations may block; they only ever run on their
/// own worker thread.
pub trait DeviceSink {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<()>;
    fn note_off(&mut self, channel: u8, pitch: u8) -> Result<()>;
    fn silence(&mut self, channel: u8) -> Result<()>;
    fn silence_all(&mut self) -> Result<()>;
    fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<()>;
    fn after_touch(&mut self, channel: u8, value: u8) -> Result<()>;
    fn send_clock(&mut self) -> Result<()>;
    fn transport_start(&mut self) -> Result<()>;
    fn transport_stop(&mut self) -> Result<()>;
}

/// What to do when a device queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Wait for room. Stalls the caller, so the clock can slip.
    Block,
    /// Discard the message being enqueued.
    DropNewest,
    /// Discard the oldest queued message to make room.
    DropOldest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::DropNewest
    }
}

enum Packet {
    Message(Message),
    Shutdown,
}

#[derive(Clone)]
struct Port {
    name: Arc<str>,
    policy: OverflowPolicy,
    tx: Sender<Packet>,
    // only kept for DropOldest
    rx: Option<Receiver<Packet>>,
    dropped: Arc<AtomicU64>,
}

impl Port {
    fn enqueue(&self, msg: Message) {
        match self.policy {
            OverflowPolicy::Block => {
                let _ = self.tx.send(Packet::Message(msg));
            }
            OverflowPolicy::DropNewest => {
                if let Err(TrySendError::Full(_)) = self.tx.try_send(Packet::Message(msg)) {
                    self.record_drop(msg);
                }
            }
            OverflowPolicy::DropOldest => {
                let rx = match &self.rx {
                    Some(rx) => rx,
                    None => return self.record_drop(msg),
                };
                let mut packet = Packet::Message(msg);
                loop {
                    match self.tx.try_send(packet) {
                        Ok(()) | Err(TrySendError::Disconnected(_)) => break,
                        Err(TrySendError::Full(rejected)) => {
                            packet = rejected;
                            match rx.try_recv() {
                                Ok(Packet::Message(oldest)) => self.record_drop(oldest),
                                Ok(Packet::Shutdown) => {
                                    // keep the worker's stop request, lose the new message
                                    let _ = self.tx.try_send(Packet::Shutdown);
                                    self.record_drop(msg);
                                    break;
                                }
                                Err(_) => {}
                            }
                        }
                    }
                }
            }
        }
    }

    fn record_drop(&self, msg: Message) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(device = %self.name, ?msg, total, "output queue full, message dropped");
    }
}

/// Cheap, cloneable handle that fans each message out to every open device.
///
/// A bus with no devices silently discards everything.
#[derive(Clone, Default)]
pub struct Bus {
    ports: Vec<Port>,
}

impl Bus {
    pub fn send(&self, msg: Message) {
        for port in &self.ports {
            port.enqueue(msg);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn device_names(&self) -> Vec<String> {
        self.ports.iter().map(|port| port.name.to_string()).collect()
    }

    /// Messages dropped so far because a queue was full, summed over devices.
    pub fn dropped(&self) -> u64 {
        self.ports
            .iter()
            .map(|port| port.dropped.load(Ordering::Relaxed))
            .sum()
    }
}

/// Owns the device workers. Dropping it drains and joins every worker.
#[derive(Default)]
pub struct Outputs {
    bus: Bus,
    workers: Vec<JoinHandle<()>>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a worker for one device. `open` runs on the worker thread, so
    /// the sink never has to cross threads; if it fails the device is not
    /// added and the error is returned.
    pub fn open<F>(
        &mut self,
        name: &str,
        capacity: usize,
        policy: OverflowPolicy,
        open: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<Box<dyn DeviceSink>> + Send + 'static,
    {
        let (tx, rx) = bounded::<Packet>(capacity.max(1));
        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), String>>(1);

        let worker_rx = rx.clone();
        let worker_name = name.to_owned();
        let handle = thread::Builder::new()
            .name(format!("output-{}", name))
            .spawn(move || {
                let sink = match open() {
                    Ok(sink) => {
                        let _ = ready_tx.send(Ok(()));
                        sink
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err.to_string()));
                        return;
                    }
                };
                run_worker(&worker_name, worker_rx, sink);
            })
            .map_err(|err| Error::Spawn("output", err))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = handle.join();
                return Err(Error::DeviceOpen {
                    name: name.to_owned(),
                    reason,
                });
            }
            Err(_) => {
                let _ = handle.join();
                return Err(Error::DeviceOpen {
                    name: name.to_owned(),
                    reason: "worker exited during startup".to_owned(),
                });
            }
        }

        info!(device = name, capacity, ?policy, "output device opened");
        self.bus.ports.push(Port {
            name: Arc::from(name),
            policy,
            tx,
            rx: if policy == OverflowPolicy::DropOldest {
                Some(rx)
            } else {
                None
            },
            dropped: Arc::new(AtomicU64::new(0)),
        });
        self.workers.push(handle);
        Ok(())
    }

    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.bus.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bus.ports.len()
    }

    /// Asks every worker to stop once its queue is empty, then waits for them.
    /// Messages enqueued before this call are all delivered.
    pub fn shutdown(&mut self) {
        for port in &self.bus.ports {
            let _ = port.tx.send(Packet::Shutdown);
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.bus.ports.clear();
    }
}

impl Drop for Outputs {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(name: &str, rx: Receiver<Packet>, mut sink: Box<dyn DeviceSink>) {
    let deliver = |sink: &mut Box<dyn DeviceSink>, msg: Message| {
        if let Err(err) = msg.deliver(sink.as_mut()) {
            warn!(device = name, ?msg, "send failed: {}", err);
        }
    };

    while let Ok(packet) = rx.recv() {
        match packet {
            Packet::Message(msg) => deliver(&mut sink, msg),
            Packet::Shutdown => {
                for packet in rx.try_iter() {
                    if let Packet::Message(msg) = packet {
                        deliver(&mut sink, msg);
                    }
                }
                break;
            }
        }
    }
    debug!(device = name, "output worker stopped");
}
