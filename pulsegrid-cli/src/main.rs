mod cli;
mod config;
mod demo;
mod error;
mod midi;
mod synth;

use clap::Parser;
use cli::{Args, Command};
use config::{AppConfig, OutputConfig};
use crossbeam_channel::bounded;
use error::*;
use gridbank::Snapshot;
use midi::MidiSink;
use pulsegrid::clock::is_valid_tempo;
use pulsegrid::{Bus, DeviceSink, Grid, Outputs, Sequencer};
use std::path::Path;
use std::time::Duration;
use synth::SynthSink;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = AppConfig::load_or_default(&args.config);
    match args.command {
        Command::Ports => list_ports(),
        Command::Play {
            bank,
            tempo,
            seconds,
            save,
        } => play(&config, bank.as_deref(), tempo, seconds, save.as_deref()),
        Command::New {
            path,
            width,
            height,
        } => create(&config, &path, width, height),
    }
}

fn list_ports() -> Result<()> {
    let names = midi::port_names()?;
    if names.is_empty() {
        println!("no MIDI output ports");
    }
    for (i, name) in names.iter().enumerate() {
        println!("{}: {}", i, name);
    }
    Ok(())
}

/// Opens every enabled device. Failures are logged; the caller decides
/// whether an empty set is fatal.
fn open_outputs(config: &OutputConfig) -> Outputs {
    let mut outputs = Outputs::new();
    if config.midi {
        let hint = config.midi_port.clone();
        let opened = outputs.open("midi", config.queue_capacity, config.overflow, move || {
            Ok(Box::new(MidiSink::connect(hint.as_deref())?) as Box<dyn DeviceSink>)
        });
        if let Err(err) = opened {
            warn!("{}", err);
        }
    }
    if config.synth {
        let sample_rate = config.sample_rate;
        let opened = outputs.open("synth", config.queue_capacity, config.overflow, move || {
            Ok(Box::new(SynthSink::open(sample_rate)?) as Box<dyn DeviceSink>)
        });
        if let Err(err) = opened {
            warn!("{}", err);
        }
    }
    outputs
}

/// The grid to play and the tempo it was saved with.
fn load_grid(config: &AppConfig, bank: Option<&Path>, bus: Bus) -> Result<(Grid, u16)> {
    match bank {
        Some(path) => {
            let snapshot = gridbank::load(path)?;
            info!(
                path = %path.display(),
                width = snapshot.header.width,
                height = snapshot.header.height,
                emitters = snapshot.emitter_count(),
                "bank loaded"
            );
            Ok((snapshot.restore(bus), snapshot.header.tempo))
        }
        None => {
            let mut grid = Grid::new(
                usize::from(config.grid.width),
                usize::from(config.grid.height),
                bus,
            );
            grid.set_root(config.grid.root);
            grid.set_scale(config.grid.scale);
            grid.set_default_channel(config.grid.default_channel);
            demo::build(&mut grid)?;
            info!("playing the demo patch");
            Ok((grid, config.clock.tempo))
        }
    }
}

fn play(
    config: &AppConfig,
    bank: Option<&Path>,
    tempo: Option<u16>,
    seconds: Option<u64>,
    save: Option<&Path>,
) -> Result<()> {
    let mut outputs = open_outputs(&config.output);
    let bus = outputs.bus();
    let (grid, saved_tempo) = load_grid(config, bank, bus.clone())?;

    let tempo = match tempo {
        Some(bpm) if is_valid_tempo(bpm) => bpm,
        Some(bpm) => {
            warn!(bpm, "tempo out of range, ignored");
            saved_tempo
        }
        None => saved_tempo,
    };
    let mut sequencer = Sequencer::new(grid, tempo)?;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    sequencer.play();
    info!(tempo, "press ctrl-c to stop");
    match seconds {
        Some(seconds) => {
            let _ = stop_rx.recv_timeout(Duration::from_secs(seconds));
        }
        None => {
            let _ = stop_rx.recv();
        }
    }
    sequencer.pause();

    if let Some(path) = save {
        let snapshot = Snapshot::capture(&sequencer.grid(), sequencer.tempo());
        gridbank::save(path, &snapshot)?;
        info!(path = %path.display(), nodes = snapshot.nodes.len(), "bank saved");
    }

    sequencer.shutdown();
    outputs.shutdown();
    let dropped = bus.dropped();
    if dropped > 0 {
        warn!(dropped, "messages were dropped on full output queues");
    }
    Ok(())
}

fn create(config: &AppConfig, path: &Path, width: Option<u16>, height: Option<u16>) -> Result<()> {
    let width = width.unwrap_or(config.grid.width);
    let height = height.unwrap_or(config.grid.height);
    let mut grid = Grid::new(usize::from(width), usize::from(height), Bus::default());
    grid.set_root(config.grid.root);
    grid.set_scale(config.grid.scale);
    grid.set_default_channel(config.grid.default_channel);

    let snapshot = Snapshot::capture(&grid, config.clock.tempo);
    gridbank::save(path, &snapshot)?;
    info!(
        path = %path.display(),
        width = snapshot.header.width,
        height = snapshot.header.height,
        "empty bank written"
    );
    Ok(())
}
