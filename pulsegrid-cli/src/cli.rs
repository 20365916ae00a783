use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pulsegrid", version, about = "Pulse-driven generative grid sequencer")]
pub struct Args {
    /// Settings file; created with commented defaults when missing.
    #[arg(long, default_value = "pulsegrid.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List MIDI output ports.
    Ports,
    /// Play a bank, or the built-in demo patch when none is given.
    Play {
        bank: Option<PathBuf>,
        /// Overrides the bank's or the config's tempo.
        #[arg(long)]
        tempo: Option<u16>,
        /// Stop by itself after this many seconds.
        #[arg(long)]
        seconds: Option<u64>,
        /// Write the grid to this bank on exit.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Write an empty bank using the configured grid settings.
    New {
        path: PathBuf,
        #[arg(long)]
        width: Option<u16>,
        #[arg(long)]
        height: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_defaults() {
        let args = Args::try_parse_from(["pulsegrid", "play"]).unwrap();
        assert_eq!(args.config, PathBuf::from("pulsegrid.toml"));
        match args.command {
            Command::Play {
                bank,
                tempo,
                seconds,
                save,
            } => {
                assert!(bank.is_none());
                assert!(tempo.is_none());
                assert!(seconds.is_none());
                assert!(save.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn play_with_bank_and_options() {
        let args = Args::try_parse_from([
            "pulsegrid",
            "--config",
            "live.toml",
            "play",
            "set.pgrd",
            "--tempo",
            "90",
            "--save",
            "out.pgrd",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("live.toml"));
        match args.command {
            Command::Play {
                bank, tempo, save, ..
            } => {
                assert_eq!(bank, Some(PathBuf::from("set.pgrd")));
                assert_eq!(tempo, Some(90));
                assert_eq!(save, Some(PathBuf::from("out.pgrd")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn new_requires_a_path() {
        assert!(Args::try_parse_from(["pulsegrid", "new"]).is_err());
        let args = Args::try_parse_from(["pulsegrid", "new", "a.pgrd", "--width", "32"]).unwrap();
        assert!(matches!(
            args.command,
            Command::New {
                width: Some(32),
                height: None,
                ..
            }
        ));
    }
}
