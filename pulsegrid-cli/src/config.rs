use pulsegrid::clock::{is_valid_tempo, DEFAULT_TEMPO};
use pulsegrid::{OverflowPolicy, Scale};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "ClockConfig::default_tempo")]
    pub tempo: u16,
}

impl ClockConfig {
    fn default_tempo() -> u16 {
        DEFAULT_TEMPO
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tempo: Self::default_tempo(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "GridConfig::default_width")]
    pub width: u16,
    #[serde(default = "GridConfig::default_height")]
    pub height: u16,
    /// Pitch class, 0 = C.
    #[serde(default)]
    pub root: u8,
    #[serde(default)]
    pub scale: Scale,
    #[serde(default)]
    pub default_channel: u8,
}

impl GridConfig {
    fn default_width() -> u16 {
        16
    }

    fn default_height() -> u16 {
        8
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            root: 0,
            scale: Scale::default(),
            default_channel: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    #[serde(default = "OutputConfig::default_enabled")]
    pub midi: bool,
    /// Substring of the MIDI port name to connect to. The first port is used
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midi_port: Option<String>,
    #[serde(default = "OutputConfig::default_enabled")]
    pub synth: bool,
    #[serde(default = "OutputConfig::default_sample_rate")]
    pub sample_rate: u32,
}

impl OutputConfig {
    fn default_queue_capacity() -> usize {
        pulsegrid::output::DEFAULT_QUEUE_CAPACITY
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_sample_rate() -> u32 {
        44_100
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            queue_capacity: Self::default_queue_capacity(),
            overflow: OverflowPolicy::default(),
            midi: true,
            midi_port: None,
            synth: true,
            sample_rate: Self::default_sample_rate(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Reads `path`, falling back to defaults on any error. A missing file is
    /// created with every default written out as a comment.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            let cfg = match fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(cfg) => cfg,
                    Err(err) => {
                        warn!(path = %path.display(), "failed to parse config, using defaults: {}", err);
                        Self::default()
                    }
                },
                Err(err) => {
                    warn!(path = %path.display(), "failed to read config, using defaults: {}", err);
                    Self::default()
                }
            };
            return cfg.sanitized();
        }

        let cfg = Self::default();
        match toml::to_string_pretty(&cfg) {
            Ok(text) => {
                if let Err(err) = fs::write(path, commented(&text)) {
                    warn!(path = %path.display(), "failed to write default config: {}", err);
                } else {
                    info!(path = %path.display(), "wrote default config");
                }
            }
            Err(err) => warn!("failed to serialize default config: {}", err),
        }
        cfg
    }

    /// Replaces out-of-range values with their defaults.
    pub fn sanitized(mut self) -> Self {
        if !is_valid_tempo(self.clock.tempo) {
            warn!(tempo = self.clock.tempo, "tempo out of range, using default");
            self.clock.tempo = DEFAULT_TEMPO;
        }
        if self.grid.width == 0 || self.grid.height == 0 {
            warn!(
                width = self.grid.width,
                height = self.grid.height,
                "empty grid size, using default"
            );
            self.grid.width = GridConfig::default_width();
            self.grid.height = GridConfig::default_height();
        }
        if self.grid.root >= pulsegrid::theory::PITCH_CLASSES {
            warn!(root = self.grid.root, "root out of range, using C");
            self.grid.root = 0;
        }
        if self.grid.default_channel > pulsegrid::note::MAX_CHANNEL {
            warn!(channel = self.grid.default_channel, "channel out of range, using 0");
            self.grid.default_channel = 0;
        }
        if self.output.queue_capacity == 0 {
            self.output.queue_capacity = OutputConfig::default_queue_capacity();
        }
        self
    }
}

/// Comments out every key line, leaving section headers in place.
fn commented(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
            out.push_str("# ");
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("pulsegrid_{}_{}_{}", std::process::id(), nanos, name))
    }

    #[test]
    fn missing_file_writes_commented_defaults() {
        let path = unique_path("defaults.toml");
        let cfg = AppConfig::load_or_default(&path);
        assert_eq!(cfg, AppConfig::default());

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[clock]"));
        assert!(contents.contains("# tempo = 120"));
        assert!(contents.contains("# overflow = \"drop-newest\""));

        // a fully commented file parses back to the defaults
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            "[grid]\nscale = \"harmonic-minor\"\nroot = 9\n[output]\noverflow = \"block\"\nsynth = false\n",
        )
        .unwrap();
        assert_eq!(cfg.grid.scale, Scale::HarmonicMinor);
        assert_eq!(cfg.grid.root, 9);
        assert_eq!(cfg.grid.width, 16);
        assert_eq!(cfg.output.overflow, OverflowPolicy::Block);
        assert!(!cfg.output.synth);
        assert!(cfg.output.midi);
        assert_eq!(cfg.clock.tempo, DEFAULT_TEMPO);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let path = unique_path("broken.toml");
        fs::write(&path, "[clock\ntempo = ").unwrap();
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn out_of_range_values_are_reset() {
        let mut cfg = AppConfig::default();
        cfg.clock.tempo = 0;
        cfg.grid.root = 12;
        cfg.grid.default_channel = 16;
        cfg.grid.width = 0;
        cfg.output.queue_capacity = 0;
        let cfg = cfg.sanitized();
        assert_eq!(cfg.clock.tempo, DEFAULT_TEMPO);
        assert_eq!(cfg.grid.root, 0);
        assert_eq!(cfg.grid.default_channel, 0);
        assert_eq!(cfg.grid.width, 16);
        assert!(cfg.output.queue_capacity > 0);
    }
}
