//! Scale tables and key transposition.

use serde::{Deserialize, Serialize};

pub const PITCH_CLASSES: u8 = 12;
pub const MAX_KEY: u8 = 127;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scale {
    Chromatic,
    Major,
    Minor,
    HarmonicMinor,
    MelodicMinor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    WholeTone,
}

impl Default for Scale {
    fn default() -> Self {
        Scale::Chromatic
    }
}

impl Scale {
    pub const ALL: [Scale; 14] = [
        Scale::Chromatic,
        Scale::Major,
        Scale::Minor,
        Scale::HarmonicMinor,
        Scale::MelodicMinor,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Locrian,
        Scale::PentatonicMajor,
        Scale::PentatonicMinor,
        Scale::Blues,
        Scale::WholeTone,
    ];

    /// Root-relative 12-bit mask; bit `n` set means `n` semitones above the
    /// root belong to the scale.
    pub fn intervals(self) -> u16 {
        const fn mask(steps: &[u8]) -> u16 {
            let mut bits = 0u16;
            let mut i = 0;
            while i < steps.len() {
                bits |= 1 << steps[i];
                i += 1;
            }
            bits
        }

        match self {
            Scale::Chromatic => 0x0fff,
            Scale::Major => mask(&[0, 2, 4, 5, 7, 9, 11]),
            Scale::Minor => mask(&[0, 2, 3, 5, 7, 8, 10]),
            Scale::HarmonicMinor => mask(&[0, 2, 3, 5, 7, 8, 11]),
            Scale::MelodicMinor => mask(&[0, 2, 3, 5, 7, 9, 11]),
            Scale::Dorian => mask(&[0, 2, 3, 5, 7, 9, 10]),
            Scale::Phrygian => mask(&[0, 1, 3, 5, 7, 8, 10]),
            Scale::Lydian => mask(&[0, 2, 4, 6, 7, 9, 11]),
            Scale::Mixolydian => mask(&[0, 2, 4, 5, 7, 9, 10]),
            Scale::Locrian => mask(&[0, 1, 3, 5, 6, 8, 10]),
            Scale::PentatonicMajor => mask(&[0, 2, 4, 7, 9]),
            Scale::PentatonicMinor => mask(&[0, 3, 5, 7, 10]),
            Scale::Blues => mask(&[0, 3, 5, 6, 7, 10]),
            Scale::WholeTone => mask(&[0, 2, 4, 6, 8, 10]),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scale::Chromatic => "chromatic",
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::HarmonicMinor => "harmonic minor",
            Scale::MelodicMinor => "melodic minor",
            Scale::Dorian => "dorian",
            Scale::Phrygian => "phrygian",
            Scale::Lydian => "lydian",
            Scale::Mixolydian => "mixolydian",
            Scale::Locrian => "locrian",
            Scale::PentatonicMajor => "pentatonic major",
            Scale::PentatonicMinor => "pentatonic minor",
            Scale::Blues => "blues",
            Scale::WholeTone => "whole tone",
        }
    }

    pub fn index(self) -> u8 {
        Self::ALL
            .iter()
            .position(|scale| *scale == self)
            .unwrap_or(0) as u8
    }

    pub fn from_index(index: u8) -> Option<Scale> {
        Self::ALL.get(index as usize).copied()
    }
}

pub fn note_name(key: u8) -> String {
    let octave = i32::from(key / PITCH_CLASSES) - 1;
    format!("{}{}", NOTE_NAMES[(key % PITCH_CLASSES) as usize], octave)
}

fn in_scale_i32(key: i32, root: u8, scale: Scale) -> bool {
    let degree = (key - i32::from(root)).rem_euclid(i32::from(PITCH_CLASSES));
    scale.intervals() & (1 << degree) != 0
}

pub fn in_scale(key: u8, root: u8, scale: Scale) -> bool {
    in_scale_i32(i32::from(key), root, scale)
}

/// Snaps `key` down onto `scale` (rooted at pitch class `root`), then moves
/// it `interval` scale degrees up or down. The result is clamped to the MIDI
/// key range.
pub fn transpose(key: u8, root: u8, scale: Scale, interval: i32) -> u8 {
    let root = root % PITCH_CLASSES;
    let mut key = i32::from(key);
    // every scale contains its root, so this ends within one octave
    while !in_scale_i32(key, root, scale) {
        key -= 1;
    }

    let step = interval.signum();
    for _ in 0..interval.abs() {
        let mut next = key + step;
        while !in_scale_i32(next, root, scale) {
            next += step;
        }
        if next < 0 || next > i32::from(MAX_KEY) {
            break;
        }
        key = next;
    }

    key.max(0).min(i32::from(MAX_KEY)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scale_contains_its_root() {
        for scale in Scale::ALL.iter() {
            assert!(scale.intervals() & 1 != 0, "{}", scale.name());
            assert!(scale.intervals() < 1 << 12);
        }
    }

    #[test]
    fn in_scale_is_root_relative() {
        // D major: D E F# G A B C#
        assert!(in_scale(62, 2, Scale::Major));
        assert!(in_scale(66, 2, Scale::Major));
        assert!(!in_scale(65, 2, Scale::Major));
        assert!(in_scale(61, 2, Scale::Major));
    }

    #[test]
    fn transpose_snaps_down_then_moves_by_degree() {
        // C# is not in C major, snaps to C
        assert_eq!(transpose(61, 0, Scale::Major, 0), 60);
        assert_eq!(transpose(60, 0, Scale::Major, 1), 62);
        assert_eq!(transpose(60, 0, Scale::Major, 3), 65);
        assert_eq!(transpose(60, 0, Scale::Major, -1), 59);
        assert_eq!(transpose(60, 0, Scale::PentatonicMinor, 2), 65);
    }

    #[test]
    fn chromatic_is_identity_at_zero_interval() {
        for key in 0..=MAX_KEY {
            assert_eq!(transpose(key, 5, Scale::Chromatic, 0), key);
        }
    }

    #[test]
    fn transpose_stops_at_key_range() {
        assert_eq!(transpose(126, 0, Scale::Chromatic, 10), 127);
        assert_eq!(transpose(1, 0, Scale::Chromatic, -10), 0);
    }

    #[test]
    fn scale_index_round_trips() {
        for scale in Scale::ALL.iter() {
            assert_eq!(Scale::from_index(scale.index()), Some(*scale));
        }
        assert_eq!(Scale::from_index(200), None);
    }

    #[test]
    fn names_notes() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(69), "A4");
    }
}
