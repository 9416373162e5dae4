// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Pitch representations and conversions.
//!
//! A pitch reaches the engine either as a MIDI note number or as a frequency in Hz.
//! Both are resolved once, at the API boundary, into a canonical frequency.

use std::fmt;

/// Concert pitch for A4 (MIDI note 69).
pub const CONCERT_A: f64 = 440.0;

/// MIDI note number of A4.
pub const A4: u8 = 69;

/// Pitch bend range used by [`frequency_to_note`], in semitones (2 below, 2 above).
const BEND_RANGE: f64 = 4.0;

/// Errors raised when a pitch cannot be represented.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PitchError {
    #[error("MIDI pitch {0} should range from 0 to 127")]
    MidiOutOfRange(i64),

    #[error("Frequency {0} should be a positive number of Hz")]
    InvalidFrequency(f64),
}

/// A pitch, given either as a MIDI note number or as a frequency in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pitch {
    /// A MIDI note number (0-127).
    Midi(u8),
    /// A frequency in Hz.
    Frequency(f64),
}

impl Pitch {
    /// Creates a MIDI pitch, checking its range.
    pub fn midi(note: i64) -> Result<Pitch, PitchError> {
        if !(0..=127).contains(&note) {
            return Err(PitchError::MidiOutOfRange(note));
        }
        Ok(Pitch::Midi(note as u8))
    }

    /// Creates a frequency pitch, checking that it is usable.
    pub fn frequency(hz: f64) -> Result<Pitch, PitchError> {
        if !hz.is_finite() || hz <= 0.0 {
            return Err(PitchError::InvalidFrequency(hz));
        }
        Ok(Pitch::Frequency(hz))
    }

    /// Resolves this pitch into its canonical frequency.
    pub fn to_frequency(self) -> f64 {
        match self {
            Pitch::Midi(note) => note_to_frequency(note),
            Pitch::Frequency(hz) => hz,
        }
    }

    /// Returns the lookup key for this pitch.
    pub fn key(self) -> FrequencyKey {
        FrequencyKey::new(self.to_frequency())
    }
}

impl From<u8> for Pitch {
    fn from(note: u8) -> Self {
        Pitch::Midi(note.min(127))
    }
}

impl From<f64> for Pitch {
    fn from(hz: f64) -> Self {
        Pitch::Frequency(hz)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pitch::Midi(note) => write!(f, "{} ({:.2}Hz)", note, note_to_frequency(*note)),
            Pitch::Frequency(hz) => write!(f, "{:.2}Hz", hz),
        }
    }
}

/// A hashable key for a canonical frequency, so that the same note given as a MIDI
/// number or as a frequency always lands on the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrequencyKey(u64);

impl FrequencyKey {
    fn new(hz: f64) -> FrequencyKey {
        // -0.0 and 0.0 have different bit patterns.
        let hz = if hz == 0.0 { 0.0 } else { hz };
        FrequencyKey(hz.to_bits())
    }

    /// Returns the frequency this key stands for.
    pub fn frequency(&self) -> f64 {
        f64::from_bits(self.0)
    }
}

/// Converts a MIDI note number to a frequency in Hz.
pub fn note_to_frequency(note: u8) -> f64 {
    pitch_to_frequency(note as f64)
}

/// Converts a (possibly fractional) MIDI pitch to a frequency in Hz. Middle C is 60.0, and
/// 60.5 sits half way between C and C#.
pub fn pitch_to_frequency(pitch: f64) -> f64 {
    CONCERT_A * 2f64.powf((pitch - A4 as f64) / 12.0)
}

/// Converts a frequency in Hz to a (possibly fractional) MIDI pitch.
pub fn frequency_to_pitch(hz: f64) -> f64 {
    (hz / CONCERT_A).log2() * 12.0 + A4 as f64
}

/// Converts a frequency to the closest MIDI note and a pitch bend value (-8191 to 8192,
/// with 0 meaning no bend) for finer control.
pub fn frequency_to_note(hz: f64) -> (i32, i32) {
    let x = frequency_to_pitch(hz);
    let note = x.round();
    let bend = ((x - note) * 8192.0 / BEND_RANGE * 2.0).round();
    (note as i32, bend as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_frequency() {
        assert_eq!(note_to_frequency(69), 440.0);
        assert_eq!(note_to_frequency(81), 880.0);
        assert_eq!(note_to_frequency(57), 220.0);
        assert!((note_to_frequency(60) - 261.6256).abs() < 0.001);
    }

    #[test]
    fn test_frequency_to_pitch() {
        assert_eq!(frequency_to_pitch(440.0), 69.0);
        assert!((frequency_to_pitch(261.6256) - 60.0).abs() < 0.001);
    }

    #[test]
    fn test_frequency_to_note_with_bend() {
        assert_eq!(frequency_to_note(440.0), (69, 0));

        // A quarter tone above A4 lands on A4 with a positive bend.
        let quarter_tone = 440.0 * 2f64.powf(0.25 / 12.0);
        let (note, bend) = frequency_to_note(quarter_tone);
        assert_eq!(note, 69);
        assert_eq!(bend, 1024);
    }

    #[test]
    fn test_midi_and_frequency_share_a_key() {
        assert_eq!(Pitch::Midi(69).key(), Pitch::Frequency(440.0).key());
        assert_ne!(Pitch::Midi(70).key(), Pitch::Frequency(440.0).key());
        assert_eq!(Pitch::Midi(69).key().frequency(), 440.0);
    }

    #[test]
    fn test_pitch_validation() {
        assert_eq!(Pitch::midi(60), Ok(Pitch::Midi(60)));
        assert_eq!(Pitch::midi(128), Err(PitchError::MidiOutOfRange(128)));
        assert_eq!(Pitch::midi(-1), Err(PitchError::MidiOutOfRange(-1)));
        assert_eq!(Pitch::frequency(440.0), Ok(Pitch::Frequency(440.0)));
        assert!(Pitch::frequency(0.0).is_err());
        assert!(Pitch::frequency(f64::NAN).is_err());
    }
}
