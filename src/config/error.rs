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
use crate::audio::LoadError;
use crate::envelope::EnvelopeError;
use crate::pitch::PitchError;

/// Typed error for performance load/parse failures so callers can distinguish
/// e.g. a missing sample from a malformed file without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Invalid pitch: {0}")]
    Pitch(#[from] PitchError),

    #[error("Unrecognized pitch \"{0}\", expected a MIDI pitch, a frequency, or \"rest\"")]
    UnknownPitch(String),

    #[error("Unable to load sample {file}: {source}")]
    Sample { file: String, source: LoadError },

    #[error("Sample rate should be above zero")]
    SampleRate,

    #[error("Tempo ({0}) should be a positive number of beats per minute")]
    Tempo(f64),

    #[error("Default panning ({0}) should range from 0 to 127")]
    Panning(i32),

    #[error("Performance has no samples")]
    NoSamples,
}
