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

/// Out of range arguments to sample player operations. The rejected operation leaves the
/// player untouched.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlayerError {
    #[error("Voice ({voice}) should be below the voice count ({max_voices})")]
    VoiceOutOfRange { voice: usize, max_voices: usize },

    #[error("A sample needs at least one voice (found {0})")]
    VoiceCountOutOfRange(usize),

    #[error("Volume ({0}) should range from 0 to 127")]
    VolumeOutOfRange(i32),

    #[error("Panning ({0}) should range from 0 to 127")]
    PanningOutOfRange(i32),

    #[error("Delay ({0}) should be 0 or larger (in milliseconds)")]
    DelayOutOfRange(f64),

    #[error("Frequency ({0}) should be a positive number of Hz")]
    FrequencyOutOfRange(f64),

    #[error("Loop count should be at least 1")]
    LoopCountOutOfRange,

    #[error("Region starting at {start_ms}ms is outside of the sample ({length_ms:.0}ms long)")]
    RegionOutOfRange { start_ms: f64, length_ms: f64 },
}

/// Errors raised while loading sample data.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio file error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("No audio track found in {0}")]
    NoTrack(String),

    #[error("Sample rate not specified in {0}")]
    UnknownSampleRate(String),

    #[error("Can only play mono or stereo samples (found {0} channels)")]
    UnsupportedChannels(usize),

    #[error("Sample contains no audio")]
    Empty,

    #[error("Invalid sample options: {0}")]
    Options(#[from] PlayerError),
}
