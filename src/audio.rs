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

//! Sample playback.
//!
//! This module provides:
//! - Sample loading (decoded entirely into memory)
//! - The sample player contract, with per-voice frequency, panning, volume and looping
//! - A mixer that renders every sample's voices into a stereo stream
//! - Output to an audio device or to a WAV file

use crate::envelope::VoiceTimers;

pub mod cpal;
mod data;
mod error;
mod mixer;
mod ramp;
mod sample;
pub mod wav;

pub use data::SampleData;
pub use error::{LoadError, PlayerError};
pub use mixer::{AudioMixer, CHANNELS};
pub use ramp::LinearRamp;
pub use sample::{AudioSample, AudioSampleOptions};

/// Default smoothing time for volume changes that don't ask for a ramp, in milliseconds.
pub const DEFAULT_VOLUME_DELAY_MS: f64 = 2.0;

/// Center panning.
pub const CENTER_PANNING: i32 = 63;

/// How much of the sample to play, measured from the start offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaySpan {
    /// Play to the end of the sample.
    ToEnd,
    /// Play the given number of milliseconds.
    Millis(f64),
}

/// How many times a looped region plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    /// Loop until stopped.
    Forever,
    /// Play the region this many times.
    Times(u32),
}

/// The part of the sample player contract an envelope needs: smoothed volume changes,
/// silencing, and the voice's timer list.
pub trait EnvelopeTarget: Send + Sync {
    /// Sets the voice's volume (0-127), ramping to it over `delay_ms` milliseconds.
    fn set_volume(&self, volume: i32, delay_ms: f64, voice: usize) -> Result<(), PlayerError>;

    /// Clears the voice's queued playback without touching its envelope timers.
    fn silence(&self, voice: usize) -> Result<(), PlayerError>;

    /// Returns the timers that shape the voice's envelope.
    fn envelope_timers(&self, voice: usize) -> Result<&VoiceTimers, PlayerError>;
}

/// The sample player contract. Every operation is voice-indexed and range-checked. A bad
/// argument is reported and the operation does nothing.
pub trait SamplePlayer: EnvelopeTarget {
    /// Returns the number of voices.
    fn max_voices(&self) -> usize;

    /// Plays the region once, restarting the voice if it is already playing.
    fn play(&self, start_ms: f64, span: PlaySpan, voice: usize) -> Result<(), PlayerError>;

    /// Plays the region repeatedly.
    fn loop_playback(
        &self,
        times: LoopCount,
        start_ms: f64,
        span: PlaySpan,
        voice: usize,
    ) -> Result<(), PlayerError>;

    /// Stops the voice immediately, cancelling any envelope timers it has in flight.
    fn stop(&self, voice: usize) -> Result<(), PlayerError>;

    /// Pauses the voice, keeping its position.
    fn pause(&self, voice: usize) -> Result<(), PlayerError>;

    /// Resumes a paused voice from where it stopped.
    fn resume(&self, voice: usize) -> Result<(), PlayerError>;

    /// Returns true if the voice has playback queued.
    fn is_playing(&self, voice: usize) -> Result<bool, PlayerError>;

    /// Returns true if the voice is paused.
    fn is_paused(&self, voice: usize) -> Result<bool, PlayerError>;

    /// Sets the playback frequency, rescaling the playback rate by the ratio of the new
    /// frequency to the old one.
    fn set_frequency(&self, hz: f64, voice: usize) -> Result<(), PlayerError>;

    /// Returns the playback frequency.
    fn frequency(&self, voice: usize) -> Result<f64, PlayerError>;

    /// Sets the playback pitch (a possibly fractional MIDI pitch).
    fn set_pitch(&self, pitch: f64, voice: usize) -> Result<(), PlayerError>;

    /// Returns the playback pitch, derived from the frequency.
    fn pitch(&self, voice: usize) -> Result<f64, PlayerError>;

    /// Sets the panning (0 left, 127 right).
    fn set_panning(&self, panning: i32, voice: usize) -> Result<(), PlayerError>;

    /// Returns the panning.
    fn panning(&self, voice: usize) -> Result<i32, PlayerError>;

    /// Returns the volume most recently requested.
    fn volume(&self, voice: usize) -> Result<i32, PlayerError>;
}
