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
// Core mixing logic shared by the cpal output and the offline renderer.
use std::sync::Arc;

use parking_lot::RwLock;

use super::sample::AudioSample;

/// The mixer always produces interleaved stereo.
pub const CHANNELS: u16 = 2;

/// Mixes the voices of every attached sample into one stereo stream.
#[derive(Clone)]
pub struct AudioMixer {
    /// Samples whose voices are mixed.
    samples: Arc<RwLock<Vec<Arc<AudioSample>>>>,
    /// Output sample rate.
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(RwLock::new(Vec::new())),
            sample_rate,
        }
    }

    /// Attaches a sample to the mixer.
    pub fn add_sample(&self, sample: Arc<AudioSample>) {
        self.samples.write().push(sample);
    }

    /// Detaches a sample by name. Returns true if a sample was removed.
    pub fn remove_sample(&self, name: &str) -> bool {
        let mut samples = self.samples.write();
        let before = samples.len();
        samples.retain(|sample| sample.name() != name);
        samples.len() != before
    }

    /// Returns the number of attached samples.
    pub fn sample_count(&self) -> usize {
        self.samples.read().len()
    }

    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of output channels.
    pub fn num_channels(&self) -> u16 {
        CHANNELS
    }

    /// Mixes `frames` frames into the front of `output`, overwriting it. The mix is clamped to
    /// -1.0..=1.0.
    pub fn process_into_output(&self, output: &mut [f32], frames: usize) {
        let frames = frames.min(output.len() / CHANNELS as usize);
        let output = &mut output[..frames * CHANNELS as usize];
        output.fill(0.0);

        for sample in self.samples.read().iter() {
            sample.render_into(output, frames, self.sample_rate);
        }

        for value in output.iter_mut() {
            *value = value.clamp(-1.0, 1.0);
        }
    }

    /// Mixes the given number of frames into a new buffer.
    pub fn process_frames(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * CHANNELS as usize];
        self.process_into_output(&mut output, frames);
        output
    }
}

impl std::fmt::Debug for AudioMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioMixer")
            .field("samples", &self.sample_count())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
