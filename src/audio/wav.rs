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
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::mixer::CHANNELS;

/// Writes interleaved stereo mixer output to a 32-bit float WAV file.
pub struct WavOutput {
    writer: WavWriter<BufWriter<File>>,
    frames: u64,
}

impl WavOutput {
    /// Creates the file, replacing anything already there.
    pub fn create(path: &Path, sample_rate: u32) -> Result<WavOutput, hound::Error> {
        let writer = WavWriter::create(
            path,
            WavSpec {
                channels: CHANNELS,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        )?;
        Ok(WavOutput { writer, frames: 0 })
    }

    /// Appends interleaved stereo samples.
    pub fn write(&mut self, samples: &[f32]) -> Result<(), hound::Error> {
        for sample in samples {
            self.writer.write_sample(*sample)?;
        }
        self.frames += (samples.len() / CHANNELS as usize) as u64;
        Ok(())
    }

    /// Returns the number of frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Updates the header and closes the file.
    pub fn finalize(self) -> Result<(), hound::Error> {
        self.writer.finalize()
    }
}
