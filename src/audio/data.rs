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
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{info, warn};

use super::error::LoadError;
use crate::util::sample_name;

/// Decoded audio held in memory. Samples are f32 and interleaved; only mono and stereo
/// material is supported.
pub struct SampleData {
    samples: Vec<f32>,
    channels: u16,
    frame_rate: u32,
}

impl SampleData {
    /// Wraps already decoded, interleaved samples.
    pub fn from_interleaved(
        samples: Vec<f32>,
        channels: u16,
        frame_rate: u32,
    ) -> Result<SampleData, LoadError> {
        if channels != 1 && channels != 2 {
            return Err(LoadError::UnsupportedChannels(channels as usize));
        }
        if samples.len() < channels as usize || frame_rate == 0 {
            return Err(LoadError::Empty);
        }
        Ok(SampleData {
            samples,
            channels,
            frame_rate,
        })
    }

    /// Decodes an audio file (WAV, AIFF, FLAC, and anything else symphonia reads) into memory.
    pub fn load(path: &Path) -> Result<SampleData, LoadError> {
        let file = File::open(path).map_err(|e| {
            LoadError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| LoadError::NoTrack(path.display().to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let frame_rate = params
            .sample_rate
            .ok_or_else(|| LoadError::UnknownSampleRate(path.display().to_string()))?;
        let mut channels = params.channels.map(|c| c.count());

        let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;
        let mut samples = Vec::new();

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // A corrupt packet is skipped rather than failing the whole file.
                    warn!(file = sample_name(path), error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            if channels.is_none() {
                channels = Some(spec.channels.count());
            }
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        let channels = channels.unwrap_or(0);
        if channels != 1 && channels != 2 {
            return Err(LoadError::UnsupportedChannels(channels));
        }

        let data = SampleData::from_interleaved(samples, channels as u16, frame_rate)?;
        info!(
            file = sample_name(path),
            channels,
            frame_rate,
            duration_ms = data.duration().as_millis(),
            "Sample loaded"
        );
        Ok(data)
    }

    /// Returns the number of channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the rate the sample was recorded at, in frames per second.
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Returns the number of frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Returns the length of the sample.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.frame_rate as f64)
    }

    /// Converts milliseconds to a frame count at the sample's frame rate.
    pub fn ms_to_frames(&self, ms: f64) -> usize {
        (self.frame_rate as f64 * (ms / 1000.0)) as usize
    }

    /// Returns the left and right values of a frame. Mono frames are duplicated.
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let channels = self.channels as usize;
        let base = index * channels;
        match self.samples.get(base..base + channels) {
            Some([mono]) => (*mono, *mono),
            Some([left, right]) => (*left, *right),
            _ => (0.0, 0.0),
        }
    }
}

impl std::fmt::Debug for SampleData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleData")
            .field("channels", &self.channels)
            .field("frame_rate", &self.frame_rate)
            .field("frames", &self.frames())
            .finish()
    }
}
