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

//! Offline rendering.
//!
//! A performance is rendered on the virtual clock of a [`ManualScheduler`]: the clock is moved
//! to the start of each block, firing the note and envelope timers due by then, and the block
//! is mixed. The result doesn't depend on how fast the machine is.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, span, Level};

use crate::audio::wav::WavOutput;
use crate::audio::{AudioMixer, CHANNELS};
use crate::config::{ConfigError, Performance};
use crate::playback::{performance_length_ms, Playback};
use crate::registry::Registry;
use crate::scheduler::ManualScheduler;
use crate::util::format_ms;

/// Frames mixed between clock steps.
pub const BLOCK_FRAMES: usize = 64;

/// Errors raised while rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("WAV output error: {0}")]
    Wav(#[from] hound::Error),
}

/// What a render produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    /// Notes scheduled.
    pub notes: usize,
    /// Frames written.
    pub frames: u64,
    /// Length of the rendered audio.
    pub length: Duration,
}

/// Steps the clock and the mixer together until `end_ms`, handing each mixed block to `sink`.
/// Returns the number of frames produced.
pub fn render_blocks<E>(
    clock: &ManualScheduler,
    mixer: &AudioMixer,
    end_ms: f64,
    mut sink: impl FnMut(&[f32]) -> Result<(), E>,
) -> Result<u64, E> {
    let sample_rate = mixer.sample_rate() as u64;
    if sample_rate == 0 {
        return Ok(0);
    }
    let total_frames = (end_ms.max(0.0) * sample_rate as f64 / 1000.0).ceil() as u64;
    let mut buffer = vec![0.0; BLOCK_FRAMES * CHANNELS as usize];

    let mut written = 0;
    while written < total_frames {
        let frames = (total_frames - written).min(BLOCK_FRAMES as u64) as usize;
        clock.advance_to(Duration::from_nanos(written * 1_000_000_000 / sample_rate));
        mixer.process_into_output(&mut buffer, frames);
        sink(&buffer[..frames * CHANNELS as usize])?;
        written += frames as u64;
    }
    clock.advance_to(Duration::from_nanos(written * 1_000_000_000 / sample_rate));

    Ok(written)
}

/// Renders a performance into a stereo WAV file.
pub fn render_performance(
    performance: &Performance,
    output: &Path,
) -> Result<RenderSummary, RenderError> {
    let span = span!(Level::INFO, "render");
    let _enter = span.enter();

    let registry = Registry::new();
    let sources = performance.voice_sources(&registry)?;
    let events = performance.note_events()?;

    let clock = Arc::new(ManualScheduler::new());
    let mixer = AudioMixer::new(performance.sample_rate());
    for source in &sources {
        mixer.add_sample(source.sample.clone());
    }

    let end_ms = performance_length_ms(&events, &sources, performance.release_guard_ms());
    let playback = Playback::new(
        sources,
        clock.clone(),
        performance.playback_options(),
        &registry,
    );
    let notes = playback.audio(&events);

    let mut wav = WavOutput::create(output, performance.sample_rate())?;
    let frames = render_blocks(&clock, &mixer, end_ms, |block| wav.write(block))?;
    wav.finalize()?;
    registry.shutdown_all();

    let length = Duration::from_secs_f64(frames as f64 / performance.sample_rate() as f64);
    info!(
        notes,
        frames,
        length = format_ms(length.as_secs_f64() * 1000.0),
        output = %output.display(),
        "Rendered performance"
    );
    Ok(RenderSummary {
        notes,
        frames,
        length,
    })
}
