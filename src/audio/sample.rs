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
use std::f32::consts::FRAC_PI_4;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::data::SampleData;
use super::error::{LoadError, PlayerError};
use super::ramp::LinearRamp;
use super::{EnvelopeTarget, LoopCount, PlaySpan, SamplePlayer, CENTER_PANNING};
use crate::envelope::VoiceTimers;
use crate::pitch::{frequency_to_pitch, pitch_to_frequency, Pitch, A4};
use crate::registry::{register_new, RegistrationId, Registry, Shutdown};
use crate::util::sample_name;
use crate::voice::{VoicePool, VoicePoolError};

/// Options for a new [`AudioSample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSampleOptions {
    /// The pitch of the recorded sound. Voices start out playing at this pitch.
    pub actual_pitch: Pitch,
    /// The initial volume of every voice (0-127).
    pub volume: i32,
    /// The number of voices.
    pub voices: usize,
}

impl Default for AudioSampleOptions {
    fn default() -> Self {
        AudioSampleOptions {
            actual_pitch: Pitch::Midi(A4),
            volume: 127,
            voices: 16,
        }
    }
}

/// The span of the sample a voice is working through, in frames.
#[derive(Debug, Clone, Copy)]
struct Region {
    start: usize,
    end: usize,
    remaining: LoopCount,
    /// The fractional read position.
    position: f64,
}

impl Region {
    /// Moves to the next pass over the region. Returns false once every pass has played.
    fn wrap(&mut self) -> bool {
        match self.remaining {
            LoopCount::Forever => {}
            LoopCount::Times(times) if times > 1 => self.remaining = LoopCount::Times(times - 1),
            LoopCount::Times(_) => return false,
        }
        let length = (self.end - self.start) as f64;
        self.position = self.start as f64 + (self.position - self.end as f64) % length;
        true
    }
}

/// Per-voice acoustic state.
#[derive(Debug)]
struct VoiceState {
    frequency: f64,
    /// Playback rate relative to the sample's own frame rate.
    rate: f64,
    panning: i32,
    /// The panning mapped onto -1.0 (left) to 1.0 (right).
    pan: f32,
    volume: i32,
    amplitude: LinearRamp,
    paused: bool,
    region: Option<Region>,
}

impl VoiceState {
    fn new(frequency: f64, volume: i32) -> VoiceState {
        VoiceState {
            frequency,
            rate: 1.0,
            panning: CENTER_PANNING,
            pan: panning_to_pan(CENTER_PANNING),
            volume,
            amplitude: LinearRamp::new(volume as f32 / 127.0),
            paused: false,
            region: None,
        }
    }
}

/// Maps panning (0 to 127) onto a bipolar control value (-1.0 to 1.0).
fn panning_to_pan(panning: i32) -> f32 {
    panning as f32 / 127.0 * 2.0 - 1.0
}

/// Equal power gains for the left and right channels.
fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// A sample held in memory and played through a fixed array of voices. Each voice has its
/// own frequency, panning, volume and loop state, so one recording can sound several pitches
/// at once.
pub struct AudioSample {
    name: String,
    data: Arc<SampleData>,
    actual_pitch: Pitch,
    actual_frequency: f64,
    voices: Vec<Mutex<VoiceState>>,
    timers: Vec<VoiceTimers>,
    pool: Mutex<VoicePool>,
    registration: RegistrationId,
}

impl AudioSample {
    /// Loads a sample from disk and registers it.
    pub fn load(
        path: &Path,
        options: AudioSampleOptions,
        registry: &Registry,
    ) -> Result<Arc<AudioSample>, LoadError> {
        let data = Arc::new(SampleData::load(path)?);
        Ok(AudioSample::from_data(
            &sample_name(path),
            data,
            options,
            registry,
        )?)
    }

    /// Creates a sample from decoded data and registers it.
    pub fn from_data(
        name: &str,
        data: Arc<SampleData>,
        options: AudioSampleOptions,
        registry: &Registry,
    ) -> Result<Arc<AudioSample>, PlayerError> {
        if options.voices == 0 {
            return Err(PlayerError::VoiceCountOutOfRange(options.voices));
        }
        if !(0..=127).contains(&options.volume) {
            return Err(PlayerError::VolumeOutOfRange(options.volume));
        }

        let actual_frequency = options.actual_pitch.to_frequency();
        if !actual_frequency.is_finite() || actual_frequency <= 0.0 {
            return Err(PlayerError::FrequencyOutOfRange(actual_frequency));
        }

        let sample = register_new(registry, |registration| {
            Arc::new(AudioSample {
                name: name.to_string(),
                data,
                actual_pitch: options.actual_pitch,
                actual_frequency,
                voices: (0..options.voices)
                    .map(|_| Mutex::new(VoiceState::new(actual_frequency, options.volume)))
                    .collect(),
                timers: (0..options.voices).map(|_| VoiceTimers::new()).collect(),
                pool: Mutex::new(VoicePool::new(options.voices)),
                registration,
            })
        });

        info!(
            sample = sample.name,
            voices = options.voices,
            actual_pitch = %sample.actual_pitch,
            "Sample ready"
        );
        Ok(sample)
    }

    /// Returns the sample's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the sample's registration.
    pub fn registration(&self) -> RegistrationId {
        self.registration
    }

    /// Returns the decoded audio.
    pub fn data(&self) -> &Arc<SampleData> {
        &self.data
    }

    /// Returns the pitch of the recorded sound.
    pub fn actual_pitch(&self) -> f64 {
        match self.actual_pitch {
            Pitch::Midi(note) => note as f64,
            Pitch::Frequency(hz) => frequency_to_pitch(hz),
        }
    }

    /// Returns the frequency of the recorded sound.
    pub fn actual_frequency(&self) -> f64 {
        self.actual_frequency
    }

    /// Returns the sample's own frame rate.
    pub fn frame_rate(&self) -> u32 {
        self.data.frame_rate()
    }

    /// Binds the lowest free voice to the pitch. Returns None when every voice is busy.
    pub fn allocate_voice_for_pitch(&self, pitch: Pitch) -> Option<usize> {
        self.pool.lock().allocate_voice_for_pitch(pitch)
    }

    /// Returns the first voice bound to the pitch.
    pub fn voice_for_pitch(&self, pitch: Pitch) -> Option<usize> {
        self.pool.lock().voice_for_pitch(pitch)
    }

    /// Frees the first voice bound to the pitch.
    pub fn deallocate_voice_for_pitch(&self, pitch: Pitch) -> Result<usize, VoicePoolError> {
        self.pool.lock().deallocate_voice_for_pitch(pitch)
    }

    /// Frees the first voice bound to the pitch and runs `release` on it. The pool stays locked
    /// until `release` returns, so the voice can't be handed to another note half released.
    /// Returns the voice, or None if the pitch isn't sounding.
    pub fn release_voice_for_pitch(
        &self,
        pitch: Pitch,
        release: impl FnOnce(usize),
    ) -> Option<usize> {
        let mut pool = self.pool.lock();
        let voice = pool.deallocate_voice_for_pitch(pitch).ok()?;
        release(voice);
        Some(voice)
    }

    /// Unbinds every voice from its pitch.
    pub fn release_all_voices(&self) {
        self.pool.lock().clear();
    }

    /// Returns the number of voices not bound to a pitch.
    pub fn free_voice_count(&self) -> usize {
        self.pool.lock().free_count()
    }

    /// Returns the voice's playback rate relative to the sample's frame rate.
    pub fn playback_rate(&self, voice: usize) -> Result<f64, PlayerError> {
        Ok(self.voice("playback_rate", voice)?.lock().rate)
    }

    /// Returns the voice's current (possibly ramping) amplitude, from 0.0 to 1.0.
    pub fn current_amplitude(&self, voice: usize) -> Result<f32, PlayerError> {
        Ok(self.voice("current_amplitude", voice)?.lock().amplitude.value())
    }

    /// Mixes every playing voice into an interleaved stereo buffer. Voices are resampled to the
    /// output rate with linear interpolation, and volume ramps advance once per output frame.
    pub fn render_into(&self, out: &mut [f32], frames: usize, output_rate: u32) {
        let frames = frames.min(out.len() / 2);
        let dt = 1.0 / output_rate as f64;
        let rate_ratio = self.data.frame_rate() as f64 / output_rate as f64;

        for voice in &self.voices {
            let mut state = voice.lock();
            if state.paused || state.region.is_none() {
                continue;
            }

            let step = state.rate * rate_ratio;
            let (left_gain, right_gain) = pan_gains(state.pan);
            for frame in 0..frames {
                let Some(region) = state.region.as_mut() else {
                    break;
                };
                if region.end <= region.start
                    || (region.position >= region.end as f64 && !region.wrap())
                {
                    state.region = None;
                    break;
                }

                let index = region.position as usize;
                let fraction = (region.position - index as f64) as f32;
                let (l0, r0) = self.data.frame(index);
                let (l1, r1) = if index + 1 < region.end {
                    self.data.frame(index + 1)
                } else {
                    (l0, r0)
                };
                region.position += step;

                let amplitude = state.amplitude.next(dt);
                let left = l0 + (l1 - l0) * fraction;
                let right = r0 + (r1 - r0) * fraction;
                out[frame * 2] += left * amplitude * left_gain;
                out[frame * 2 + 1] += right * amplitude * right_gain;
            }
        }
    }

    fn voice(&self, operation: &str, voice: usize) -> Result<&Mutex<VoiceState>, PlayerError> {
        match self.voices.get(voice) {
            Some(state) => Ok(state),
            None => self.rejected(
                operation,
                PlayerError::VoiceOutOfRange {
                    voice,
                    max_voices: self.voices.len(),
                },
            ),
        }
    }

    fn rejected<T>(&self, operation: &str, error: PlayerError) -> Result<T, PlayerError> {
        warn!(sample = self.name, operation, error = %error, "Rejected sample operation");
        Err(error)
    }

    fn region(
        &self,
        operation: &str,
        start_ms: f64,
        span: PlaySpan,
        remaining: LoopCount,
    ) -> Result<Region, PlayerError> {
        let frames = self.data.frames();
        let out_of_range = PlayerError::RegionOutOfRange {
            start_ms,
            length_ms: self.data.duration().as_secs_f64() * 1000.0,
        };
        if !start_ms.is_finite() || start_ms < 0.0 {
            return self.rejected(operation, out_of_range);
        }
        let start = self.data.ms_to_frames(start_ms);
        if start >= frames {
            return self.rejected(operation, out_of_range);
        }
        let end = match span {
            PlaySpan::ToEnd => frames,
            PlaySpan::Millis(ms) if ms.is_finite() && ms >= 0.0 => {
                (start + self.data.ms_to_frames(ms)).min(frames)
            }
            PlaySpan::Millis(_) => return self.rejected(operation, out_of_range),
        };
        Ok(Region {
            start,
            end,
            remaining,
            position: start as f64,
        })
    }

    fn start_region(&self, voice: usize, region: Region) {
        let mut state = self.voices[voice].lock();
        state.region = Some(region);
        state.paused = false;
    }
}

impl EnvelopeTarget for AudioSample {
    fn set_volume(&self, volume: i32, delay_ms: f64, voice: usize) -> Result<(), PlayerError> {
        if !(0..=127).contains(&volume) {
            return self.rejected("set_volume", PlayerError::VolumeOutOfRange(volume));
        }
        if !delay_ms.is_finite() || delay_ms < 0.0 {
            return self.rejected("set_volume", PlayerError::DelayOutOfRange(delay_ms));
        }
        let mut state = self.voice("set_volume", voice)?.lock();
        state.volume = volume;
        state
            .amplitude
            .set(volume as f32 / 127.0, delay_ms / 1000.0);
        Ok(())
    }

    fn silence(&self, voice: usize) -> Result<(), PlayerError> {
        let mut state = self.voice("silence", voice)?.lock();
        state.region = None;
        state.paused = false;
        Ok(())
    }

    fn envelope_timers(&self, voice: usize) -> Result<&VoiceTimers, PlayerError> {
        self.voice("envelope_timers", voice)?;
        Ok(&self.timers[voice])
    }
}

impl SamplePlayer for AudioSample {
    fn max_voices(&self) -> usize {
        self.voices.len()
    }

    fn play(&self, start_ms: f64, span: PlaySpan, voice: usize) -> Result<(), PlayerError> {
        self.voice("play", voice)?;
        let region = self.region("play", start_ms, span, LoopCount::Times(1))?;
        // Restarting replaces whatever was queued rather than waiting for it to finish.
        self.start_region(voice, region);
        debug!(sample = self.name, voice, start_ms, "Playing");
        Ok(())
    }

    fn loop_playback(
        &self,
        times: LoopCount,
        start_ms: f64,
        span: PlaySpan,
        voice: usize,
    ) -> Result<(), PlayerError> {
        self.voice("loop_playback", voice)?;
        if times == LoopCount::Times(0) {
            return self.rejected("loop_playback", PlayerError::LoopCountOutOfRange);
        }
        let region = self.region("loop_playback", start_ms, span, times)?;
        self.start_region(voice, region);
        debug!(sample = self.name, voice, start_ms, ?times, "Looping");
        Ok(())
    }

    fn stop(&self, voice: usize) -> Result<(), PlayerError> {
        self.voice("stop", voice)?;
        self.timers[voice].cancel_all();
        self.silence(voice)
    }

    fn pause(&self, voice: usize) -> Result<(), PlayerError> {
        let mut state = self.voice("pause", voice)?.lock();
        if state.paused {
            warn!(sample = self.name, voice, "Sample is already paused");
        } else {
            state.paused = true;
        }
        Ok(())
    }

    fn resume(&self, voice: usize) -> Result<(), PlayerError> {
        let mut state = self.voice("resume", voice)?.lock();
        if state.paused {
            state.paused = false;
        } else {
            warn!(sample = self.name, voice, "Sample is already playing");
        }
        Ok(())
    }

    fn is_playing(&self, voice: usize) -> Result<bool, PlayerError> {
        Ok(self.voice("is_playing", voice)?.lock().region.is_some())
    }

    fn is_paused(&self, voice: usize) -> Result<bool, PlayerError> {
        Ok(self.voice("is_paused", voice)?.lock().paused)
    }

    fn set_frequency(&self, hz: f64, voice: usize) -> Result<(), PlayerError> {
        if !hz.is_finite() || hz <= 0.0 {
            return self.rejected("set_frequency", PlayerError::FrequencyOutOfRange(hz));
        }
        let mut state = self.voice("set_frequency", voice)?.lock();
        state.rate *= hz / state.frequency;
        state.frequency = hz;
        Ok(())
    }

    fn frequency(&self, voice: usize) -> Result<f64, PlayerError> {
        Ok(self.voice("frequency", voice)?.lock().frequency)
    }

    fn set_pitch(&self, pitch: f64, voice: usize) -> Result<(), PlayerError> {
        self.set_frequency(pitch_to_frequency(pitch), voice)
    }

    fn pitch(&self, voice: usize) -> Result<f64, PlayerError> {
        Ok(frequency_to_pitch(self.frequency(voice)?))
    }

    fn set_panning(&self, panning: i32, voice: usize) -> Result<(), PlayerError> {
        if !(0..=127).contains(&panning) {
            return self.rejected("set_panning", PlayerError::PanningOutOfRange(panning));
        }
        let mut state = self.voice("set_panning", voice)?.lock();
        state.panning = panning;
        state.pan = panning_to_pan(panning);
        Ok(())
    }

    fn panning(&self, voice: usize) -> Result<i32, PlayerError> {
        Ok(self.voice("panning", voice)?.lock().panning)
    }

    fn volume(&self, voice: usize) -> Result<i32, PlayerError> {
        Ok(self.voice("volume", voice)?.lock().volume)
    }
}

impl Shutdown for AudioSample {
    fn shutdown(&self) {
        for (voice, state) in self.voices.iter().enumerate() {
            self.timers[voice].cancel_all();
            let mut state = state.lock();
            state.region = None;
            state.paused = false;
            state.volume = 0;
            state.amplitude = LinearRamp::new(0.0);
        }
        self.release_all_voices();
        info!(sample = self.name, "Sample shut down");
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl std::fmt::Debug for AudioSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSample")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("actual_frequency", &self.actual_frequency)
            .field("voices", &self.voices.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::envelope::{Envelope, EnvelopeScheduler, EnvelopeStage};
    use crate::scheduler::{ManualScheduler, Scheduler};
    use crate::testutil::write_wav;

    /// A 100ms mono sample of constant value at 1000 frames per second.
    fn constant_sample(registry: &Registry, voices: usize) -> Arc<AudioSample> {
        let data = SampleData::from_interleaved(vec![1.0; 100], 1, 1000).unwrap();
        AudioSample::from_data(
            "constant",
            Arc::new(data),
            AudioSampleOptions {
                voices,
                ..Default::default()
            },
            registry,
        )
        .unwrap()
    }

    fn render(sample: &AudioSample, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        sample.render_into(&mut out, frames, 1000);
        out
    }

    #[test]
    fn test_initial_state() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 4);

        assert_eq!(sample.max_voices(), 4);
        assert_eq!(sample.free_voice_count(), 4);
        assert_eq!(sample.actual_pitch(), 69.0);
        assert_eq!(sample.actual_frequency(), 440.0);
        assert_eq!(sample.frame_rate(), 1000);
        for voice in 0..4 {
            assert_eq!(sample.frequency(voice), Ok(440.0));
            assert_eq!(sample.panning(voice), Ok(63));
            assert_eq!(sample.volume(voice), Ok(127));
            assert_eq!(sample.is_playing(voice), Ok(false));
            assert_eq!(sample.is_paused(voice), Ok(false));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_bad_options() {
        let registry = Registry::new();
        let data = Arc::new(SampleData::from_interleaved(vec![0.0; 10], 1, 1000).unwrap());
        let result = AudioSample::from_data(
            "none",
            data.clone(),
            AudioSampleOptions {
                voices: 0,
                ..Default::default()
            },
            &registry,
        );
        assert_eq!(result.unwrap_err(), PlayerError::VoiceCountOutOfRange(0));

        let result = AudioSample::from_data(
            "loud",
            data,
            AudioSampleOptions {
                volume: 200,
                ..Default::default()
            },
            &registry,
        );
        assert_eq!(result.unwrap_err(), PlayerError::VolumeOutOfRange(200));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_set_frequency_scales_rate() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 2);

        sample.set_frequency(880.0, 0).unwrap();
        assert_eq!(sample.frequency(0), Ok(880.0));
        assert!((sample.playback_rate(0).unwrap() - 2.0).abs() < 1e-12);
        assert!((sample.pitch(0).unwrap() - 81.0).abs() < 1e-9);

        sample.set_frequency(220.0, 0).unwrap();
        assert!((sample.playback_rate(0).unwrap() - 0.5).abs() < 1e-12);

        sample.set_pitch(60.0, 1).unwrap();
        assert!((sample.pitch(1).unwrap() - 60.0).abs() < 1e-9);
        let expected = pitch_to_frequency(60.0) / 440.0;
        assert!((sample.playback_rate(1).unwrap() - expected).abs() < 1e-12);

        assert_eq!(
            sample.set_frequency(0.0, 0),
            Err(PlayerError::FrequencyOutOfRange(0.0))
        );
        assert_eq!(sample.frequency(0), Ok(220.0));
    }

    #[test]
    fn test_out_of_range_arguments_leave_state_alone() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 2);

        assert_eq!(
            sample.set_panning(200, 0),
            Err(PlayerError::PanningOutOfRange(200))
        );
        assert_eq!(
            sample.set_volume(-1, 0.0, 0),
            Err(PlayerError::VolumeOutOfRange(-1))
        );
        assert_eq!(
            sample.set_volume(100, -3.0, 0),
            Err(PlayerError::DelayOutOfRange(-3.0))
        );
        assert_eq!(
            sample.play(0.0, PlaySpan::ToEnd, 2),
            Err(PlayerError::VoiceOutOfRange {
                voice: 2,
                max_voices: 2
            })
        );
        assert!(matches!(
            sample.play(500.0, PlaySpan::ToEnd, 0),
            Err(PlayerError::RegionOutOfRange { .. })
        ));
        assert_eq!(
            sample.loop_playback(LoopCount::Times(0), 0.0, PlaySpan::ToEnd, 0),
            Err(PlayerError::LoopCountOutOfRange)
        );

        assert_eq!(sample.panning(0), Ok(63));
        assert_eq!(sample.volume(0), Ok(127));
        assert_eq!(sample.is_playing(0), Ok(false));
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 1);

        sample.play(0.0, PlaySpan::ToEnd, 0).unwrap();
        sample.pause(0).unwrap();
        sample.pause(0).unwrap();
        assert_eq!(sample.is_paused(0), Ok(true));

        // Nothing is rendered while paused, and the position is kept.
        assert!(render(&sample, 10).iter().all(|s| *s == 0.0));

        sample.resume(0).unwrap();
        sample.resume(0).unwrap();
        assert_eq!(sample.is_paused(0), Ok(false));
        let out = render(&sample, 101);
        assert!(out[198] > 0.0);
        assert_eq!(sample.is_playing(0), Ok(false));
    }

    #[test]
    fn test_render_plays_region_once() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 1);

        sample.set_panning(0, 0).unwrap();
        sample.play(0.0, PlaySpan::ToEnd, 0).unwrap();
        let out = render(&sample, 150);

        for frame in 0..100 {
            assert!((out[frame * 2] - 1.0).abs() < 1e-6, "frame {frame}");
            assert!(out[frame * 2 + 1].abs() < 1e-6);
        }
        for frame in 100..150 {
            assert_eq!(out[frame * 2], 0.0);
        }
        assert_eq!(sample.is_playing(0), Ok(false));
    }

    #[test]
    fn test_loop_times() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 1);

        sample
            .loop_playback(LoopCount::Times(3), 20.0, PlaySpan::Millis(10.0), 0)
            .unwrap();
        let out = render(&sample, 40);
        assert!(out[29 * 2] > 0.0);
        assert_eq!(out[30 * 2], 0.0);
        assert_eq!(sample.is_playing(0), Ok(false));

        sample
            .loop_playback(LoopCount::Forever, 0.0, PlaySpan::Millis(10.0), 0)
            .unwrap();
        render(&sample, 1000);
        assert_eq!(sample.is_playing(0), Ok(true));
        sample.stop(0).unwrap();
        assert_eq!(sample.is_playing(0), Ok(false));
    }

    #[test]
    fn test_volume_ramps_over_delay() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 1);

        sample.set_volume(0, 0.0, 0).unwrap();
        sample.set_volume(127, 10.0, 0).unwrap();
        assert_eq!(sample.current_amplitude(0), Ok(0.0));

        sample.loop_playback(LoopCount::Forever, 0.0, PlaySpan::ToEnd, 0).unwrap();
        render(&sample, 5);
        let halfway = sample.current_amplitude(0).unwrap();
        assert!((halfway - 0.5).abs() < 1e-3);
        render(&sample, 5);
        assert_eq!(sample.current_amplitude(0), Ok(1.0));
    }

    #[test]
    fn test_resampling_follows_frequency() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 1);

        sample.set_frequency(880.0, 0).unwrap();
        sample.play(0.0, PlaySpan::ToEnd, 0).unwrap();
        let out = render(&sample, 60);
        assert!(out[49 * 2] > 0.0);
        assert_eq!(out[50 * 2], 0.0);
    }

    #[test]
    fn test_stop_cancels_envelope_timers() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 1);
        let clock = Arc::new(ManualScheduler::new());
        let envelopes = EnvelopeScheduler::new(clock.clone());
        let envelope = Envelope::default();

        envelopes
            .perform_attack_delay_sustain(&envelope, &sample, 100, 0)
            .unwrap();
        sample.play(0.0, PlaySpan::ToEnd, 0).unwrap();
        envelopes
            .perform_release_and_stop(&envelope, &sample, 0)
            .unwrap();
        sample.stop(0).unwrap();
        assert_eq!(sample.envelope_timers(0).unwrap().stage(), EnvelopeStage::Idle);
        assert_eq!(sample.envelope_timers(0).unwrap().pending(), 0);

        // The voice is reused before the old release stop would have fired.
        sample.play(0.0, PlaySpan::ToEnd, 0).unwrap();
        clock.advance(Duration::from_millis(200));
        assert_eq!(sample.is_playing(0), Ok(true));
        assert_eq!(clock.now(), Duration::from_millis(200));
    }

    #[test]
    fn test_release_voice_for_pitch() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 2);

        sample.allocate_voice_for_pitch(Pitch::Midi(60)).unwrap();
        sample.allocate_voice_for_pitch(Pitch::Midi(60)).unwrap();
        sample.play(0.0, PlaySpan::ToEnd, 0).unwrap();

        let mut released = Vec::new();
        let voice = sample.release_voice_for_pitch(Pitch::Midi(60), |voice| {
            sample.stop(voice).unwrap();
            released.push(voice);
        });
        assert_eq!(voice, Some(0));
        assert_eq!(released, vec![0]);
        assert_eq!(sample.is_playing(0), Ok(false));
        assert_eq!(sample.voice_for_pitch(Pitch::Midi(60)), Some(1));

        assert_eq!(sample.release_voice_for_pitch(Pitch::Midi(60), |_| {}), Some(1));
        assert_eq!(sample.release_voice_for_pitch(Pitch::Midi(60), |_| {}), None);
        assert_eq!(sample.free_voice_count(), 2);
    }

    #[test]
    fn test_shutdown_silences_everything() {
        let registry = Registry::new();
        let sample = constant_sample(&registry, 2);

        let voice = sample.allocate_voice_for_pitch(Pitch::Midi(60)).unwrap();
        sample.play(0.0, PlaySpan::ToEnd, voice).unwrap();
        registry.shutdown_all();

        assert_eq!(sample.is_playing(voice), Ok(false));
        assert_eq!(sample.volume(voice), Ok(0));
        assert_eq!(sample.free_voice_count(), 2);
        assert!(render(&sample, 10).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piano.wav");
        write_wav(&path, &[vec![0.25; 441], vec![-0.25; 441]], 44100).unwrap();

        let registry = Registry::new();
        let sample = AudioSample::load(
            &path,
            AudioSampleOptions {
                actual_pitch: Pitch::Frequency(261.63),
                voices: 3,
                ..Default::default()
            },
            &registry,
        )
        .unwrap();

        assert_eq!(sample.name(), "piano.wav");
        assert_eq!(sample.max_voices(), 3);
        assert_eq!(sample.frame_rate(), 44100);
        assert_eq!(sample.frequency(2), Ok(261.63));
        assert!((sample.actual_pitch() - 60.0).abs() < 0.01);
    }
}
