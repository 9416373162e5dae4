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

//! Amplitude envelopes.
//!
//! An [`Envelope`] describes how a voice's volume moves over time: a list of attack stages, a
//! delay to the sustain level, and a release that fades the voice out after the note ends.
//! The [`EnvelopeScheduler`] turns an envelope into timed volume ramps on a voice.
//!
//! Every voice has one [`VoiceTimers`] list. Starting an attack or a release cancels everything
//! still pending on it and opens a new activation; a timer belonging to an older activation can
//! never change the voice again, even if it was already about to fire.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::audio::{EnvelopeTarget, PlayerError, DEFAULT_VOLUME_DELAY_MS};
use crate::playsync::TimerHandle;
use crate::scheduler::{millis, Scheduler};

/// Default extra time between the end of a release ramp and the final stop, in milliseconds.
pub const DEFAULT_RELEASE_GUARD_MS: f64 = 5.0;

/// Errors raised when an envelope is built with bad values.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EnvelopeError {
    #[error("Attack times and volumes must have the same length ({times} times, {volumes} volumes)")]
    MismatchedAttack { times: usize, volumes: usize },

    #[error("Attack times should be zero or positive (found {0})")]
    AttackTime(f64),

    #[error("Attack volumes should be between 0.0 and 1.0 (found {0})")]
    AttackVolume(f64),

    #[error("Delay time must be 0 or greater (found {0})")]
    DelayTime(f64),

    #[error("Sustain volume must be between 0.0 and 1.0 (found {0})")]
    SustainVolume(f64),

    #[error("Release time must be 0 or greater (found {0})")]
    ReleaseTime(f64),
}

fn valid_time(ms: f64) -> bool {
    ms.is_finite() && ms >= 0.0
}

fn valid_fraction(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// An immutable envelope configuration.
///
/// Attack times and the delay time are relative to the previous point; the first attack time
/// is relative to the start of the note. The release time is relative to the end of the note,
/// so the fade goes past it. Volumes are fractions of the note's requested volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    attack_times: Vec<f64>,
    attack_volumes: Vec<f64>,
    delay_time: f64,
    sustain_volume: f64,
    release_time: f64,
}

impl Envelope {
    /// Creates an envelope, checking every value.
    pub fn new(
        attack_times: Vec<f64>,
        attack_volumes: Vec<f64>,
        delay_time: f64,
        sustain_volume: f64,
        release_time: f64,
    ) -> Result<Envelope, EnvelopeError> {
        if attack_times.len() != attack_volumes.len() {
            return Err(EnvelopeError::MismatchedAttack {
                times: attack_times.len(),
                volumes: attack_volumes.len(),
            });
        }
        if let Some(time) = attack_times.iter().find(|t| !valid_time(**t)) {
            return Err(EnvelopeError::AttackTime(*time));
        }
        if let Some(volume) = attack_volumes.iter().find(|v| !valid_fraction(**v)) {
            return Err(EnvelopeError::AttackVolume(*volume));
        }
        if !valid_time(delay_time) {
            return Err(EnvelopeError::DelayTime(delay_time));
        }
        if !valid_fraction(sustain_volume) {
            return Err(EnvelopeError::SustainVolume(sustain_volume));
        }
        if !valid_time(release_time) {
            return Err(EnvelopeError::ReleaseTime(release_time));
        }

        Ok(Envelope {
            attack_times,
            attack_volumes,
            delay_time,
            sustain_volume,
            release_time,
        })
    }

    /// Returns the attack stages as (time, volume) pairs.
    pub fn attack(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.attack_times
            .iter()
            .copied()
            .zip(self.attack_volumes.iter().copied())
    }

    /// Returns the attack times, in milliseconds.
    pub fn attack_times(&self) -> &[f64] {
        &self.attack_times
    }

    /// Returns the attack volumes.
    pub fn attack_volumes(&self) -> &[f64] {
        &self.attack_volumes
    }

    /// Returns the delay time, in milliseconds.
    pub fn delay_time(&self) -> f64 {
        self.delay_time
    }

    /// Returns the sustain volume.
    pub fn sustain_volume(&self) -> f64 {
        self.sustain_volume
    }

    /// Returns the release time, in milliseconds.
    pub fn release_time(&self) -> f64 {
        self.release_time
    }

    /// Returns the time from note-on until the sustain level is reached, in milliseconds.
    pub fn attack_delay_length(&self) -> f64 {
        self.attack_times.iter().sum::<f64>() + self.delay_time
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            attack_times: vec![2.0, 20.0],
            attack_volumes: vec![0.5, 0.8],
            delay_time: 20.0,
            sustain_volume: 1.0,
            release_time: 150.0,
        }
    }
}

/// A YAML representation of an envelope. Omitted fields take the default envelope's values.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EnvelopeConfig {
    attack_times: Option<Vec<f64>>,
    attack_volumes: Option<Vec<f64>>,
    delay_time: Option<f64>,
    sustain_volume: Option<f64>,
    release_time: Option<f64>,
}

impl EnvelopeConfig {
    /// Builds the envelope this configuration describes.
    pub fn to_envelope(&self) -> Result<Envelope, EnvelopeError> {
        let defaults = Envelope::default();
        Envelope::new(
            self.attack_times.clone().unwrap_or(defaults.attack_times),
            self.attack_volumes
                .clone()
                .unwrap_or(defaults.attack_volumes),
            self.delay_time.unwrap_or(defaults.delay_time),
            self.sustain_volume.unwrap_or(defaults.sustain_volume),
            self.release_time.unwrap_or(defaults.release_time),
        )
    }
}

/// The stage a voice's envelope is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attacking,
    Sustaining,
    Released,
}

struct TimerSlot {
    /// Bumped by every new activation. Timers carry the epoch they were scheduled under.
    epoch: u64,
    stage: EnvelopeStage,
    pending: Vec<TimerHandle>,
}

impl TimerSlot {
    fn cancel_pending(&mut self) {
        for timer in self.pending.drain(..) {
            timer.cancel();
        }
    }
}

/// The authoritative list of in-flight envelope timers for one voice.
pub struct VoiceTimers {
    slot: Mutex<TimerSlot>,
}

/// A new envelope activation. The voice's timer list stays locked while this is held, so the
/// activation's first volume change and its timers are installed before anything else can
/// touch the voice's envelope.
pub struct Activation<'a> {
    slot: MutexGuard<'a, TimerSlot>,
}

impl Activation<'_> {
    /// Returns the epoch timers of this activation must carry.
    pub fn epoch(&self) -> u64 {
        self.slot.epoch
    }

    /// Adds a timer to the voice's list.
    pub fn track(&mut self, timer: TimerHandle) {
        self.slot.pending.push(timer);
    }
}

impl VoiceTimers {
    /// Creates an empty, idle timer list.
    pub fn new() -> VoiceTimers {
        VoiceTimers {
            slot: Mutex::new(TimerSlot {
                epoch: 0,
                stage: EnvelopeStage::Idle,
                pending: Vec::new(),
            }),
        }
    }

    /// Cancels every pending timer and opens a new activation in the given stage.
    pub fn begin(&self, stage: EnvelopeStage) -> Activation<'_> {
        let mut slot = self.slot.lock();
        slot.cancel_pending();
        slot.epoch += 1;
        slot.stage = stage;
        Activation { slot }
    }

    /// Cancels every pending timer and returns the voice to idle.
    pub fn cancel_all(&self) {
        let mut slot = self.slot.lock();
        slot.cancel_pending();
        slot.epoch += 1;
        slot.stage = EnvelopeStage::Idle;
    }

    /// Runs `f` if the epoch is still current, holding the timer list locked while it runs.
    /// On success the voice moves to `stage`.
    pub fn run_if_current<R>(
        &self,
        epoch: u64,
        stage: EnvelopeStage,
        f: impl FnOnce() -> R,
    ) -> Option<R> {
        let mut slot = self.slot.lock();
        if slot.epoch != epoch {
            return None;
        }
        let result = f();
        slot.stage = stage;
        slot.pending.retain(|timer| !timer.is_finished());
        Some(result)
    }

    /// Runs `f` if the epoch is still current and then closes the activation.
    pub fn finish_if_current<R>(&self, epoch: u64, f: impl FnOnce() -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        if slot.epoch != epoch {
            return None;
        }
        let result = f();
        slot.cancel_pending();
        slot.epoch += 1;
        slot.stage = EnvelopeStage::Idle;
        Some(result)
    }

    /// Returns the current stage.
    pub fn stage(&self) -> EnvelopeStage {
        self.slot.lock().stage
    }

    /// Returns the current epoch.
    pub fn epoch(&self) -> u64 {
        self.slot.lock().epoch
    }

    /// Returns the number of timers that haven't fired or been cancelled.
    pub fn pending(&self) -> usize {
        self.slot
            .lock()
            .pending
            .iter()
            .filter(|timer| !timer.is_finished())
            .count()
    }
}

impl Default for VoiceTimers {
    fn default() -> Self {
        VoiceTimers::new()
    }
}

/// Realizes envelopes as timed volume ramps against any [`EnvelopeTarget`].
pub struct EnvelopeScheduler {
    scheduler: Arc<dyn Scheduler>,
    /// Extra time between the end of a release ramp and the final stop, in milliseconds.
    release_guard_ms: f64,
}

impl EnvelopeScheduler {
    /// Creates an envelope scheduler using the default release guard.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> EnvelopeScheduler {
        EnvelopeScheduler::with_release_guard(scheduler, DEFAULT_RELEASE_GUARD_MS)
    }

    /// Creates an envelope scheduler with the given release guard, in milliseconds.
    pub fn with_release_guard(
        scheduler: Arc<dyn Scheduler>,
        release_guard_ms: f64,
    ) -> EnvelopeScheduler {
        EnvelopeScheduler {
            scheduler,
            release_guard_ms: release_guard_ms.max(0.0),
        }
    }

    /// Returns the release guard, in milliseconds.
    pub fn release_guard_ms(&self) -> f64 {
        self.release_guard_ms
    }

    /// Starts the envelope on the voice: the volume fades to zero over the smoothing ramp, then
    /// each attack stage ramps toward its share of `volume`, then the delay ramps to the sustain
    /// level.
    pub fn perform_attack_delay_sustain<T>(
        &self,
        envelope: &Envelope,
        target: &Arc<T>,
        volume: i32,
        voice: usize,
    ) -> Result<(), PlayerError>
    where
        T: EnvelopeTarget + ?Sized + 'static,
    {
        if !(0..=127).contains(&volume) {
            warn!(volume, voice, "Envelope volume out of range");
            return Err(PlayerError::VolumeOutOfRange(volume));
        }

        let timers = target.envelope_timers(voice)?;
        let mut activation = timers.begin(EnvelopeStage::Attacking);
        let epoch = activation.epoch();

        target.set_volume(0, DEFAULT_VOLUME_DELAY_MS, voice)?;

        let mut next_time = 0.0;
        for (attack_time, attack_volume) in envelope.attack() {
            let level = (volume as f64 * attack_volume) as i32;
            let timer = self.schedule_volume(
                target,
                voice,
                epoch,
                next_time,
                level,
                attack_time,
                EnvelopeStage::Attacking,
            );
            activation.track(timer);
            next_time += attack_time;
        }

        let level = (volume as f64 * envelope.sustain_volume()) as i32;
        let timer = self.schedule_volume(
            target,
            voice,
            epoch,
            next_time,
            level,
            envelope.delay_time(),
            EnvelopeStage::Sustaining,
        );
        activation.track(timer);

        debug!(
            voice,
            volume,
            stages = envelope.attack_times().len() + 1,
            "Scheduled envelope attack"
        );
        Ok(())
    }

    /// Releases the voice: pending attack and delay stages are cancelled, the volume ramps to
    /// zero over the release time, and the voice is stopped once the ramp has finished.
    pub fn perform_release_and_stop<T>(
        &self,
        envelope: &Envelope,
        target: &Arc<T>,
        voice: usize,
    ) -> Result<(), PlayerError>
    where
        T: EnvelopeTarget + ?Sized + 'static,
    {
        let timers = target.envelope_timers(voice)?;
        let mut activation = timers.begin(EnvelopeStage::Released);
        let epoch = activation.epoch();

        target.set_volume(0, envelope.release_time(), voice)?;

        let stop_target = Arc::clone(target);
        let timer = self.scheduler.schedule(
            millis(envelope.release_time() + self.release_guard_ms),
            Box::new(move || {
                let Ok(timers) = stop_target.envelope_timers(voice) else {
                    return;
                };
                let stopped = timers.finish_if_current(epoch, || stop_target.silence(voice));
                if let Some(Err(e)) = stopped {
                    warn!(voice, error = %e, "Unable to stop released voice");
                }
            }),
        );
        activation.track(timer);

        debug!(
            voice,
            release_ms = envelope.release_time(),
            "Scheduled envelope release"
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn schedule_volume<T>(
        &self,
        target: &Arc<T>,
        voice: usize,
        epoch: u64,
        at_ms: f64,
        volume: i32,
        ramp_ms: f64,
        stage: EnvelopeStage,
    ) -> TimerHandle
    where
        T: EnvelopeTarget + ?Sized + 'static,
    {
        let target = Arc::clone(target);
        self.scheduler.schedule(
            millis(at_ms),
            Box::new(move || {
                let Ok(timers) = target.envelope_timers(voice) else {
                    return;
                };
                let applied =
                    timers.run_if_current(epoch, stage, || target.set_volume(volume, ramp_ms, voice));
                if let Some(Err(e)) = applied {
                    warn!(voice, error = %e, "Unable to apply envelope stage");
                }
            }),
        )
    }
}

impl std::fmt::Debug for EnvelopeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeScheduler")
            .field("release_guard_ms", &self.release_guard_ms)
            .finish()
    }
}
