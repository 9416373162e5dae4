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

//! Turns timed notes into voice allocations, envelopes and playback.
//!
//! Every note becomes a note-on and a note-off timer. Note-on allocates a voice on the note's
//! sample, starts the envelope attack (or sets the volume directly) and starts playback.
//! Note-off hands the voice to the envelope release (or stops it outright) and returns the
//! voice to the pool.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::audio::{
    AudioSample, EnvelopeTarget, LoopCount, PlaySpan, PlayerError, SamplePlayer,
    CENTER_PANNING, DEFAULT_VOLUME_DELAY_MS,
};
use crate::envelope::{Envelope, EnvelopeScheduler, DEFAULT_RELEASE_GUARD_MS};
use crate::pitch::Pitch;
use crate::playsync::TimerHandle;
use crate::registry::{register_new, RegistrationId, Registry, Shutdown};
use crate::scheduler::{millis, Scheduler};

/// Errors raised by playback requests.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlaybackError {
    #[error("No voice source at index {index} ({count} configured)")]
    UnknownSource { index: usize, count: usize },

    #[error(transparent)]
    Player(#[from] PlayerError),
}

/// A timed note. Rests carry no pitch and are never played.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// Start time, in milliseconds from when the note list is scheduled.
    pub onset_ms: f64,
    /// Length, in milliseconds. Zero marks a chord member that takes the length of the next
    /// note with a length.
    pub duration_ms: f64,
    pub pitch: Option<Pitch>,
    pub velocity: i32,
    /// Index of the voice source that plays the note.
    pub source: usize,
    /// Panning (0-127). When absent, the playback's default panning is used.
    pub pan: Option<i32>,
}

impl NoteEvent {
    /// Creates a note at the given time with velocity 100 on the first source.
    pub fn new(onset_ms: f64, duration_ms: f64, pitch: Pitch) -> NoteEvent {
        NoteEvent {
            onset_ms,
            duration_ms,
            pitch: Some(pitch),
            velocity: 100,
            source: 0,
            pan: None,
        }
    }

    /// Creates a rest.
    pub fn rest(onset_ms: f64, duration_ms: f64) -> NoteEvent {
        NoteEvent {
            pitch: None,
            ..NoteEvent::new(onset_ms, duration_ms, Pitch::Midi(0))
        }
    }
}

/// A sample together with how notes played on it are shaped.
#[derive(Debug, Clone)]
pub struct VoiceSource {
    pub sample: Arc<AudioSample>,
    /// When absent, notes start at their velocity and stop dead at note-off.
    pub envelope: Option<Envelope>,
    /// Loop the sample for as long as the note sounds instead of playing it once.
    pub looping: bool,
}

impl VoiceSource {
    /// A source that plays the sample once per note without an envelope.
    pub fn new(sample: Arc<AudioSample>) -> VoiceSource {
        VoiceSource {
            sample,
            envelope: None,
            looping: false,
        }
    }
}

/// Playback-wide settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    /// Panning for notes that don't give one.
    pub default_panning: i32,
    /// Extra time between the end of a release ramp and the final stop, in milliseconds.
    pub release_guard_ms: f64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        PlaybackOptions {
            default_panning: CENTER_PANNING,
            release_guard_ms: DEFAULT_RELEASE_GUARD_MS,
        }
    }
}

/// Plays notes on a set of voice sources.
pub struct Playback {
    this: Weak<Playback>,
    sources: Vec<VoiceSource>,
    scheduler: Arc<dyn Scheduler>,
    envelopes: EnvelopeScheduler,
    default_panning: i32,
    /// Note-on and note-off timers that may still be pending.
    timers: Mutex<Vec<TimerHandle>>,
    registration: RegistrationId,
}

impl Playback {
    /// Creates a playback and registers it.
    pub fn new(
        sources: Vec<VoiceSource>,
        scheduler: Arc<dyn Scheduler>,
        options: PlaybackOptions,
        registry: &Registry,
    ) -> Arc<Playback> {
        register_new(registry, |registration| {
            Arc::new_cyclic(|weak| Playback {
                this: weak.clone(),
                sources,
                envelopes: EnvelopeScheduler::with_release_guard(
                    scheduler.clone(),
                    options.release_guard_ms,
                ),
                scheduler,
                default_panning: options.default_panning,
                timers: Mutex::new(Vec::new()),
                registration,
            })
        })
    }

    /// Returns the playback's registration.
    pub fn registration(&self) -> RegistrationId {
        self.registration
    }

    /// Returns the voice sources.
    pub fn sources(&self) -> &[VoiceSource] {
        &self.sources
    }

    /// Returns the number of note timers that haven't fired or been cancelled.
    pub fn pending_notes(&self) -> usize {
        self.timers
            .lock()
            .iter()
            .filter(|timer| !timer.is_finished())
            .count()
    }

    fn source(&self, index: usize) -> Result<&VoiceSource, PlaybackError> {
        self.sources
            .get(index)
            .ok_or(PlaybackError::UnknownSource {
                index,
                count: self.sources.len(),
            })
    }

    /// Starts sounding a pitch right away. Returns the voice used, or None if every voice of
    /// the source's sample is busy and the note was dropped.
    pub fn audio_on(
        &self,
        pitch: Pitch,
        velocity: i32,
        source: usize,
        panning: Option<i32>,
    ) -> Result<Option<usize>, PlaybackError> {
        let VoiceSource {
            sample,
            envelope,
            looping,
        } = self.source(source)?;

        let panning = panning.unwrap_or(self.default_panning);
        if !(0..=127).contains(&velocity) {
            warn!(velocity, source, "Velocity out of range, dropping note");
            return Err(PlayerError::VolumeOutOfRange(velocity).into());
        }
        if !(0..=127).contains(&panning) {
            warn!(panning, source, "Panning out of range, dropping note");
            return Err(PlayerError::PanningOutOfRange(panning).into());
        }

        let Some(voice) = sample.allocate_voice_for_pitch(pitch) else {
            warn!(
                sample = sample.name(),
                %pitch,
                "Not enough free voices to play this pitch"
            );
            return Ok(None);
        };

        let started = (|| {
            sample.set_panning(panning, voice)?;
            sample.set_frequency(pitch.to_frequency(), voice)?;
            match envelope {
                Some(envelope) => {
                    self.envelopes
                        .perform_attack_delay_sustain(envelope, sample, velocity, voice)?
                }
                None => {
                    // The voice may still carry a release stop from a note on another source.
                    sample.envelope_timers(voice)?.cancel_all();
                    sample.set_volume(velocity, DEFAULT_VOLUME_DELAY_MS, voice)?
                }
            }
            if *looping {
                sample.loop_playback(LoopCount::Forever, 0.0, PlaySpan::ToEnd, voice)
            } else {
                sample.play(0.0, PlaySpan::ToEnd, voice)
            }
        })();

        if let Err(e) = started {
            // Hand the voice straight back so a failed start doesn't leak it.
            let _ = sample.stop(voice);
            let _ = sample.deallocate_voice_for_pitch(pitch);
            return Err(e.into());
        }

        debug!(sample = sample.name(), %pitch, velocity, voice, "Note on");
        Ok(Some(voice))
    }

    /// Stops sounding a pitch right away. With an envelope, the voice fades out over the
    /// release time; otherwise it stops dead. Either way the voice goes back to the pool.
    /// Returns the voice that was released, or None if the pitch wasn't sounding.
    pub fn audio_off(&self, pitch: Pitch, source: usize) -> Result<Option<usize>, PlaybackError> {
        let VoiceSource {
            sample, envelope, ..
        } = self.source(source)?;

        let released = sample.release_voice_for_pitch(pitch, |voice| {
            let stopped = match envelope {
                Some(envelope) => self
                    .envelopes
                    .perform_release_and_stop(envelope, sample, voice),
                None => sample.stop(voice),
            };
            if let Err(e) = stopped {
                warn!(sample = sample.name(), voice, error = %e, "Unable to release voice");
                let _ = sample.stop(voice);
            }
        });
        let Some(voice) = released else {
            debug!(sample = sample.name(), %pitch, "Pitch is not sounding");
            return Ok(None);
        };

        debug!(sample = sample.name(), %pitch, voice, "Note off");
        Ok(Some(voice))
    }

    /// Schedules one note: note-on after `start_ms`, note-off `duration_ms` later.
    pub fn audio_note(
        &self,
        pitch: Pitch,
        start_ms: f64,
        duration_ms: f64,
        source: usize,
        velocity: i32,
        panning: Option<i32>,
    ) -> Result<(), PlaybackError> {
        self.source(source)?;

        // Note-off only acts if its note-on actually got a voice.
        let sounding = Arc::new(AtomicBool::new(false));

        let on = {
            let this = self.this.clone();
            let sounding = sounding.clone();
            self.scheduler.schedule(
                millis(start_ms),
                Box::new(move || {
                    let Some(playback) = this.upgrade() else {
                        return;
                    };
                    match playback.audio_on(pitch, velocity, source, panning) {
                        Ok(Some(_)) => sounding.store(true, Ordering::SeqCst),
                        Ok(None) => {}
                        Err(e) => warn!(%pitch, source, error = %e, "Unable to start note"),
                    }
                }),
            )
        };

        let off = {
            let this = self.this.clone();
            self.scheduler.schedule(
                millis(start_ms + duration_ms.max(0.0)),
                Box::new(move || {
                    let Some(playback) = this.upgrade() else {
                        return;
                    };
                    if !sounding.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Err(e) = playback.audio_off(pitch, source) {
                        warn!(%pitch, source, error = %e, "Unable to stop note");
                    }
                }),
            )
        };

        let mut timers = self.timers.lock();
        timers.retain(|timer| !timer.is_finished());
        timers.push(on);
        timers.push(off);
        Ok(())
    }

    /// Schedules a whole note list. Rests are skipped, as are notes naming a source that
    /// doesn't exist. Returns the number of notes scheduled.
    pub fn audio(&self, events: &[NoteEvent]) -> usize {
        let mut notes: Vec<&NoteEvent> = events
            .iter()
            .filter(|event| event.pitch.is_some())
            .collect();
        notes.sort_by(|a, b| {
            a.onset_ms
                .total_cmp(&b.onset_ms)
                .then(a.duration_ms.total_cmp(&b.duration_ms))
        });

        let mut scheduled = 0;
        let mut chord: Vec<&NoteEvent> = Vec::new();
        for note in notes {
            if note.duration_ms == 0.0 {
                chord.push(note);
                continue;
            }

            // Chord members take the length of the note that closes the chord.
            for member in chord.drain(..).chain(std::iter::once(note)) {
                let Some(pitch) = member.pitch else {
                    continue;
                };
                match self.audio_note(
                    pitch,
                    member.onset_ms,
                    note.duration_ms,
                    member.source,
                    member.velocity,
                    member.pan,
                ) {
                    Ok(()) => scheduled += 1,
                    Err(e) => warn!(%pitch, onset_ms = member.onset_ms, error = %e, "Skipping note"),
                }
            }
        }

        if !chord.is_empty() {
            warn!(notes = chord.len(), "Skipping chord notes with no length");
        }
        info!(notes = scheduled, "Scheduled notes");
        scheduled
    }

    /// Stops every voice of every source and returns all voices to their pools.
    pub fn all_audio_notes_off(&self) {
        for VoiceSource { sample, .. } in &self.sources {
            for voice in 0..sample.max_voices() {
                let _ = sample.stop(voice);
            }
            sample.release_all_voices();
        }
        debug!("All notes off");
    }

    /// Cancels every note that hasn't started or ended yet. Sounding voices keep sounding.
    pub fn stop(&self) {
        let timers = std::mem::take(&mut *self.timers.lock());
        let cancelled = timers.iter().filter(|timer| !timer.is_finished()).count();
        for timer in timers {
            timer.cancel();
        }
        info!(cancelled, "Cancelled pending notes");
    }

    /// Returns the time on the playback's clock.
    pub fn now_ms(&self) -> f64 {
        self.scheduler.now().as_secs_f64() * 1000.0
    }
}

/// Returns the time at which everything in the note list has finished sounding, including
/// release tails and the release guard, in milliseconds.
pub fn performance_length_ms(
    events: &[NoteEvent],
    sources: &[VoiceSource],
    release_guard_ms: f64,
) -> f64 {
    events
        .iter()
        .filter(|event| event.pitch.is_some())
        .map(|event| {
            let release = sources
                .get(event.source)
                .and_then(|source| source.envelope.as_ref())
                .map(|envelope| envelope.release_time() + release_guard_ms)
                .unwrap_or(0.0);
            event.onset_ms + event.duration_ms + release
        })
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(CmpOrdering::Equal))
        .unwrap_or(0.0)
}

impl Shutdown for Playback {
    fn shutdown(&self) {
        self.stop();
    }

    fn name(&self) -> String {
        format!("playback ({} sources)", self.sources.len())
    }
}

impl std::fmt::Debug for Playback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playback")
            .field("sources", &self.sources.len())
            .field("default_panning", &self.default_panning)
            .field("envelopes", &self.envelopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::time::Duration;

    use super::*;
    use crate::audio::{AudioSampleOptions, SampleData};
    use crate::scheduler::{ManualScheduler, TokioScheduler};
    use crate::testutil::eventually;

    struct Fixture {
        clock: Arc<ManualScheduler>,
        registry: Registry,
        sample: Arc<AudioSample>,
    }

    /// A one second sample with the given voice count.
    fn fixture(voices: usize) -> Fixture {
        let registry = Registry::new();
        let data = SampleData::from_interleaved(vec![0.5; 1000], 1, 1000).unwrap();
        let sample = AudioSample::from_data(
            "tone",
            Arc::new(data),
            AudioSampleOptions {
                voices,
                ..Default::default()
            },
            &registry,
        )
        .unwrap();
        Fixture {
            clock: Arc::new(ManualScheduler::new()),
            registry,
            sample,
        }
    }

    impl Fixture {
        fn playback(&self, source: VoiceSource) -> Arc<Playback> {
            Playback::new(
                vec![source],
                self.clock.clone(),
                PlaybackOptions::default(),
                &self.registry,
            )
        }

        fn enveloped(&self, release_ms: f64) -> VoiceSource {
            VoiceSource {
                sample: self.sample.clone(),
                envelope: Some(Envelope::new(vec![10.0], vec![1.0], 5.0, 0.8, release_ms).unwrap()),
                looping: true,
            }
        }
    }

    #[test]
    fn test_audio_on_and_off_without_envelope() {
        let fixture = fixture(4);
        let playback = fixture.playback(VoiceSource::new(fixture.sample.clone()));
        let sample = &fixture.sample;

        let voice = playback
            .audio_on(Pitch::Midi(60), 90, 0, Some(10))
            .unwrap()
            .unwrap();
        assert_eq!(voice, 0);
        assert_eq!(sample.is_playing(0), Ok(true));
        assert_eq!(sample.volume(0), Ok(90));
        assert_eq!(sample.panning(0), Ok(10));
        assert!((sample.pitch(0).unwrap() - 60.0).abs() < 1e-9);
        assert_eq!(sample.free_voice_count(), 3);

        assert_eq!(playback.audio_off(Pitch::Midi(60), 0), Ok(Some(0)));
        assert_eq!(sample.is_playing(0), Ok(false));
        assert_eq!(sample.free_voice_count(), 4);

        // A pitch that isn't sounding is ignored.
        assert_eq!(playback.audio_off(Pitch::Midi(60), 0), Ok(None));
    }

    #[test]
    fn test_default_panning_and_bad_requests() {
        let fixture = fixture(2);
        let playback = fixture.playback(VoiceSource::new(fixture.sample.clone()));

        playback.audio_on(Pitch::Frequency(300.0), 100, 0, None).unwrap();
        assert_eq!(fixture.sample.panning(0), Ok(CENTER_PANNING));

        assert_eq!(
            playback.audio_on(Pitch::Midi(60), 100, 3, None),
            Err(PlaybackError::UnknownSource { index: 3, count: 1 })
        );
        assert_eq!(
            playback.audio_on(Pitch::Midi(60), 128, 0, None),
            Err(PlaybackError::Player(PlayerError::VolumeOutOfRange(128)))
        );
        assert_eq!(
            playback.audio_on(Pitch::Midi(60), 100, 0, Some(-4)),
            Err(PlaybackError::Player(PlayerError::PanningOutOfRange(-4)))
        );
        assert_eq!(fixture.sample.free_voice_count(), 1);
    }

    #[test]
    fn test_exhausted_pool_drops_note() {
        let fixture = fixture(2);
        let playback = fixture.playback(VoiceSource::new(fixture.sample.clone()));

        assert_eq!(playback.audio_on(Pitch::Midi(60), 100, 0, None), Ok(Some(0)));
        assert_eq!(playback.audio_on(Pitch::Midi(64), 100, 0, None), Ok(Some(1)));
        assert_eq!(playback.audio_on(Pitch::Midi(67), 100, 0, None), Ok(None));

        playback.audio_off(Pitch::Midi(60), 0).unwrap();
        assert_eq!(playback.audio_on(Pitch::Midi(67), 100, 0, None), Ok(Some(0)));
    }

    #[test]
    fn test_audio_schedules_chords() {
        let fixture = fixture(4);
        let playback = fixture.playback(VoiceSource::new(fixture.sample.clone()));
        let sample = &fixture.sample;

        let events = vec![
            NoteEvent::new(0.0, 100.0, Pitch::Midi(67)),
            NoteEvent::new(0.0, 0.0, Pitch::Midi(60)),
            NoteEvent::rest(100.0, 50.0),
            NoteEvent::new(0.0, 0.0, Pitch::Midi(64)),
            NoteEvent {
                source: 7,
                ..NoteEvent::new(150.0, 10.0, Pitch::Midi(72))
            },
        ];
        assert_eq!(playback.audio(&events), 3);

        fixture.clock.advance(Duration::ZERO);
        assert_eq!(sample.free_voice_count(), 1);
        assert!(sample.voice_for_pitch(Pitch::Midi(60)).is_some());
        assert!(sample.voice_for_pitch(Pitch::Midi(64)).is_some());
        assert!(sample.voice_for_pitch(Pitch::Midi(67)).is_some());

        fixture.clock.advance(Duration::from_millis(99));
        assert_eq!(sample.free_voice_count(), 1);

        // Every chord member ends with the note that gave the chord its length.
        fixture.clock.advance(Duration::from_millis(1));
        assert_eq!(sample.free_voice_count(), 4);
        assert_eq!(playback.pending_notes(), 0);
    }

    #[test]
    fn test_envelope_release_outlives_note_off() {
        let fixture = fixture(4);
        let playback = fixture.playback(fixture.enveloped(100.0));
        let sample = &fixture.sample;

        playback.audio_note(Pitch::Midi(60), 0.0, 50.0, 0, 100, None).unwrap();
        fixture.clock.advance(Duration::from_millis(20));
        assert_eq!(sample.volume(0), Ok(80));

        fixture.clock.advance(Duration::from_millis(30));
        assert_eq!(sample.free_voice_count(), 4);
        assert_eq!(sample.is_playing(0), Ok(true));
        assert_eq!(sample.volume(0), Ok(0));

        fixture.clock.advance(Duration::from_millis(104));
        assert_eq!(sample.is_playing(0), Ok(true));
        fixture.clock.advance(Duration::from_millis(1));
        assert_eq!(sample.is_playing(0), Ok(false));
    }

    #[test]
    fn test_reused_voice_survives_old_release() {
        let fixture = fixture(4);
        let playback = fixture.playback(fixture.enveloped(100.0));
        let sample = &fixture.sample;

        playback.audio_note(Pitch::Midi(60), 0.0, 20.0, 0, 100, None).unwrap();
        playback.audio_note(Pitch::Midi(62), 40.0, 500.0, 0, 100, None).unwrap();

        // The second note lands on voice 0 while the first note's release is still running.
        fixture.clock.advance(Duration::from_millis(40));
        assert_eq!(sample.voice_for_pitch(Pitch::Midi(62)), Some(0));

        fixture.clock.advance(Duration::from_millis(200));
        assert_eq!(sample.is_playing(0), Ok(true));
        assert_eq!(sample.volume(0), Ok(80));
    }

    #[test]
    fn test_plain_note_survives_release_from_shared_sample() {
        let fixture = fixture(4);
        let playback = Playback::new(
            vec![fixture.enveloped(100.0), VoiceSource::new(fixture.sample.clone())],
            fixture.clock.clone(),
            PlaybackOptions::default(),
            &fixture.registry,
        );
        let sample = &fixture.sample;

        playback.audio_note(Pitch::Midi(60), 0.0, 20.0, 0, 100, None).unwrap();
        playback.audio_note(Pitch::Midi(62), 40.0, 500.0, 1, 100, None).unwrap();

        // The plain note reuses voice 0 before the first note's release stop is due at 125ms.
        fixture.clock.advance(Duration::from_millis(40));
        assert_eq!(sample.voice_for_pitch(Pitch::Midi(62)), Some(0));

        fixture.clock.advance(Duration::from_millis(100));
        assert_eq!(sample.is_playing(0), Ok(true));
        assert_eq!(sample.volume(0), Ok(100));

        fixture.clock.advance(Duration::from_millis(400));
        assert_eq!(sample.is_playing(0), Ok(false));
        assert_eq!(sample.free_voice_count(), 4);
    }

    #[test]
    fn test_concurrent_note_offs_release_distinct_voices() {
        let fixture = fixture(2);
        let playback = fixture.playback(VoiceSource {
            sample: fixture.sample.clone(),
            envelope: None,
            looping: true,
        });
        let sample = &fixture.sample;

        for _ in 0..200 {
            assert_eq!(playback.audio_on(Pitch::Midi(60), 100, 0, None), Ok(Some(0)));
            assert_eq!(playback.audio_on(Pitch::Midi(60), 100, 0, None), Ok(Some(1)));

            let barrier = &Barrier::new(2);
            let playback = &playback;
            let released: Vec<Option<usize>> = std::thread::scope(|scope| {
                let offs: Vec<_> = (0..2)
                    .map(|_| {
                        scope.spawn(move || {
                            barrier.wait();
                            playback.audio_off(Pitch::Midi(60), 0).unwrap()
                        })
                    })
                    .collect();
                offs.into_iter().map(|off| off.join().unwrap()).collect()
            });

            let mut released: Vec<usize> = released.into_iter().flatten().collect();
            released.sort();
            assert_eq!(released, vec![0, 1]);
            assert_eq!(sample.free_voice_count(), 2);
            assert_eq!(sample.is_playing(0), Ok(false));
            assert_eq!(sample.is_playing(1), Ok(false));
        }
    }

    #[test]
    fn test_stop_cancels_pending_notes() {
        let fixture = fixture(4);
        let playback = fixture.playback(VoiceSource::new(fixture.sample.clone()));

        playback.audio_note(Pitch::Midi(60), 0.0, 100.0, 0, 100, None).unwrap();
        playback.audio_note(Pitch::Midi(64), 50.0, 100.0, 0, 100, None).unwrap();
        fixture.clock.advance(Duration::from_millis(10));
        assert_eq!(playback.pending_notes(), 3);

        playback.stop();
        assert_eq!(playback.pending_notes(), 0);
        fixture.clock.advance(Duration::from_millis(500));
        assert!(fixture.sample.voice_for_pitch(Pitch::Midi(64)).is_none());

        // The note that had already started keeps its voice until told otherwise.
        assert_eq!(fixture.sample.voice_for_pitch(Pitch::Midi(60)), Some(0));
        playback.all_audio_notes_off();
        assert_eq!(fixture.sample.free_voice_count(), 4);
        assert_eq!(fixture.sample.is_playing(0), Ok(false));
    }

    #[test]
    fn test_registry_shutdown_cancels_notes() {
        let fixture = fixture(4);
        let playback = fixture.playback(VoiceSource::new(fixture.sample.clone()));

        playback.audio_note(Pitch::Midi(60), 10.0, 100.0, 0, 100, None).unwrap();
        fixture.registry.shutdown_all();
        fixture.clock.advance(Duration::from_millis(50));
        assert_eq!(fixture.sample.free_voice_count(), 4);
        assert_eq!(playback.pending_notes(), 0);
    }

    #[test]
    fn test_performance_length() {
        let fixture = fixture(1);
        let sources = vec![fixture.enveloped(100.0), VoiceSource::new(fixture.sample.clone())];
        let events = vec![
            NoteEvent::new(0.0, 50.0, Pitch::Midi(60)),
            NoteEvent {
                source: 1,
                ..NoteEvent::new(100.0, 80.0, Pitch::Midi(60))
            },
            NoteEvent::rest(500.0, 500.0),
        ];
        assert_eq!(performance_length_ms(&events, &sources, 5.0), 180.0);
        assert_eq!(performance_length_ms(&events[..1], &sources, 5.0), 155.0);
        assert_eq!(performance_length_ms(&[], &sources, 5.0), 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_real_time_notes() {
        let fixture = fixture(4);
        let playback = Playback::new(
            vec![VoiceSource::new(fixture.sample.clone())],
            Arc::new(TokioScheduler::current()),
            PlaybackOptions::default(),
            &fixture.registry,
        );

        playback.audio_note(Pitch::Midi(60), 0.0, 20.0, 0, 100, None).unwrap();
        let sample = fixture.sample.clone();
        eventually(
            || sample.free_voice_count() == 3,
            "Note never started",
        );
        eventually(
            || sample.free_voice_count() == 4,
            "Note never ended",
        );
    }
}
