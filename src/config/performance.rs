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
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;
use tracing::info;

use super::error::ConfigError;
use crate::audio::{AudioSample, AudioSampleOptions, CENTER_PANNING};
use crate::envelope::{EnvelopeConfig, DEFAULT_RELEASE_GUARD_MS};
use crate::pitch::Pitch;
use crate::playback::{NoteEvent, PlaybackOptions, VoiceSource};
use crate::registry::Registry;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_VELOCITY: i32 = 100;
const DEFAULT_VOLUME: i32 = 127;
const DEFAULT_VOICES: usize = 16;

/// A pitch as written in YAML: an integer is a MIDI pitch, a float is a frequency in Hz, and
/// the word "rest" is silence.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum PitchConfig {
    Midi(i64),
    Frequency(f64),
    Word(String),
}

impl PitchConfig {
    /// Resolves the pitch. Rests become None.
    pub fn to_pitch(&self) -> Result<Option<Pitch>, ConfigError> {
        match self {
            PitchConfig::Midi(note) => Ok(Some(Pitch::midi(*note)?)),
            PitchConfig::Frequency(hz) => Ok(Some(Pitch::frequency(*hz)?)),
            PitchConfig::Word(word) if word.eq_ignore_ascii_case("rest") => Ok(None),
            PitchConfig::Word(word) => Err(ConfigError::UnknownPitch(word.clone())),
        }
    }
}

/// A YAML representation of a sample and how notes played on it are shaped.
#[derive(Deserialize, Clone, Debug)]
pub struct SampleConfig {
    /// The audio file, relative to the performance file.
    file: String,

    /// The pitch of the recorded sound (default: 69, A4).
    actual_pitch: Option<PitchConfig>,

    /// The initial volume of every voice (default: 127).
    volume: Option<i32>,

    /// The number of voices (default: 16).
    voices: Option<usize>,

    /// Loop the sample while notes sound (default: false).
    #[serde(rename = "loop")]
    looping: Option<bool>,

    /// The envelope applied to notes. Without one, notes start at their velocity and stop at
    /// note-off.
    envelope: Option<EnvelopeConfig>,
}

impl SampleConfig {
    /// Returns the audio file name.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Returns the options the sample is created with.
    pub fn options(&self) -> Result<AudioSampleOptions, ConfigError> {
        let actual_pitch = match &self.actual_pitch {
            Some(pitch) => pitch
                .to_pitch()?
                .ok_or_else(|| ConfigError::UnknownPitch("rest".to_string()))?,
            None => AudioSampleOptions::default().actual_pitch,
        };
        Ok(AudioSampleOptions {
            actual_pitch,
            volume: self.volume.unwrap_or(DEFAULT_VOLUME),
            voices: self.voices.unwrap_or(DEFAULT_VOICES),
        })
    }

    /// Returns true if the sample loops while notes sound.
    pub fn looping(&self) -> bool {
        self.looping.unwrap_or(false)
    }
}

/// A YAML representation of a note.
#[derive(Deserialize, Clone, Debug)]
pub struct EventConfig {
    /// Start time, in milliseconds or beats.
    onset: f64,

    /// Length, in milliseconds or beats. Zero marks a chord member.
    duration: f64,

    pitch: PitchConfig,

    /// Velocity (default: 100).
    velocity: Option<i32>,

    /// Index of the sample that plays the note (default: 0).
    source: Option<usize>,

    /// Panning (default: the performance's default panning).
    pan: Option<i32>,
}

/// A YAML representation of a performance.
#[derive(Deserialize, Clone, Debug)]
pub struct Performance {
    /// Output sample rate (default: 44100).
    sample_rate: Option<u32>,

    /// Panning for notes that don't give one (default: 63).
    default_panning: Option<i32>,

    /// Tempo in beats per minute. When present, onsets and durations are in beats.
    tempo: Option<f64>,

    /// Extra time between the end of a release ramp and the final stop (default: 5ms).
    release_guard_ms: Option<f64>,

    samples: Vec<SampleConfig>,

    #[serde(default)]
    events: Vec<EventConfig>,

    /// The directory sample files are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Performance {
    /// Parse a performance from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Performance, ConfigError> {
        let performance = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Performance>()?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        performance.validated(base_dir)
    }

    /// Parse a performance from YAML text. Sample files are resolved against `base_dir`.
    pub fn from_yaml(yaml: &str, base_dir: &Path) -> Result<Performance, ConfigError> {
        let performance = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Performance>()?;
        performance.validated(base_dir.to_path_buf())
    }

    fn validated(mut self, base_dir: PathBuf) -> Result<Performance, ConfigError> {
        if self.samples.is_empty() {
            return Err(ConfigError::NoSamples);
        }
        if self.sample_rate() == 0 {
            return Err(ConfigError::SampleRate);
        }
        if let Some(tempo) = self.tempo {
            if !tempo.is_finite() || tempo <= 0.0 {
                return Err(ConfigError::Tempo(tempo));
            }
        }
        let panning = self.default_panning();
        if !(0..=127).contains(&panning) {
            return Err(ConfigError::Panning(panning));
        }
        for sample in &self.samples {
            if let Some(envelope) = &sample.envelope {
                envelope.to_envelope()?;
            }
        }
        self.base_dir = base_dir;
        Ok(self)
    }

    /// Returns the output sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the default panning (default: 63).
    pub fn default_panning(&self) -> i32 {
        self.default_panning.unwrap_or(CENTER_PANNING)
    }

    /// Returns the tempo, if the performance is written in beats.
    pub fn tempo(&self) -> Option<f64> {
        self.tempo
    }

    /// Returns the release guard in milliseconds (default: 5).
    pub fn release_guard_ms(&self) -> f64 {
        self.release_guard_ms.unwrap_or(DEFAULT_RELEASE_GUARD_MS)
    }

    /// Returns the sample configurations.
    pub fn samples(&self) -> &[SampleConfig] {
        &self.samples
    }

    /// Returns the directory sample files are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Converts an onset or duration to milliseconds, using the tempo if there is one.
    pub fn to_ms(&self, value: f64) -> f64 {
        match self.tempo {
            Some(tempo) => value * 60000.0 / tempo,
            None => value,
        }
    }

    /// Returns the settings the playback is created with.
    pub fn playback_options(&self) -> PlaybackOptions {
        PlaybackOptions {
            default_panning: self.default_panning(),
            release_guard_ms: self.release_guard_ms(),
        }
    }

    /// Returns the notes, with times in milliseconds. Rests are kept as pitchless events.
    pub fn note_events(&self) -> Result<Vec<NoteEvent>, ConfigError> {
        self.events
            .iter()
            .map(|event| {
                Ok(NoteEvent {
                    onset_ms: self.to_ms(event.onset),
                    duration_ms: self.to_ms(event.duration),
                    pitch: event.pitch.to_pitch()?,
                    velocity: event.velocity.unwrap_or(DEFAULT_VELOCITY),
                    source: event.source.unwrap_or(0),
                    pan: event.pan,
                })
            })
            .collect()
    }

    /// Loads every sample and pairs it with its envelope and loop setting.
    pub fn voice_sources(&self, registry: &Registry) -> Result<Vec<VoiceSource>, ConfigError> {
        self.samples
            .iter()
            .map(|sample| {
                let path = self.base_dir.join(&sample.file);
                let loaded = AudioSample::load(&path, sample.options()?, registry).map_err(
                    |source| ConfigError::Sample {
                        file: sample.file.clone(),
                        source,
                    },
                )?;
                let envelope = match &sample.envelope {
                    Some(envelope) => Some(envelope.to_envelope()?),
                    None => None,
                };
                info!(
                    file = sample.file,
                    looping = sample.looping(),
                    envelope = envelope.is_some(),
                    "Voice source ready"
                );
                Ok(VoiceSource {
                    sample: loaded,
                    envelope,
                    looping: sample.looping(),
                })
            })
            .collect()
    }
}
