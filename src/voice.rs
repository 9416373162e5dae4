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

//! Voice allocation for polyphonic sample playback.
//!
//! A sample owns a fixed number of voices. Each sounding pitch is bound to its own voice, and
//! the same pitch may be bound to several voices at once, the way a MIDI synthesizer lets a
//! repeated note overlap itself.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::debug;

use crate::pitch::{FrequencyKey, Pitch};

/// Errors raised by the voice pool.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VoicePoolError {
    #[error("Pitch {0:.2}Hz is not currently playing")]
    PitchNotSounding(f64),
}

/// Tracks free and allocated voices for a fixed-size voice array.
pub struct VoicePool {
    /// Total number of voices.
    max_voices: usize,
    /// Voices that aren't bound to any pitch. Allocation always takes the lowest index.
    free: BTreeSet<usize>,
    /// Voices bound to each sounding pitch, in allocation order.
    allocated: HashMap<FrequencyKey, VecDeque<usize>>,
}

impl VoicePool {
    /// Creates a pool where every voice is free.
    pub fn new(max_voices: usize) -> Self {
        Self {
            max_voices,
            free: (0..max_voices).collect(),
            allocated: HashMap::new(),
        }
    }

    /// Takes the lowest free voice and binds it to the pitch. Returns None if every voice is
    /// busy.
    pub fn allocate_voice_for_pitch(&mut self, pitch: Pitch) -> Option<usize> {
        let voice = self.free.pop_first()?;
        self.allocated
            .entry(pitch.key())
            .or_default()
            .push_back(voice);
        debug!(voice, pitch = %pitch, "Allocated voice");
        Some(voice)
    }

    /// Returns the first voice bound to the pitch, if the pitch is sounding.
    pub fn voice_for_pitch(&self, pitch: Pitch) -> Option<usize> {
        self.allocated
            .get(&pitch.key())
            .and_then(|voices| voices.front().copied())
    }

    /// Unbinds the first voice bound to the pitch and returns it to the free set.
    pub fn deallocate_voice_for_pitch(&mut self, pitch: Pitch) -> Result<usize, VoicePoolError> {
        let key = pitch.key();
        let voices = self
            .allocated
            .get_mut(&key)
            .ok_or(VoicePoolError::PitchNotSounding(key.frequency()))?;
        let voice = voices
            .pop_front()
            .ok_or(VoicePoolError::PitchNotSounding(key.frequency()))?;
        if voices.is_empty() {
            self.allocated.remove(&key);
        }
        self.free.insert(voice);
        debug!(voice, pitch = %pitch, "Deallocated voice");
        Ok(voice)
    }

    /// Returns the total number of voices.
    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    /// Returns the number of free voices.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Returns the number of voices bound to a pitch.
    pub fn allocated_count(&self) -> usize {
        self.allocated.values().map(|voices| voices.len()).sum()
    }

    /// Returns every allocated voice, regardless of pitch.
    pub fn allocated_voices(&self) -> Vec<usize> {
        let mut voices: Vec<usize> = self.allocated.values().flatten().copied().collect();
        voices.sort_unstable();
        voices
    }

    /// Frees every voice.
    pub fn clear(&mut self) {
        self.allocated.clear();
        self.free = (0..self.max_voices).collect();
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("free_voices", &self.free.len())
            .field("max_voices", &self.max_voices)
            .finish()
    }
}
