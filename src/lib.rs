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

//! A polyphonic sample player: a fixed pool of voices per sample, ADSR envelopes driven by
//! cancellable timers, and a note scheduler that turns note lists into voice activity.

pub mod audio;
pub mod config;
pub mod envelope;
pub mod pitch;
pub mod playback;
pub mod playsync;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod util;
pub mod voice;

#[cfg(test)]
mod testutil;
