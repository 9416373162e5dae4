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

//! Performance files.
//!
//! A performance is a YAML file naming the samples to play (with their voice counts and
//! envelopes) and the notes to play on them.

mod error;
mod performance;

pub use error::ConfigError;
pub use performance::{EventConfig, Performance, PitchConfig, SampleConfig};
