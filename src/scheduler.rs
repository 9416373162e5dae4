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

//! One-shot deferred actions.
//!
//! Everything timed in the engine (note onsets, note releases, envelope stages) is a
//! one-shot action handed to a [`Scheduler`]. Nothing ever blocks waiting for time to pass.
//!
//! - [`ManualScheduler`] runs on a virtual clock that only moves when advanced. It is used for
//!   offline rendering and for deterministic tests.
//! - [`TokioScheduler`] runs each timer as its own tokio task, so timers for different voices
//!   may fire concurrently.

use std::time::Duration;

use crate::playsync::TimerHandle;

mod manual;
mod realtime;

pub use manual::ManualScheduler;
pub use realtime::TokioScheduler;

/// An action to run when a timer fires.
pub type TimerAction = Box<dyn FnOnce() + Send + 'static>;

/// A facility for running one-shot actions after a delay.
pub trait Scheduler: Send + Sync {
    /// Schedules the action to run once after the given delay. The returned handle can be
    /// used to cancel the action before it fires.
    fn schedule(&self, delay: Duration, action: TimerAction) -> TimerHandle;

    /// The time elapsed on this scheduler's clock.
    fn now(&self) -> Duration;
}

/// Converts a millisecond count, as used throughout the engine, into a duration.
/// Negative and non-finite values become zero.
pub fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_nanos((ms * 1_000_000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}
