// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::sync::Arc;

use parking_lot::Mutex;

/// Represents the current state of a one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Pending,
    Fired,
    Cancelled,
}

/// A timer handle is returned for every scheduled action. The action fires at most once, and
/// never after the handle has been cancelled.
#[derive(Clone)]
pub struct TimerHandle {
    /// The state of the timer, guarded so that firing and cancelling can't interleave.
    state: Arc<Mutex<TimerState>>,
}

impl TimerHandle {
    /// Creates a new pending timer handle.
    pub fn new() -> TimerHandle {
        TimerHandle {
            state: Arc::new(Mutex::new(TimerState::Pending)),
        }
    }

    /// Returns the current state of the timer.
    pub fn state(&self) -> TimerState {
        *self.state.lock()
    }

    /// Returns true if the timer has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state() == TimerState::Cancelled
    }

    /// Returns true once the timer has either fired or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.state() != TimerState::Pending
    }

    /// Cancels the timer. Has no effect if the timer already fired.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if *state == TimerState::Pending {
            *state = TimerState::Cancelled;
        }
    }

    /// Claims the right to fire. Returns false if the timer was cancelled or already fired.
    pub(crate) fn try_fire(&self) -> bool {
        let mut state = self.state.lock();
        if *state == TimerState::Pending {
            *state = TimerState::Fired;
            true
        } else {
            false
        }
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        TimerHandle::new()
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("state", &self.state())
            .finish()
    }
}
