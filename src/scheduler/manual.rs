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
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use super::{Scheduler, TimerAction};
use crate::playsync::TimerHandle;

/// A timer waiting on the virtual clock.
struct Entry {
    due: Duration,
    /// Insertion order, so timers due at the same instant fire in the order they were scheduled.
    seq: u64,
    handle: TimerHandle,
    action: TimerAction,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

struct State {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Entry>>,
}

/// A scheduler driven by a virtual clock. Time only passes when [`ManualScheduler::advance`]
/// or [`ManualScheduler::advance_to`] is called, at which point every timer that has come due
/// fires in due order.
pub struct ManualScheduler {
    state: Mutex<State>,
}

impl ManualScheduler {
    /// Creates a new scheduler with its clock at zero.
    pub fn new() -> ManualScheduler {
        ManualScheduler {
            state: Mutex::new(State {
                now: Duration::ZERO,
                next_seq: 0,
                queue: BinaryHeap::new(),
            }),
        }
    }

    /// Moves the clock forward by the given amount, firing due timers.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.advance_to(target);
    }

    /// Moves the clock forward to the given instant, firing due timers. Timers scheduled by
    /// firing actions are honored if they come due before the target.
    pub fn advance_to(&self, target: Duration) {
        loop {
            let entry = {
                let mut state = self.state.lock();
                let due = matches!(state.queue.peek(), Some(Reverse(entry)) if entry.due <= target);
                if !due {
                    if state.now < target {
                        state.now = target;
                    }
                    return;
                }
                let Some(Reverse(entry)) = state.queue.pop() else {
                    return;
                };
                if entry.due > state.now {
                    state.now = entry.due;
                }
                entry
            };

            // The lock is released so that the action is free to schedule more work.
            if entry.handle.try_fire() {
                trace!(due_ms = entry.due.as_secs_f64() * 1000.0, "Timer fired");
                (entry.action)();
            }
        }
    }

    /// Returns the number of timers that are still waiting, including cancelled ones that
    /// haven't been swept yet.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns the due time of the next pending timer, if any.
    pub fn next_due(&self) -> Option<Duration> {
        let state = self.state.lock();
        state
            .queue
            .iter()
            .filter(|Reverse(entry)| !entry.handle.is_cancelled())
            .map(|Reverse(entry)| entry.due)
            .min()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        ManualScheduler::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, action: TimerAction) -> TimerHandle {
        let handle = TimerHandle::new();
        let mut state = self.state.lock();
        let entry = Entry {
            due: state.now + delay,
            seq: state.next_seq,
            handle: handle.clone(),
            action,
        };
        state.next_seq += 1;
        state.queue.push(Reverse(entry));
        handle
    }

    fn now(&self) -> Duration {
        self.state.lock().now
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("queued", &state.queue.len())
            .finish()
    }
}
