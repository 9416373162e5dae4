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
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;

use super::{Scheduler, TimerAction};
use crate::playsync::TimerHandle;

/// A real-time scheduler. Each timer is its own tokio task, so timers fire independently of
/// each other and actions for different voices may run concurrently.
#[derive(Clone)]
pub struct TokioScheduler {
    runtime: Handle,
    started: Instant,
}

impl TokioScheduler {
    /// Creates a scheduler on the given runtime.
    pub fn new(runtime: Handle) -> TokioScheduler {
        TokioScheduler {
            runtime,
            started: Instant::now(),
        }
    }

    /// Creates a scheduler on the runtime of the calling context. Panics if called outside of
    /// a tokio runtime.
    pub fn current() -> TokioScheduler {
        TokioScheduler::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, action: TimerAction) -> TimerHandle {
        let handle = TimerHandle::new();
        let task_handle = handle.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if task_handle.try_fire() {
                action();
            }
        });
        handle
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

impl std::fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("elapsed", &self.now())
            .finish()
    }
}
