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

/// A control value that moves linearly toward a target over a set time, so that amplitude
/// changes don't click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    /// Seconds left until the target is reached.
    remaining: f64,
}

impl LinearRamp {
    /// Creates a ramp resting at the given value.
    pub fn new(value: f32) -> LinearRamp {
        LinearRamp {
            current: value,
            target: value,
            remaining: 0.0,
        }
    }

    /// Starts moving toward the target, arriving after `seconds`. A zero time jumps straight
    /// to the target.
    pub fn set(&mut self, target: f32, seconds: f64) {
        self.target = target;
        if seconds > 0.0 {
            self.remaining = seconds;
        } else {
            self.current = target;
            self.remaining = 0.0;
        }
    }

    /// Advances the ramp by `dt` seconds and returns the new value.
    pub fn next(&mut self, dt: f64) -> f32 {
        // Tolerance for the rounding left over from subtracting many small steps.
        if self.remaining <= dt + 1e-12 {
            self.current = self.target;
            self.remaining = 0.0;
        } else {
            self.current += (self.target - self.current) * (dt / self.remaining) as f32;
            self.remaining -= dt;
        }
        self.current
    }

    /// Returns the current value.
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Returns the value being moved toward.
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Returns true while the ramp is still moving.
    pub fn is_moving(&self) -> bool {
        self.remaining > 0.0
    }
}
