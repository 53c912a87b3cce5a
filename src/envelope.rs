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
use std::fmt;

/// Attack and release settings. Each stage is a percentage of the note duration, clamped
/// to the given millisecond bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeConfig {
    pub attack_percent: u32,
    pub release_percent: u32,
    pub attack_min_ms: u32,
    pub attack_max_ms: u32,
    pub release_min_ms: u32,
    pub release_max_ms: u32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        EnvelopeConfig {
            attack_percent: 10,
            release_percent: 20,
            attack_min_ms: 10,
            attack_max_ms: 60,
            release_min_ms: 12,
            release_max_ms: 120,
        }
    }
}

/// The attack, hold and release times for a single note. The three always add up to the
/// note duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
    pub attack_ms: u32,
    pub hold_ms: u32,
    pub release_ms: u32,
}

impl Shape {
    pub fn total_ms(&self) -> u32 {
        self.attack_ms + self.hold_ms + self.release_ms
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A{}ms/H{}ms/R{}ms",
            self.attack_ms, self.hold_ms, self.release_ms
        )
    }
}

impl EnvelopeConfig {
    /// Computes the envelope shape for a note of the given duration. If attack and release
    /// don't fit, both are shrunk proportionally and the hold may drop to zero.
    pub fn shape(&self, duration_ms: u32) -> Shape {
        let mut attack_ms = bounded_percent(
            duration_ms,
            self.attack_percent,
            self.attack_min_ms,
            self.attack_max_ms,
        );
        let mut release_ms = bounded_percent(
            duration_ms,
            self.release_percent,
            self.release_min_ms,
            self.release_max_ms,
        );

        let combined = u64::from(attack_ms) + u64::from(release_ms);
        if combined > u64::from(duration_ms) {
            // Rounding down keeps the sum at or under the duration.
            attack_ms = (u64::from(attack_ms) * u64::from(duration_ms) / combined) as u32;
            release_ms = (u64::from(release_ms) * u64::from(duration_ms) / combined) as u32;
        }

        Shape {
            attack_ms,
            hold_ms: duration_ms - attack_ms - release_ms,
            release_ms,
        }
    }
}

fn bounded_percent(duration_ms: u32, percent: u32, min_ms: u32, max_ms: u32) -> u32 {
    let scaled = u64::from(duration_ms) * u64::from(percent) / 100;
    let scaled = u32::try_from(scaled).unwrap_or(u32::MAX);
    // Not clamp(): a misconfigured min above max should not panic. The max wins.
    scaled.max(min_ms).min(max_ms)
}
