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
use std::time::{Duration, Instant};

#[cfg(test)]
pub mod mock;

/// How far behind schedule the clock may fall before it gives up catching up and starts
/// measuring from the current instant again.
const MAX_DRIFT: Duration = Duration::from_millis(50);

/// A blocking clock. The player sleeps through every gate on one of these.
pub trait Clock: Send {
    /// Blocks for the given duration.
    fn sleep(&mut self, duration: Duration);
}

/// SpinClock sleeps using spin_sleep for sub-millisecond accuracy. It also keeps track of
/// where the previous sleep was supposed to end so that time spent between sleeps (driving
/// the tone output, logging) doesn't accumulate as drift over a melody.
#[derive(Default)]
pub struct SpinClock {
    deadline: Option<Instant>,
}

impl SpinClock {
    pub fn new() -> SpinClock {
        SpinClock { deadline: None }
    }
}

impl Clock for SpinClock {
    fn sleep(&mut self, duration: Duration) {
        let now = Instant::now();
        let deadline = match self.deadline {
            Some(last) if now.saturating_duration_since(last) < MAX_DRIFT => last + duration,
            _ => now + duration,
        };
        self.deadline = Some(deadline);

        if let Some(remaining) = deadline.checked_duration_since(now) {
            spin_sleep::sleep(remaining);
        }
    }
}
