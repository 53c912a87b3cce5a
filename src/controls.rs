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
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU8, Ordering};

use tracing::info;

/// The maximum raw value of an analog input.
pub const ANALOG_MAX: u16 = 1023;
/// The transpose range reachable from an analog input, in semitones either way.
pub const ANALOG_TRANSPOSE_RANGE: i8 = 12;
/// The furthest the transpose can be pushed by any control.
pub const MAX_TRANSPOSE: i8 = 24;

/// Live playback controls. These are shared between the player and whatever drives them
/// (a keyboard, a potentiometer reader, a button). The player samples loudness and transpose
/// once per note and polls the pause and stop flags between gates.
#[derive(Debug)]
pub struct Controls {
    level: AtomicU8,
    transpose: AtomicI8,
    paused: AtomicBool,
    stopped: AtomicBool,
}

/// The values the player uses for a single note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub level: u8,
    pub transpose: i8,
}

impl Default for Controls {
    fn default() -> Self {
        Controls::new(u8::MAX, 0)
    }
}

impl Controls {
    pub fn new(level: u8, transpose: i8) -> Controls {
        Controls {
            level: AtomicU8::new(level),
            transpose: AtomicI8::new(clamp_transpose(i16::from(transpose))),
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            level: self.level(),
            transpose: self.transpose(),
        }
    }

    pub fn level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    pub fn set_level(&self, level: u8) {
        self.level.store(level, Ordering::Relaxed);
    }

    /// Moves the loudness by the given amount, saturating at the ends of the range.
    pub fn nudge_level(&self, delta: i16) -> u8 {
        let level = (i16::from(self.level()) + delta).clamp(0, i16::from(u8::MAX)) as u8;
        self.set_level(level);
        level
    }

    pub fn transpose(&self) -> i8 {
        self.transpose.load(Ordering::Relaxed)
    }

    pub fn set_transpose(&self, semitones: i8) {
        self.transpose
            .store(clamp_transpose(i16::from(semitones)), Ordering::Relaxed);
    }

    /// Moves the transpose by the given number of semitones, staying within the allowed range.
    pub fn nudge_transpose(&self, delta: i8) -> i8 {
        let transpose = clamp_transpose(i16::from(self.transpose()) + i16::from(delta));
        self.transpose.store(transpose, Ordering::Relaxed);
        transpose
    }

    /// Sets the loudness from a raw analog reading.
    pub fn set_level_from_analog(&self, raw: u16) {
        self.set_level(level_from_analog(raw));
    }

    /// Sets the transpose from a raw analog reading.
    pub fn set_transpose_from_analog(&self, raw: u16) {
        self.set_transpose(transpose_from_analog(raw));
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Flips the pause flag, returning the new state.
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.paused.fetch_xor(true, Ordering::Relaxed);
        info!(paused, "Pause toggled.");
        paused
    }

    /// Requests that playback ends at the next gate boundary.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

fn clamp_transpose(semitones: i16) -> i8 {
    semitones.clamp(-i16::from(MAX_TRANSPOSE), i16::from(MAX_TRANSPOSE)) as i8
}

/// Maps a raw 0..=1023 reading onto a 0..=255 loudness level.
pub fn level_from_analog(raw: u16) -> u8 {
    let raw = u32::from(raw.min(ANALOG_MAX));
    (raw * 255 / u32::from(ANALOG_MAX)) as u8
}

/// Maps a raw 0..=1023 reading onto an even spread of semitones around zero.
pub fn transpose_from_analog(raw: u16) -> i8 {
    let raw = i32::from(raw.min(ANALOG_MAX));
    let range = i32::from(ANALOG_TRANSPOSE_RANGE);
    let buckets = 2 * range + 1;
    let bucket = (raw * buckets / (i32::from(ANALOG_MAX) + 1)).min(buckets - 1);
    (bucket - range) as i8
}
