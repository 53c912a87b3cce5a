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
use midly::{MetaMessage, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};

/// The tempo used until the first set-tempo event, 120 BPM.
pub const DEFAULT_TEMPO_US: u32 = 500_000;

/// A tempo change as written to the buzzer JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub tempo_us: u32,
    pub bpm: u32,
}

/// Maps absolute ticks to wall clock time. There is always an entry at tick zero and no two
/// entries share a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TempoMap {
    ticks_per_beat: u16,
    changes: Vec<(u64, u32)>,
}

impl TempoMap {
    /// Builds the tempo map from the set-tempo events of a track (track zero, by convention).
    /// When several changes land on the same tick the last one wins.
    pub fn from_track(track: &[TrackEvent], ticks_per_beat: u16) -> TempoMap {
        let mut raw: Vec<(u64, u32)> = vec![(0, DEFAULT_TEMPO_US)];
        let mut now: u64 = 0;
        for event in track {
            now += u64::from(event.delta.as_int());
            if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                raw.push((now, tempo.as_int()));
            }
        }

        TempoMap::from_changes(raw, ticks_per_beat)
    }

    /// Builds a tempo map from (tick, microseconds per beat) pairs.
    pub fn from_changes(mut raw: Vec<(u64, u32)>, ticks_per_beat: u16) -> TempoMap {
        // Stable, so same-tick changes keep their file order.
        raw.sort_by_key(|(tick, _)| *tick);

        let mut changes: Vec<(u64, u32)> = Vec::with_capacity(raw.len());
        for (tick, tempo_us) in raw {
            match changes.last_mut() {
                Some(last) if last.0 == tick => last.1 = tempo_us,
                _ => changes.push((tick, tempo_us)),
            }
        }
        if changes.first().map(|(tick, _)| *tick) != Some(0) {
            changes.insert(0, (0, DEFAULT_TEMPO_US));
        }

        TempoMap {
            ticks_per_beat,
            changes,
        }
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    /// The tempo in effect at tick zero, in microseconds per beat.
    pub fn initial_tempo_us(&self) -> u32 {
        self.changes[0].1
    }

    /// The tempo in effect at tick zero, in rounded beats per minute.
    pub fn initial_bpm(&self) -> u32 {
        bpm(self.initial_tempo_us())
    }

    /// Converts an absolute tick to milliseconds, summing each tempo segment up to the tick.
    pub fn tick_to_ms(&self, tick: u64) -> f64 {
        if self.ticks_per_beat == 0 {
            return 0.0;
        }

        let mut total_us = 0.0;
        let mut prev_tick: u64 = 0;
        let mut prev_tempo = self.changes[0].1;
        for (change_tick, tempo_us) in &self.changes {
            if *change_tick > tick {
                break;
            }
            total_us += self.segment_us(*change_tick - prev_tick, prev_tempo);
            prev_tick = *change_tick;
            prev_tempo = *tempo_us;
        }
        total_us += self.segment_us(tick - prev_tick, prev_tempo);

        total_us / 1000.0
    }

    fn segment_us(&self, ticks: u64, tempo_us: u32) -> f64 {
        ticks as f64 * f64::from(tempo_us) / f64::from(self.ticks_per_beat)
    }

    /// The tempo changes in the form written to the buzzer JSON.
    pub fn changes(&self) -> Vec<TempoChange> {
        self.changes
            .iter()
            .map(|(tick, tempo_us)| TempoChange {
                tick: *tick,
                tempo_us: *tempo_us,
                bpm: bpm(*tempo_us),
            })
            .collect()
    }
}

/// Converts microseconds per beat to rounded beats per minute.
fn bpm(tempo_us: u32) -> u32 {
    if tempo_us == 0 {
        return 0;
    }
    (60_000_000.0 / f64::from(tempo_us)).round() as u32
}
