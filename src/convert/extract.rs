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
use std::collections::BTreeMap;

use midly::{num::u7, TrackEvent};

use crate::pitch;

use super::{
    note_message, tempo_map::TempoMap, BuzzerEvent, DRUM_CHANNEL, GATE_RATIO, LOUDNESS_LEVELS,
    MAX_NOTE, MIN_GATE_MS, MIN_NOTE,
};

/// A stretch of the track during which a single note is the highest one sounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    start_tick: u64,
    end_tick: u64,
    note: u8,
    velocity: u8,
}

/// The note currently chosen to sound, identified by (note, note-on tick, velocity).
type Chosen = Option<(u8, u64, u8)>;

/// Walks the track and closes a segment every time the chosen note changes. A segment starts
/// when its note became the chosen one, so segments never overlap.
fn segments(track: &[TrackEvent]) -> Vec<Segment> {
    let mut active: BTreeMap<u8, (u64, u8)> = BTreeMap::new();
    let mut segments: Vec<Segment> = Vec::new();
    let mut now: u64 = 0;
    let mut chosen: Chosen = None;
    let mut since: u64 = 0;

    for event in track {
        now += u64::from(event.delta.as_int());

        let Some(message) = note_message(&event.kind) else {
            continue;
        };
        if message.channel == DRUM_CHANNEL {
            continue;
        }

        if message.is_off() {
            active.remove(&message.key);
        } else {
            active.insert(message.key, (now, message.velocity));
        }

        let current: Chosen = active
            .last_key_value()
            .map(|(note, (start, velocity))| (*note, *start, *velocity));
        if current == chosen {
            continue;
        }
        if let Some((note, _, velocity)) = chosen {
            if now > since {
                segments.push(Segment {
                    start_tick: since,
                    end_tick: now,
                    note,
                    velocity,
                });
            }
        }
        chosen = current;
        since = now;
    }

    // Anything still sounding runs to the end of the track.
    if let Some((note, _, velocity)) = chosen {
        let last_tick: u64 = track.iter().map(|event| u64::from(event.delta.as_int())).sum();
        if last_tick > since {
            segments.push(Segment {
                start_tick: since,
                end_tick: last_tick,
                note,
                velocity,
            });
        }
    }

    segments
}

/// Extracts a monophonic line from the track by always following the highest note that's
/// sounding. Gaps between notes become rests, and drums are ignored. With `trim`, leading
/// rests are dropped and the first note starts at zero.
pub fn extract(track: &[TrackEvent], tempo_map: &TempoMap, trim: bool) -> Vec<BuzzerEvent> {
    let mut events: Vec<BuzzerEvent> = Vec::new();
    let mut last_end_tick: u64 = 0;

    for segment in segments(track) {
        if segment.start_tick > last_end_tick {
            let rest_start_ms = tempo_map.tick_to_ms(last_end_tick);
            let rest_ms = tempo_map.tick_to_ms(segment.start_tick) - rest_start_ms;
            if rest_ms >= 1.0 {
                events.push(BuzzerEvent::rest(round_ms(rest_start_ms), round_ms(rest_ms)));
            }
        }

        let start_ms = tempo_map.tick_to_ms(segment.start_tick);
        let duration_ms = tempo_map.tick_to_ms(segment.end_tick) - start_ms;
        let gate_ms = (duration_ms * GATE_RATIO).max(MIN_GATE_MS);
        let note = transpose_into_range(segment.note);
        let frequency_hz = pitch::midi_note_to_freq(u7::new(note)).round() as u32;

        events.push(BuzzerEvent::note(
            round_ms(start_ms),
            round_ms(duration_ms),
            round_ms(gate_ms),
            note,
            frequency_hz,
            velocity_to_loudness(segment.velocity, LOUDNESS_LEVELS),
            segment.velocity,
        ));
        last_end_tick = segment.end_tick;
    }

    if trim {
        trim_and_rebase(&mut events);
    }
    events
}

fn round_ms(ms: f64) -> u64 {
    ms.round().max(0.0) as u64
}

/// Drops leading rests and shifts everything so the first note starts at zero.
pub fn trim_and_rebase(events: &mut Vec<BuzzerEvent>) {
    let Some(first_note) = events.iter().position(|event| !event.rest) else {
        events.clear();
        return;
    };
    events.drain(..first_note);

    let first_start = events[0].start_ms;
    for event in events.iter_mut() {
        event.start_ms = event.start_ms.saturating_sub(first_start);
    }
}

/// Shortens every rest longer than the limit and lays the events end to end from zero. A
/// limit of zero leaves the events alone.
pub fn cap_long_rests(events: &mut [BuzzerEvent], max_rest_ms: u64) {
    if max_rest_ms == 0 {
        return;
    }

    let mut now: u64 = 0;
    for event in events.iter_mut() {
        if event.rest && event.duration_ms > max_rest_ms {
            event.duration_ms = max_rest_ms;
        }
        event.start_ms = now;
        now += event.duration_ms;
    }
}

/// Moves a note by octaves until it fits in the buzzer's range.
pub fn transpose_into_range(note: u8) -> u8 {
    let mut note = note;
    while note < MIN_NOTE {
        note += 12;
    }
    while note > MAX_NOTE {
        note -= 12;
    }
    note
}

/// Maps a velocity onto 1..=levels. A velocity of zero is silent.
pub fn velocity_to_loudness(velocity: u8, levels: u8) -> u8 {
    if velocity == 0 {
        return 0;
    }
    let velocity = u32::from(velocity.min(127));
    let level = 1 + (velocity - 1) * u32::from(levels) / 127;
    level.clamp(1, u32::from(levels.max(1))) as u8
}
