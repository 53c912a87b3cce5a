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
//! Builders for small in-memory MIDI files.
use std::{error::Error, path::Path};

use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
};

const DRUM_CHANNEL: u8 = 9;

fn midi(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(channel),
            message,
        },
    }
}

/// A note on, on channel 1.
pub fn on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
    midi(
        delta,
        0,
        MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(vel),
        },
    )
}

/// A note off, on channel 1.
pub fn off(delta: u32, key: u8) -> TrackEvent<'static> {
    midi(
        delta,
        0,
        MidiMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(0),
        },
    )
}

/// A note on followed by its note off `length` ticks later.
pub fn note(delta: u32, key: u8, vel: u8, length: u32) -> Vec<TrackEvent<'static>> {
    vec![on(delta, key, vel), off(length, key)]
}

/// A note on the drum channel. The off is a zero velocity note on.
pub fn drum_hit(delta: u32, key: u8, length: u32) -> Vec<TrackEvent<'static>> {
    let hit = |delta, vel| {
        midi(
            delta,
            DRUM_CHANNEL,
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(vel),
            },
        )
    };
    vec![hit(delta, 100), hit(length, 0)]
}

/// A set-tempo meta event.
pub fn tempo(delta: u32, tempo_us: u32) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_us))),
    }
}

/// A track that starts with its name and ends with an end-of-track marker.
pub fn track_named(
    name: &'static str,
    events: Vec<Vec<TrackEvent<'static>>>,
) -> Vec<TrackEvent<'static>> {
    let mut track = vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
    }];
    track.extend(events.into_iter().flatten());
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

/// A multi-track file with metrical timing.
pub fn smf(ticks_per_beat: u16, tracks: Vec<Vec<TrackEvent<'static>>>) -> Smf<'static> {
    Smf {
        header: Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(ticks_per_beat)),
        ),
        tracks,
    }
}

/// Writes the file to disk.
pub fn write_smf(path: &Path, smf: &Smf) -> Result<(), Box<dyn Error>> {
    smf.save(path)?;
    Ok(())
}
