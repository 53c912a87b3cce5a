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
use std::{
    error::Error,
    fs,
    io::{self, Write},
    path::Path,
    time::Duration,
};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::{
    convert::{tempo_map::TempoMap, track_name},
    util::{duration_minutes_seconds, filename_display, note_name},
};

/// How many events per track are printed in full.
const MAX_EVENTS: usize = 50;

/// Prints the structure of a MIDI file: the header, then each track with its first events.
pub fn inspect_file<W: Write>(path: &Path, out: &mut W) -> Result<(), Box<dyn Error>> {
    let buf = fs::read(path)?;
    let smf = Smf::parse(&buf)?;
    inspect(&smf, filename_display(path), out)?;
    Ok(())
}

pub fn inspect<W: Write>(smf: &Smf, name: &str, out: &mut W) -> io::Result<()> {
    writeln!(out, "File: {}", name)?;
    writeln!(out, "  Format: {:?}", smf.header.format)?;
    match smf.header.timing {
        Timing::Metrical(ticks_per_beat) => {
            writeln!(out, "  Timing: {} ticks/beat", ticks_per_beat.as_int())?;
            let tempo_track: &[TrackEvent] = smf.tracks.first().map(Vec::as_slice).unwrap_or(&[]);
            let tempo_map = TempoMap::from_track(tempo_track, ticks_per_beat.as_int());
            let last_tick = smf.tracks.iter().map(|track| track_length(track)).max();
            let length_ms = tempo_map.tick_to_ms(last_tick.unwrap_or(0));
            writeln!(
                out,
                "  Length: {}",
                duration_minutes_seconds(Duration::from_millis(length_ms as u64))
            )?;
        }
        Timing::Timecode(fps, subframe) => {
            writeln!(
                out,
                "  Timing: {} fps, {} ticks/frame",
                fps.as_f32(),
                subframe
            )?;
        }
    }
    writeln!(out, "  Tracks: {}", smf.tracks.len())?;

    for (index, track) in smf.tracks.iter().enumerate() {
        let name = track_name(track);
        writeln!(out)?;
        writeln!(
            out,
            "Track {}: {} ({} events)",
            index,
            if name.is_empty() { "unnamed" } else { &name },
            track.len()
        )?;

        let mut tick: u64 = 0;
        for (event_index, event) in track.iter().enumerate() {
            if event_index >= MAX_EVENTS {
                writeln!(out, "  ... ({} more events)", track.len() - MAX_EVENTS)?;
                break;
            }
            tick += u64::from(event.delta.as_int());
            writeln!(
                out,
                "  [{}] tick {}: {}",
                event_index,
                tick,
                describe(&event.kind)
            )?;
        }
    }

    Ok(())
}

fn track_length(track: &[TrackEvent]) -> u64 {
    track
        .iter()
        .map(|event| u64::from(event.delta.as_int()))
        .sum()
}

/// Describes a single event, naming the notes.
fn describe(kind: &TrackEventKind) -> String {
    match kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int() + 1;
            match message {
                MidiMessage::NoteOn { key, vel } => format!(
                    "note on ch{} {} ({}) vel {}",
                    channel,
                    note_name(*key),
                    key.as_int(),
                    vel.as_int()
                ),
                MidiMessage::NoteOff { key, vel } => format!(
                    "note off ch{} {} ({}) vel {}",
                    channel,
                    note_name(*key),
                    key.as_int(),
                    vel.as_int()
                ),
                message => format!("ch{} {:?}", channel, message),
            }
        }
        TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
            format!("track name {:?}", String::from_utf8_lossy(name))
        }
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
            let tempo_us = tempo.as_int();
            format!(
                "tempo {} us/beat ({:.1} BPM)",
                tempo_us,
                60_000_000.0 / f64::from(tempo_us.max(1))
            )
        }
        TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator, _, _)) => {
            format!("time signature {}/{}", numerator, 1u32 << (*denominator).min(31))
        }
        TrackEventKind::Meta(MetaMessage::EndOfTrack) => "end of track".to_string(),
        TrackEventKind::Meta(meta) => format!("meta {:?}", meta),
        TrackEventKind::SysEx(data) => format!("sysex ({} bytes)", data.len()),
        TrackEventKind::Escape(data) => format!("escape ({} bytes)", data.len()),
    }
}
