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
    fmt, fs, io,
    path::{Path, PathBuf},
};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, span, Level};

use crate::{
    melody::{self, Melody, Tempo},
    util::filename_display,
};

use self::{analysis::TrackAnalysis, tempo_map::TempoMap};

pub mod analysis;
pub mod extract;
pub mod merge;
pub mod tempo_map;

pub use self::tempo_map::TempoChange;

/// MIDI channel 10, which General MIDI reserves for percussion.
const DRUM_CHANNEL: u8 = 9;

/// Fraction of a note's duration the buzzer is meant to sound.
pub const GATE_RATIO: f64 = 0.9;
/// Shortest gate that is still audible on a piezo.
pub const MIN_GATE_MS: f64 = 30.0;
/// Number of loudness steps velocities are mapped onto.
pub const LOUDNESS_LEVELS: u8 = 3;
/// Lowest note the buzzer plays well, C3.
pub const MIN_NOTE: u8 = 48;
/// Highest note the buzzer plays well, C7.
pub const MAX_NOTE: u8 = 96;
/// Default cap for rests in single track mode.
pub const DEFAULT_MAX_REST_MS: u64 = 2000;

/// Typed errors for converting a MIDI file to buzzer JSON.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("MIDI parse error: {0}")]
    Midi(#[from] midly::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("track {track} is out of range, the file has {tracks} tracks")]
    TrackOutOfRange { track: usize, tracks: usize },

    #[error("no suitable melody track")]
    NoSuitableTrack,

    #[error("no events on track {0}")]
    NoEvents(usize),

    #[error("timecode based timing is not supported")]
    UnsupportedTiming,
}

/// A single note or rest in a buzzer song. Times are integer milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuzzerEvent {
    pub start_ms: u64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub rest: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loudness_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<u8>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl BuzzerEvent {
    pub fn rest(start_ms: u64, duration_ms: u64) -> BuzzerEvent {
        BuzzerEvent {
            start_ms,
            duration_ms,
            rest: true,
            ..Default::default()
        }
    }

    pub fn note(
        start_ms: u64,
        duration_ms: u64,
        gate_ms: u64,
        note: u8,
        frequency_hz: u32,
        loudness_level: u8,
        velocity: u8,
    ) -> BuzzerEvent {
        BuzzerEvent {
            start_ms,
            duration_ms,
            rest: false,
            gate_ms: Some(gate_ms),
            note: Some(note),
            frequency_hz: Some(frequency_hz),
            loudness_level: Some(loudness_level),
            velocity: Some(velocity),
        }
    }

    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }
}

/// The note range written to the buzzer JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteRange {
    pub min_note: u8,
    pub max_note: u8,
}

impl Default for NoteRange {
    fn default() -> Self {
        NoteRange {
            min_note: MIN_NOTE,
            max_note: MAX_NOTE,
        }
    }
}

/// A converted song. Only the events are needed to play it back, the rest describes where
/// it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuzzerSong {
    pub source_midi: String,
    pub ticks_per_beat: u16,
    pub tempo_bpm: u32,
    pub tempo_changes: Vec<TempoChange>,
    pub selected_track_index: usize,
    pub selected_track_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_track_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_track_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prolonged_pause_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_1based: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rest_ms: Option<u64>,
    pub gate_ratio: f64,
    pub loudness_levels: u8,
    pub note_range: NoteRange,
    pub events: Vec<BuzzerEvent>,
}

impl Default for BuzzerSong {
    fn default() -> Self {
        BuzzerSong {
            source_midi: String::new(),
            ticks_per_beat: 0,
            tempo_bpm: 0,
            tempo_changes: Vec::new(),
            selected_track_index: 0,
            selected_track_name: String::new(),
            fill_track_index: None,
            fill_track_name: None,
            prolonged_pause_ms: None,
            track_1based: None,
            max_rest_ms: None,
            gate_ratio: GATE_RATIO,
            loudness_levels: LOUDNESS_LEVELS,
            note_range: NoteRange::default(),
            events: Vec::new(),
        }
    }
}

impl BuzzerSong {
    /// Reads a buzzer song from a JSON file.
    pub fn read(path: &Path) -> Result<BuzzerSong, ConvertError> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    /// Writes the song as JSON, pretty printed unless compact is set.
    pub fn write(&self, path: &Path, compact: bool) -> Result<(), ConvertError> {
        let file = io::BufWriter::new(fs::File::create(path)?);
        if compact {
            serde_json::to_writer(file, self)?;
        } else {
            serde_json::to_writer_pretty(file, self)?;
        }
        Ok(())
    }

    /// Counts the events that aren't rests.
    pub fn note_count(&self) -> usize {
        self.events.iter().filter(|event| !event.rest).count()
    }

    /// The end of the last event.
    pub fn duration_ms(&self) -> u64 {
        self.events.iter().map(BuzzerEvent::end_ms).max().unwrap_or(0)
    }

    /// Turns the song into a playable melody. Ticks are milliseconds and velocity carries the
    /// dynamics. Notes without a usable note number play as rests.
    pub fn to_melody(&self, name: &str) -> Melody {
        let events = self
            .events
            .iter()
            .map(|event| {
                let duration = u32::try_from(event.duration_ms).unwrap_or(u32::MAX);
                match event.note {
                    Some(note) if !event.rest => {
                        let melody_event = melody::Event::from_raw(i16::from(note), duration);
                        match event.velocity {
                            Some(velocity) => melody_event
                                .with_velocity(midly::num::u7::new(velocity.min(127))),
                            None => melody_event,
                        }
                    }
                    _ => melody::Event::rest(duration),
                }
            })
            .collect();

        Melody::new(name, Tempo::milliseconds(), events)
    }
}

/// Which track (or tracks) to take the melody from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Pick the most melody-like track.
    Auto,
    /// Use a single track (1-based) and cap its long rests.
    Track { track: usize, max_rest_ms: u64 },
    /// Use the choir track (1-based) and fill its prolonged rests from the fill track.
    ChoirFill {
        choir: usize,
        fill: usize,
        prolonged_ms: u64,
    },
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Auto => write!(f, "auto"),
            Mode::Track { track, max_rest_ms } => {
                write!(f, "track {} (rests capped at {}ms)", track, max_rest_ms)
            }
            Mode::ChoirFill {
                choir,
                fill,
                prolonged_ms,
            } => write!(
                f,
                "choir {} with fill {} (rests of {}ms or more)",
                choir, fill, prolonged_ms
            ),
        }
    }
}

/// Conversion options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    pub mode: Mode,
    /// Drop leading rests so the song starts with its first note.
    pub trim: bool,
    /// Write JSON without whitespace.
    pub compact: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            mode: Mode::Auto,
            trim: true,
            compact: false,
        }
    }
}

/// Where the buzzer JSON for the given MIDI file is written.
pub fn output_path(midi_path: &Path, mode: Mode) -> PathBuf {
    match mode {
        Mode::Track { track, .. } => {
            let stem = midi_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            midi_path.with_file_name(format!("{}.track{}.buzzer.json", stem, track))
        }
        _ => midi_path.with_extension("buzzer.json"),
    }
}

/// Converts a MIDI file and writes the buzzer JSON next to it. Returns the output path.
pub fn convert_file(midi_path: &Path, options: &Options) -> Result<PathBuf, ConvertError> {
    let span = span!(Level::INFO, "convert", file = filename_display(midi_path));
    let _enter = span.enter();

    let buf = fs::read(midi_path)?;
    let smf = Smf::parse(&buf)?;
    let song = convert_smf(&smf, filename_display(midi_path), options)?;

    let out_path = output_path(midi_path, options.mode);
    song.write(&out_path, options.compact)?;
    info!(
        output = filename_display(&out_path),
        notes = song.note_count(),
        events = song.events.len(),
        seconds = song.duration_ms() as f64 / 1000.0,
        track = song.selected_track_name,
        fill = ?song.fill_track_name,
        "Wrote buzzer JSON."
    );
    Ok(out_path)
}

/// Converts a batch of MIDI files in parallel. One failure doesn't stop the others.
pub fn convert_all(
    midi_paths: &[PathBuf],
    options: &Options,
) -> Vec<(PathBuf, Result<PathBuf, ConvertError>)> {
    midi_paths
        .par_iter()
        .map(|midi_path| {
            let result = convert_file(midi_path, options);
            if let Err(e) = &result {
                error!(
                    file = filename_display(midi_path),
                    err = e.to_string(),
                    "Failed to convert."
                );
            }
            (midi_path.clone(), result)
        })
        .collect()
}

/// Converts a parsed MIDI file to a buzzer song.
pub fn convert_smf(
    smf: &Smf,
    source_name: &str,
    options: &Options,
) -> Result<BuzzerSong, ConvertError> {
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(ticks_per_beat) => ticks_per_beat.as_int(),
        Timing::Timecode(..) => return Err(ConvertError::UnsupportedTiming),
    };
    let tempo_track: &[TrackEvent] = smf.tracks.first().map(Vec::as_slice).unwrap_or(&[]);
    let tempo_map = TempoMap::from_track(tempo_track, ticks_per_beat);

    let mut song = BuzzerSong {
        source_midi: source_name.to_string(),
        ticks_per_beat,
        tempo_bpm: tempo_map.initial_bpm(),
        tempo_changes: tempo_map.changes(),
        ..Default::default()
    };

    match options.mode {
        Mode::Auto => {
            let analyses: Vec<TrackAnalysis> = smf
                .tracks
                .iter()
                .enumerate()
                .map(|(index, track)| TrackAnalysis::new(index, track))
                .collect();
            for analysis in &analyses {
                info!(score = ?analysis.score(), "{}", analysis);
            }
            let best = analysis::best_track(&analyses).ok_or(ConvertError::NoSuitableTrack)?;

            song.selected_track_index = best.index;
            song.selected_track_name = best.name.clone();
            song.events = extract::extract(&smf.tracks[best.index], &tempo_map, options.trim);
        }
        Mode::Track { track, max_rest_ms } => {
            let index = track_index(smf, track)?;
            let mut events = extract::extract(&smf.tracks[index], &tempo_map, options.trim);
            if events.is_empty() {
                return Err(ConvertError::NoEvents(track));
            }
            extract::cap_long_rests(&mut events, max_rest_ms);

            song.selected_track_index = index;
            song.selected_track_name = track_name(&smf.tracks[index]);
            song.track_1based = Some(track);
            song.max_rest_ms = Some(max_rest_ms);
            song.events = events;
        }
        Mode::ChoirFill {
            choir,
            fill,
            prolonged_ms,
        } => {
            let choir_index = track_index(smf, choir)?;
            let fill_index = track_index(smf, fill)?;
            let choir_events = extract::extract(&smf.tracks[choir_index], &tempo_map, false);
            let fill_events = extract::extract(&smf.tracks[fill_index], &tempo_map, false);
            let mut events = merge::merge_choir_with_fill(&choir_events, &fill_events, prolonged_ms);
            if options.trim {
                extract::trim_and_rebase(&mut events);
            }

            song.selected_track_index = choir_index;
            song.selected_track_name = track_name(&smf.tracks[choir_index]);
            song.fill_track_index = Some(fill_index);
            song.fill_track_name = Some(track_name(&smf.tracks[fill_index]));
            song.prolonged_pause_ms = Some(prolonged_ms);
            song.events = events;
        }
    }

    Ok(song)
}

/// Turns a 1-based track number into an index, checking it against the file.
fn track_index(smf: &Smf, track: usize) -> Result<usize, ConvertError> {
    if track == 0 || track > smf.tracks.len() {
        return Err(ConvertError::TrackOutOfRange {
            track,
            tracks: smf.tracks.len(),
        });
    }
    Ok(track - 1)
}

/// A note on or off. Note ons with zero velocity are offs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NoteMessage {
    channel: u8,
    key: u8,
    velocity: u8,
}

impl NoteMessage {
    fn is_off(&self) -> bool {
        self.velocity == 0
    }
}

/// Pulls the note on/off out of a track event, if it is one.
fn note_message(kind: &TrackEventKind) -> Option<NoteMessage> {
    let TrackEventKind::Midi { channel, message } = kind else {
        return None;
    };
    let (key, velocity) = match message {
        MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int()),
        MidiMessage::NoteOff { key, .. } => (key.as_int(), 0),
        _ => return None,
    };
    Some(NoteMessage {
        channel: channel.as_int(),
        key,
        velocity,
    })
}

/// The first track name in the track, trimmed. Empty if there isn't one.
pub fn track_name(track: &[TrackEvent]) -> String {
    track
        .iter()
        .find_map(|event| match event.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                Some(String::from_utf8_lossy(name).trim().to_string())
            }
            _ => None,
        })
        .unwrap_or_default()
}
