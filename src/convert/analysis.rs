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
use std::{collections::BTreeSet, fmt};

use midly::TrackEvent;

use super::{note_message, track_name, DRUM_CHANNEL};

/// The pitch a melody is expected to sit around, A4.
const CENTER_PITCH: f64 = 69.0;

/// Statistics about a single track, used to pick the melody.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackAnalysis {
    /// The index of the track in the file.
    pub index: usize,
    /// The track name, if it has one.
    pub name: String,
    /// Ticks during which at least one note sounds.
    pub time_active: u64,
    /// Ticks during which two or more notes sound.
    pub time_poly: u64,
    /// The fraction of active time that is monophonic.
    pub mono_ratio: f64,
    pub note_on_count: usize,
    pub avg_pitch: f64,
    pub min_pitch: u8,
    pub max_pitch: u8,
    /// True if any note is on the drum channel.
    pub is_drum_track: bool,
}

impl TrackAnalysis {
    /// Analyzes a track. Drum channel notes are left out of the statistics.
    pub fn new(index: usize, track: &[TrackEvent]) -> TrackAnalysis {
        let mut active: BTreeSet<u8> = BTreeSet::new();
        let mut now: u64 = 0;
        let mut last: u64 = 0;
        let mut time_active: u64 = 0;
        let mut time_poly: u64 = 0;
        let mut pitches: Vec<u8> = Vec::new();
        let mut is_drum_track = false;

        for event in track {
            now += u64::from(event.delta.as_int());
            let dt = now - last;
            if dt > 0 && !active.is_empty() {
                time_active += dt;
                if active.len() >= 2 {
                    time_poly += dt;
                }
            }
            last = now;

            let Some(message) = note_message(&event.kind) else {
                continue;
            };
            if message.channel == DRUM_CHANNEL {
                is_drum_track = true;
                continue;
            }

            if message.is_off() {
                active.remove(&message.key);
            } else {
                active.insert(message.key);
                pitches.push(message.key);
            }
        }

        let mono_ratio = if time_active > 0 {
            (1.0 - time_poly as f64 / time_active as f64).max(0.0)
        } else {
            0.0
        };
        let avg_pitch = if pitches.is_empty() {
            CENTER_PITCH
        } else {
            pitches.iter().map(|p| f64::from(*p)).sum::<f64>() / pitches.len() as f64
        };

        TrackAnalysis {
            index,
            name: track_name(track),
            time_active,
            time_poly,
            mono_ratio,
            note_on_count: pitches.len(),
            avg_pitch,
            min_pitch: pitches.iter().copied().min().unwrap_or(0),
            max_pitch: pitches.iter().copied().max().unwrap_or(0),
            is_drum_track,
        }
    }

    /// Scores how melody-like the track is. Mostly monophonic tracks near the middle of the
    /// keyboard win. Drum and silent tracks aren't eligible at all.
    pub fn score(&self) -> Option<f64> {
        if self.is_drum_track || self.time_active == 0 || self.note_on_count == 0 {
            return None;
        }

        let pitch_score = (1.0 - (self.avg_pitch - CENTER_PITCH).abs() / 24.0).max(0.0);
        let density_score = (self.note_on_count as f64 / 200.0).min(1.0);
        Some(3.0 * self.mono_ratio + 1.5 * pitch_score + 0.5 * density_score)
    }
}

impl fmt::Display for TrackAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Track {} ({}): notes {}, mono {:.2}, pitch {:.1} [{}-{}]{}",
            self.index,
            if self.name.is_empty() { "unnamed" } else { &self.name },
            self.note_on_count,
            self.mono_ratio,
            self.avg_pitch,
            self.min_pitch,
            self.max_pitch,
            if self.is_drum_track { ", drums" } else { "" },
        )
    }
}

/// Picks the highest scoring track. The earliest track wins a tie.
pub fn best_track(analyses: &[TrackAnalysis]) -> Option<&TrackAnalysis> {
    let mut best: Option<(&TrackAnalysis, f64)> = None;
    for analysis in analyses {
        let Some(score) = analysis.score() else {
            continue;
        };
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((analysis, score)),
        }
    }
    best.map(|(analysis, _)| analysis)
}

#[cfg(test)]
mod test {
    use crate::testutil::smf::{drum_hit, note, off, on, track_named};

    use super::{best_track, TrackAnalysis};

    #[test]
    fn monophonic_track() {
        let track = track_named(
            "Lead",
            vec![note(0, 69, 100, 480), note(0, 71, 100, 480), note(480, 72, 100, 480)],
        );
        let analysis = TrackAnalysis::new(1, &track);

        assert_eq!("Lead", analysis.name);
        assert_eq!(3, analysis.note_on_count);
        assert_eq!(1440, analysis.time_active);
        assert_eq!(0, analysis.time_poly);
        assert_eq!(1.0, analysis.mono_ratio);
        assert_eq!(69, analysis.min_pitch);
        assert_eq!(72, analysis.max_pitch);
        assert!(!analysis.is_drum_track);
        assert!(analysis.score().is_some());
    }

    #[test]
    fn polyphony_lowers_the_mono_ratio() {
        // Two notes held together for the whole time.
        let track = track_named(
            "Chords",
            vec![vec![on(0, 60, 100), on(0, 64, 100), off(480, 60), off(0, 64)]],
        );
        let analysis = TrackAnalysis::new(0, &track);

        assert_eq!(480, analysis.time_active);
        assert_eq!(480, analysis.time_poly);
        assert_eq!(0.0, analysis.mono_ratio);
    }

    #[test]
    fn drums_and_empty_tracks_are_ineligible() {
        let drums = TrackAnalysis::new(
            0,
            &track_named("Drums", vec![drum_hit(0, 36, 120), note(0, 69, 100, 480)]),
        );
        assert!(drums.is_drum_track);
        assert_eq!(None, drums.score());

        let empty = TrackAnalysis::new(1, &track_named("Empty", vec![]));
        assert_eq!(None, empty.score());
        assert_eq!(69.0, empty.avg_pitch);
    }

    #[test]
    fn best_track_prefers_melody() {
        let bass = TrackAnalysis::new(
            0,
            &track_named("Bass", vec![note(0, 33, 100, 480), note(0, 35, 100, 480)]),
        );
        let lead = TrackAnalysis::new(
            1,
            &track_named("Lead", vec![note(0, 69, 100, 480), note(0, 72, 100, 480)]),
        );
        let lead_copy = TrackAnalysis {
            index: 2,
            ..lead.clone()
        };

        let analyses = vec![bass, lead, lead_copy];
        let best = best_track(&analyses).map(|analysis| analysis.index);
        assert_eq!(Some(1), best);
        assert_eq!(None, best_track(&[]));
    }
}
