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
use midly::num::u7;

/// The reference note, A4.
const REFERENCE_NOTE: i32 = 69;
/// The frequency of the reference note.
const REFERENCE_FREQUENCY: f64 = 440.0;

/// Anything below this is too low for a piezo to reproduce and is played as silence.
pub const MIN_AUDIBLE_HZ: f64 = 60.0;
/// The ceiling of the tone generator.
pub const MAX_TONE_HZ: f64 = 4000.0;

/// Converts a MIDI note number to a frequency in Hz using equal temperament.
pub fn midi_note_to_freq(note: u7) -> f64 {
    let semitones = i32::from(note.as_int()) - REFERENCE_NOTE;
    REFERENCE_FREQUENCY * 2.0f64.powf(f64::from(semitones) / 12.0)
}

/// Shifts a note by the given number of semitones, clamping the result to the MIDI range.
pub fn transpose(note: u7, semitones: i8) -> u7 {
    let shifted = (i16::from(note.as_int()) + i16::from(semitones)).clamp(0, 127);
    u7::new(shifted as u8)
}

/// Returns the frequency the buzzer should play for the note, rounded to whole Hz.
/// Inaudible notes return None, and notes above the tone ceiling are clamped to it.
pub fn audible_frequency(note: u7) -> Option<u32> {
    let frequency = midi_note_to_freq(note);
    if frequency < MIN_AUDIBLE_HZ {
        return None;
    }

    Some(frequency.min(MAX_TONE_HZ).round() as u32)
}
