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
use super::BuzzerEvent;

/// Default shortest primary-track rest that gets filled.
pub const DEFAULT_PROLONGED_MS: u64 = 600;

/// Plays the primary (choir) line and fills its long rests with notes from the fill line.
/// Rests shorter than `prolonged_ms` stay silent. Fill notes are clipped to the rest they
/// fill, and any uncovered time inside the rest stays a rest.
pub fn merge_choir_with_fill(
    choir: &[BuzzerEvent],
    fill: &[BuzzerEvent],
    prolonged_ms: u64,
) -> Vec<BuzzerEvent> {
    let mut fill_notes: Vec<&BuzzerEvent> = fill.iter().filter(|event| !event.rest).collect();
    fill_notes.sort_by_key(|event| event.start_ms);

    let mut merged: Vec<BuzzerEvent> = Vec::with_capacity(choir.len());
    for event in choir {
        if !event.rest || event.duration_ms < prolonged_ms {
            merged.push(event.clone());
            continue;
        }

        let rest_start = event.start_ms;
        let rest_end = event.end_ms();
        let mut current = rest_start;
        for note in fill_notes
            .iter()
            .filter(|note| note.start_ms < rest_end && note.end_ms() > rest_start)
        {
            let start = note.start_ms.max(current);
            let end = note.end_ms().min(rest_end);
            if end <= start {
                continue;
            }
            if start > current {
                merged.push(BuzzerEvent::rest(current, start - current));
            }

            let mut clipped = (*note).clone();
            clipped.start_ms = start;
            clipped.duration_ms = end - start;
            clipped.gate_ms = clipped.gate_ms.map(|gate| gate.min(end - start));
            merged.push(clipped);
            current = end;
        }
        if current < rest_end {
            merged.push(BuzzerEvent::rest(current, rest_end - current));
        }
    }

    merged
}
