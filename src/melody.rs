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
use std::{fmt, sync::Arc, time::Duration};

use midly::num::u7;

use crate::util::duration_minutes_seconds;

pub mod builtin;

/// A single step of a melody: a note (or a rest) held for a number of ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    /// The MIDI note to sound. None is a rest.
    note: Option<u7>,
    /// The length of the event in tempo independent ticks.
    ticks: u32,
    /// Optional dynamics. Scales the target loudness by velocity / 127.
    velocity: Option<u7>,
}

impl Event {
    /// Creates a sounding event.
    pub fn note(note: u7, ticks: u32) -> Event {
        Event {
            note: Some(note),
            ticks,
            velocity: None,
        }
    }

    /// Creates a rest.
    pub fn rest(ticks: u32) -> Event {
        Event {
            note: None,
            ticks,
            velocity: None,
        }
    }

    /// Creates an event from a raw note number. Anything outside of 0..=127 (conventionally -1)
    /// is treated as a rest.
    pub fn from_raw(note: i16, ticks: u32) -> Event {
        match u8::try_from(note).ok().and_then(u7::try_from) {
            Some(note) => Event::note(note, ticks),
            None => Event::rest(ticks),
        }
    }

    /// Attaches a velocity to the event.
    pub fn with_velocity(mut self, velocity: u7) -> Event {
        self.velocity = Some(velocity);
        self
    }

    pub fn get_note(&self) -> Option<u7> {
        self.note
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn velocity(&self) -> Option<u7> {
        self.velocity
    }

    pub fn is_rest(&self) -> bool {
        self.note.is_none()
    }
}

/// Converts ticks into wall clock time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tempo {
    beats_per_minute: u32,
    ticks_per_beat: u32,
}

impl Tempo {
    pub fn new(beats_per_minute: u32, ticks_per_beat: u32) -> Tempo {
        Tempo {
            beats_per_minute,
            ticks_per_beat,
        }
    }

    /// A tempo where one tick is exactly one millisecond.
    pub fn milliseconds() -> Tempo {
        Tempo::new(60, 1000)
    }

    pub fn beats_per_minute(&self) -> u32 {
        self.beats_per_minute
    }

    pub fn ticks_per_beat(&self) -> u32 {
        self.ticks_per_beat
    }

    /// Converts ticks to milliseconds, rounding to the nearest millisecond. A degenerate tempo
    /// (zero BPM or zero ticks per beat) yields zero.
    pub fn ticks_to_ms(&self, ticks: u32) -> u32 {
        let denominator = u64::from(self.beats_per_minute) * u64::from(self.ticks_per_beat);
        if denominator == 0 {
            return 0;
        }

        let numerator = u64::from(ticks) * 60_000;
        let ms = (numerator + denominator / 2) / denominator;
        u32::try_from(ms).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} BPM, {} ticks/beat",
            self.beats_per_minute, self.ticks_per_beat
        )
    }
}

/// An immutable melody. Cloning is cheap, the events are shared.
#[derive(Clone, Debug)]
pub struct Melody {
    name: String,
    tempo: Tempo,
    events: Arc<[Event]>,
}

impl Melody {
    pub fn new(name: &str, tempo: Tempo, events: Vec<Event>) -> Melody {
        Melody {
            name: name.to_string(),
            tempo,
            events: events.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The total length of a single pass through the melody.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(
            self.events
                .iter()
                .map(|event| u64::from(self.tempo.ticks_to_ms(event.ticks)))
                .sum(),
        )
    }
}

impl fmt::Display for Melody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let notes = self.events.iter().filter(|event| !event.is_rest()).count();
        write!(
            f,
            "{} (Events: {}, Notes: {}, Duration: {}, Tempo: {})",
            self.name,
            self.events.len(),
            notes,
            duration_minutes_seconds(self.duration()),
            self.tempo,
        )
    }
}

#[cfg(test)]
mod test {
    use midly::num::u7;

    use super::{Event, Melody, Tempo};

    #[test]
    fn ticks_to_ms() {
        let tempo = Tempo::new(120, 384);
        assert_eq!(0, tempo.ticks_to_ms(0));
        assert_eq!(500, tempo.ticks_to_ms(384));
        assert_eq!(250, tempo.ticks_to_ms(192));
        // 200 * 60000 / 46080 = 260.41...
        assert_eq!(260, tempo.ticks_to_ms(200));
        // 1 * 60000 / 46080 = 1.30...
        assert_eq!(1, tempo.ticks_to_ms(1));
    }

    #[test]
    fn ticks_to_ms_is_monotonic() {
        for tempo in [Tempo::new(120, 384), Tempo::new(37, 7), Tempo::new(300, 960)] {
            let mut last = 0;
            for ticks in 0..5000 {
                let ms = tempo.ticks_to_ms(ticks);
                assert!(ms >= last, "{} went backwards at {} ticks", tempo, ticks);
                last = ms;
            }
        }
    }

    #[test]
    fn ticks_to_ms_degenerate_tempo() {
        assert_eq!(0, Tempo::new(0, 384).ticks_to_ms(1000));
        assert_eq!(0, Tempo::new(120, 0).ticks_to_ms(1000));
    }

    #[test]
    fn millisecond_tempo() {
        let tempo = Tempo::milliseconds();
        assert_eq!(1234, tempo.ticks_to_ms(1234));
    }

    #[test]
    fn raw_notes() {
        assert_eq!(Event::rest(200), Event::from_raw(-1, 200));
        assert_eq!(Event::rest(200), Event::from_raw(128, 200));
        assert_eq!(Event::note(u7::new(60), 200), Event::from_raw(60, 200));
        assert!(Event::from_raw(-1, 10).is_rest());
    }

    #[test]
    fn melody_duration() {
        let melody = Melody::new(
            "test",
            Tempo::new(120, 384),
            vec![
                Event::note(u7::new(60), 384),
                Event::rest(384),
                Event::note(u7::new(62), 768),
            ],
        );
        assert_eq!(2000, melody.duration().as_millis());
        assert_eq!(3, melody.len());
        assert_eq!(
            "test (Events: 3, Notes: 2, Duration: 0:02, Tempo: 120 BPM, 384 ticks/beat)",
            melody.to_string()
        );
    }
}
