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
use super::{Event, Melody, Tempo};

/// Ticks in a quarter note for the built-in melodies.
const QUARTER: u32 = 96;

/// Expands note/divider pairs into events. The divider follows the usual buzzer sketch
/// convention: 4 is a quarter note, 8 an eighth, and a negative divider is dotted.
macro_rules! melody {
    (
        name = $name:expr,
        tempo = $tempo:expr,
        $([$($note:expr => $divider:expr),*]),*
    ) => {
        Melody::new(
            $name,
            Tempo::new($tempo, QUARTER),
            vec![
                $(
                    $(Event::from_raw($note, divider_ticks($divider)),)*
                )*
            ],
        )
    };
}

fn divider_ticks(divider: i32) -> u32 {
    let whole = QUARTER * 4;
    let ticks = whole / divider.unsigned_abs().max(1);
    if divider < 0 {
        ticks + ticks / 2
    } else {
        ticks
    }
}

const REST: i16 = -1;
const C4: i16 = 60;
const D4: i16 = 62;
const E4: i16 = 64;
const F4: i16 = 65;
const G4: i16 = 67;
const A4: i16 = 69;
const AS4: i16 = 70;
const C5: i16 = 72;

/// Happy Birthday.
/// Score available at https://musescore.com/user/8221/scores/26906
pub fn happy_birthday() -> Melody {
    melody!(
        name = "happy-birthday",
        tempo = 140,
        [C4 => 4, C4 => 8, D4 => -4, C4 => -4, F4 => -4, E4 => -2, REST => 8],
        [C4 => 4, C4 => 8, D4 => -4, C4 => -4, G4 => -4, F4 => -2, REST => 8],
        [C4 => 4, C4 => 8, C5 => -4, A4 => -4, F4 => -4, E4 => -4, D4 => -4],
        [AS4 => 4, AS4 => 8, A4 => -4, F4 => -4, G4 => -4, F4 => -2]
    )
}

/// Looks up a built-in melody by name.
pub fn get(name: &str) -> Option<Melody> {
    match name {
        "happy-birthday" => Some(happy_birthday()),
        _ => None,
    }
}
