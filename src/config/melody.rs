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
use std::path::Path;

use config::{Config, File};
use midly::num::u7;
use serde::Deserialize;

use crate::melody::{self, Tempo};

use super::error::ConfigError;

/// The YAML representation of a melody.
#[derive(Deserialize, Clone, Debug)]
pub struct Melody {
    /// The name of the melody. Defaults to the file name.
    name: Option<String>,
    tempo: MelodyTempo,
    events: Vec<Event>,
}

#[derive(Deserialize, Clone, Copy, Debug)]
struct MelodyTempo {
    bpm: u32,
    ticks_per_beat: u32,
}

/// A single event. A note of -1 (or anything outside 0-127) is a rest.
#[derive(Deserialize, Clone, Copy, Debug)]
struct Event {
    note: i16,
    ticks: u32,
    velocity: Option<u8>,
}

impl Melody {
    /// Parse a melody from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Melody, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Melody>()?)
    }

    /// Converts the YAML melody into a playable one.
    pub fn to_melody(&self, default_name: &str) -> Result<melody::Melody, ConfigError> {
        if self.tempo.bpm == 0 || self.tempo.ticks_per_beat == 0 {
            return Err(ConfigError::Invalid {
                field: "tempo",
                reason: "bpm and ticks_per_beat must be greater than zero".to_string(),
            });
        }

        let events = self
            .events
            .iter()
            .map(|event| {
                let melody_event = melody::Event::from_raw(event.note, event.ticks);
                match event.velocity {
                    Some(velocity) => u7::try_from(velocity)
                        .map(|velocity| melody_event.with_velocity(velocity))
                        .ok_or_else(|| ConfigError::Invalid {
                            field: "events.velocity",
                            reason: format!("{} is above 127", velocity),
                        }),
                    None => Ok(melody_event),
                }
            })
            .collect::<Result<Vec<melody::Event>, ConfigError>>()?;

        Ok(melody::Melody::new(
            self.name.as_deref().unwrap_or(default_name),
            Tempo::new(self.tempo.bpm, self.tempo.ticks_per_beat),
            events,
        ))
    }
}
