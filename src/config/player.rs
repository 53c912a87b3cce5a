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
use std::{path::Path, time::Duration};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use crate::{envelope::EnvelopeConfig, player::Settings};

use super::error::ConfigError;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_LEVEL: u8 = 255;

/// The YAML configuration for the player. Every field is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    /// The tone device to play on.
    device: Option<String>,
    /// The width of a single gate, e.g. 4ms.
    gate_period: Option<String>,
    /// Silence at the end of each note.
    inter_note_gap: Option<String>,
    /// The pause between passes of the melody.
    loop_pause: Option<String>,
    /// How many passes to play. Omit to loop forever.
    loops: Option<u32>,
    /// The starting loudness, 0-255.
    level: Option<u8>,
    /// The starting transpose, in semitones.
    transpose: Option<i8>,
    /// Attack and release settings.
    envelope: Option<Envelope>,
}

/// The envelope block. Anything left out keeps its default.
#[derive(Deserialize, Clone, Debug, Default)]
struct Envelope {
    attack_percent: Option<u32>,
    release_percent: Option<u32>,
    attack_min_ms: Option<u32>,
    attack_max_ms: Option<u32>,
    release_min_ms: Option<u32>,
    release_max_ms: Option<u32>,
}

impl Player {
    /// Parse the player configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?)
    }

    /// Returns the tone device name.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the starting loudness.
    pub fn level(&self) -> u8 {
        self.level.unwrap_or(DEFAULT_LEVEL)
    }

    /// Returns the starting transpose.
    pub fn transpose(&self) -> i8 {
        self.transpose.unwrap_or(0)
    }

    /// Builds the player settings, starting from the defaults.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let defaults = Settings::default();

        let gate_period_ms = match &self.gate_period {
            Some(gate_period) => whole_millis("gate_period", gate_period)?,
            None => defaults.gate_period_ms,
        };
        if gate_period_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "gate_period",
                reason: "must be at least 1ms".to_string(),
            });
        }

        let inter_note_gap_ms = match &self.inter_note_gap {
            Some(gap) => whole_millis("inter_note_gap", gap)?,
            None => defaults.inter_note_gap_ms,
        };
        let loop_pause = match &self.loop_pause {
            Some(loop_pause) => parse_duration("loop_pause", loop_pause)?,
            None => defaults.loop_pause,
        };
        if self.loops == Some(0) {
            return Err(ConfigError::Invalid {
                field: "loops",
                reason: "must be at least 1, or omitted to loop forever".to_string(),
            });
        }

        Ok(Settings {
            gate_period_ms,
            inter_note_gap_ms,
            loop_pause,
            envelope: self.envelope.clone().unwrap_or_default().to_config()?,
            loops: self.loops,
        })
    }
}

impl Envelope {
    fn to_config(&self) -> Result<EnvelopeConfig, ConfigError> {
        let defaults = EnvelopeConfig::default();
        let envelope = EnvelopeConfig {
            attack_percent: self.attack_percent.unwrap_or(defaults.attack_percent),
            release_percent: self.release_percent.unwrap_or(defaults.release_percent),
            attack_min_ms: self.attack_min_ms.unwrap_or(defaults.attack_min_ms),
            attack_max_ms: self.attack_max_ms.unwrap_or(defaults.attack_max_ms),
            release_min_ms: self.release_min_ms.unwrap_or(defaults.release_min_ms),
            release_max_ms: self.release_max_ms.unwrap_or(defaults.release_max_ms),
        };

        if envelope.attack_min_ms > envelope.attack_max_ms {
            return Err(ConfigError::Invalid {
                field: "envelope.attack_min_ms",
                reason: "must not be greater than attack_max_ms".to_string(),
            });
        }
        if envelope.release_min_ms > envelope.release_max_ms {
            return Err(ConfigError::Invalid {
                field: "envelope.release_min_ms",
                reason: "must not be greater than release_max_ms".to_string(),
            });
        }
        Ok(envelope)
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Duration::from)
        .map_err(|e| ConfigError::Duration {
            field,
            reason: format!("{}: {}", value, e),
        })
}

fn whole_millis(field: &'static str, value: &str) -> Result<u32, ConfigError> {
    let duration = parse_duration(field, value)?;
    u32::try_from(duration.as_millis()).map_err(|_| ConfigError::Duration {
        field,
        reason: format!("{} is too long", value),
    })
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use config::{Config, File, FileFormat};

    use crate::{config::ConfigError, envelope::EnvelopeConfig, player::Settings};

    use super::Player;

    fn parse(yaml: &str) -> Player {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_config_uses_defaults() {
        let player = parse("{}");
        assert_eq!("default", player.device());
        assert_eq!(255, player.level());
        assert_eq!(0, player.transpose());
        assert_eq!(Settings::default(), player.settings().unwrap());
    }

    #[test]
    fn full_config() {
        let player = parse(
            r#"
            device: mock-buzzer
            gate_period: 5ms
            inter_note_gap: 20ms
            loop_pause: 1500ms
            loops: 3
            level: 200
            transpose: -12
            envelope:
              attack_percent: 15
              release_max_ms: 200
            "#,
        );

        assert_eq!("mock-buzzer", player.device());
        assert_eq!(200, player.level());
        assert_eq!(-12, player.transpose());

        let settings = player.settings().unwrap();
        assert_eq!(5, settings.gate_period_ms);
        assert_eq!(20, settings.inter_note_gap_ms);
        assert_eq!(Duration::from_millis(1500), settings.loop_pause);
        assert_eq!(Some(3), settings.loops);
        assert_eq!(
            EnvelopeConfig {
                attack_percent: 15,
                release_max_ms: 200,
                ..EnvelopeConfig::default()
            },
            settings.envelope
        );
    }

    #[test]
    fn bad_values() {
        assert!(matches!(
            parse("gate_period: 0ms").settings(),
            Err(ConfigError::Invalid {
                field: "gate_period",
                ..
            })
        ));
        assert!(matches!(
            parse("inter_note_gap: soon").settings(),
            Err(ConfigError::Duration {
                field: "inter_note_gap",
                ..
            })
        ));
        assert!(matches!(
            parse("loops: 0").settings(),
            Err(ConfigError::Invalid { field: "loops", .. })
        ));
        assert!(matches!(
            parse("envelope:\n  attack_min_ms: 100\n").settings(),
            Err(ConfigError::Invalid {
                field: "envelope.attack_min_ms",
                ..
            })
        ));
    }
}
