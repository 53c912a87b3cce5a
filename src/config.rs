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

use tracing::info;

use crate::{convert::BuzzerSong, melody::Melody};

mod error;
mod melody;
mod player;

pub use self::error::ConfigError;
pub use self::player::Player;

/// Parses the player configuration from a YAML file.
pub fn load_player(path: &Path) -> Result<Player, ConfigError> {
    let player = Player::deserialize(path)?;
    info!(file = path.display().to_string(), "Loaded player config.");
    Ok(player)
}

/// Loads a melody from a YAML melody file or a buzzer JSON file, chosen by extension.
pub fn load_melody(path: &Path) -> Result<Melody, ConfigError> {
    let name = melody_name(path);
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_lowercase());

    match extension.as_deref() {
        Some("yaml") | Some("yml") => melody::Melody::deserialize(path)?.to_melody(&name),
        Some("json") => Ok(BuzzerSong::read(path)?.to_melody(&name)),
        _ => Err(ConfigError::UnsupportedExtension(
            path.display().to_string(),
        )),
    }
}

/// The file name without its extensions, so tune.buzzer.json is just tune.
fn melody_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    stem.strip_suffix(".buzzer")
        .map(str::to_string)
        .unwrap_or(stem)
}
