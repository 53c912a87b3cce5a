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
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use buzzplay::clock::SpinClock;
use buzzplay::controller::{keyboard, Controller};
use buzzplay::controls::Controls;
use buzzplay::convert::{self, merge::DEFAULT_PROLONGED_MS, Mode, Options, DEFAULT_MAX_REST_MS};
use buzzplay::melody::builtin;
use buzzplay::player::Player;
use buzzplay::util::filename_display;
use buzzplay::{config, inspect, preview, tone};
use clap::{crate_version, Parser, Subcommand};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A piezo buzzer melody player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays a melody through a tone device.
    Play {
        /// A built-in melody name, a YAML melody file or a buzzer JSON file. Defaults to
        /// happy-birthday.
        melody: Option<String>,
        /// The path to the player config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The tone device to play through. Overrides the config.
        #[arg(short, long)]
        device: Option<String>,
        /// The starting loudness, 0-255. Overrides the config.
        #[arg(short, long)]
        level: Option<u8>,
        /// The starting transpose in semitones. Overrides the config.
        #[arg(short, long, allow_hyphen_values = true)]
        transpose: Option<i8>,
        /// How many times to play the melody. Overrides the config.
        #[arg(long)]
        loops: Option<u32>,
        /// Read pause, loudness and transpose commands from the keyboard while playing.
        #[arg(short, long)]
        keyboard: bool,
    },
    /// Converts MIDI files to buzzer JSON.
    Convert {
        /// Write JSON without whitespace.
        #[arg(long)]
        compact: bool,
        /// Keep leading rests.
        #[arg(long)]
        no_trim: bool,
        /// Use this track (1-based) instead of picking one.
        #[arg(short, long)]
        track: Option<usize>,
        /// Cap rests at this many milliseconds when using --track.
        #[arg(long, default_value_t = DEFAULT_MAX_REST_MS)]
        max_rest_ms: u64,
        /// The primary track (1-based) for choir and fill mode.
        #[arg(long)]
        choir_track: Option<usize>,
        /// The track (1-based) that fills the choir track's long rests.
        #[arg(long)]
        fill_track: Option<usize>,
        /// The shortest choir rest that gets filled, in milliseconds.
        #[arg(long, default_value_t = DEFAULT_PROLONGED_MS)]
        prolonged_ms: u64,
        /// MIDI files to convert. Defaults to every .mid and .midi file in the current
        /// directory.
        files: Vec<PathBuf>,
    },
    /// Renders buzzer JSON files to WAV so they can be heard without a buzzer.
    Preview {
        /// Buzzer JSON files to render.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Where to write the WAV files. Defaults to next to each JSON file.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Prints the structure of a MIDI file.
    Inspect {
        /// The MIDI file to inspect.
        file: PathBuf,
    },
    /// Lists the available tone output devices.
    Devices {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            melody,
            config: config_path,
            device,
            level,
            transpose,
            loops,
            keyboard: use_keyboard,
        } => {
            let player_config = match config_path {
                Some(path) => config::load_player(&path)?,
                None => config::Player::default(),
            };
            let melody = match melody {
                Some(melody) => match builtin::get(&melody) {
                    Some(melody) => melody,
                    None => config::load_melody(Path::new(&melody))?,
                },
                None => builtin::happy_birthday(),
            };

            let mut settings = player_config.settings()?;
            if loops.is_some() {
                settings.loops = loops;
            }
            let controls = Arc::new(Controls::new(
                level.unwrap_or(player_config.level()),
                transpose.unwrap_or(player_config.transpose()),
            ));
            let device = tone::get_device(device.as_deref().unwrap_or(player_config.device()))?;

            let _controller = if use_keyboard {
                Some(Controller::new(
                    controls.clone(),
                    Arc::new(keyboard::Driver::new()),
                ))
            } else {
                None
            };

            println!("Playing {} on {}.", melody, device);
            let mut player = Player::new(device, Box::new(SpinClock::new()), settings, controls);
            let passes = player.play(&melody);
            println!("Played {} time(s).", passes);
        }
        Commands::Convert {
            compact,
            no_trim,
            track,
            max_rest_ms,
            choir_track,
            fill_track,
            prolonged_ms,
            files,
        } => {
            let mode = match (track, choir_track, fill_track) {
                (None, None, None) => Mode::Auto,
                (Some(track), None, None) => Mode::Track { track, max_rest_ms },
                (None, Some(choir), Some(fill)) => Mode::ChoirFill {
                    choir,
                    fill,
                    prolonged_ms,
                },
                (None, _, _) => {
                    return Err(
                        "for choir and fill mode, specify both --choir-track and --fill-track"
                            .into(),
                    )
                }
                (Some(_), _, _) => {
                    return Err("--track can't be combined with choir and fill mode".into())
                }
            };
            let options = Options {
                mode,
                trim: !no_trim,
                compact,
            };

            let files = if files.is_empty() {
                midi_files_in(Path::new("."))?
            } else {
                files
            };
            if files.is_empty() {
                println!("No MIDI files found.");
                return Ok(());
            }

            println!("Converting {} file(s), mode: {}.", files.len(), mode);
            let results = convert::convert_all(&files, &options);
            let mut failures = 0;
            for (path, result) in results {
                match result {
                    Ok(out_path) => println!(
                        "Wrote {} from {}.",
                        filename_display(&out_path),
                        filename_display(&path)
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("Failed {}: {}", filename_display(&path), e);
                    }
                }
            }
            if failures > 0 {
                return Err(format!(
                    "{} of {} file(s) failed to convert",
                    failures,
                    files.len()
                )
                .into());
            }
        }
        Commands::Preview { files, output_dir } => {
            let mut failures = 0;
            for file in files.iter() {
                match preview::preview_file(file, output_dir.as_deref()) {
                    Ok(wav_path) => println!("Wrote {}.", wav_path.display()),
                    Err(e) => {
                        failures += 1;
                        println!("Failed {}: {}", filename_display(file), e);
                    }
                }
            }
            if failures > 0 {
                return Err(format!(
                    "{} of {} file(s) failed to render",
                    failures,
                    files.len()
                )
                .into());
            }
        }
        Commands::Inspect { file } => {
            inspect::inspect_file(&file, &mut io::stdout().lock())?;
        }
        Commands::Devices {} => {
            let devices = tone::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
    }

    Ok(())
}

/// Lists the MIDI files in a directory, sorted by name.
fn midi_files_in(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .is_some_and(|extension| extension == "mid" || extension == "midi")
        })
        .collect();
    files.sort();
    Ok(files)
}
