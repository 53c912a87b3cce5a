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
use std::{io, thread};

use crossbeam_channel::Sender;
use tracing::{info, span, warn, Level};

use super::Event;

const PAUSE: &str = "pause";
const LOUDER: &str = "louder";
const SOFTER: &str = "softer";
const LEVEL: &str = "level";
const UP: &str = "up";
const DOWN: &str = "down";
const TRANSPOSE: &str = "transpose";
const STOP: &str = "stop";

/// A controller that adjusts playback from commands typed on the keyboard.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Prompts for and reads a single command. Returns false once the reader is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {}, {} <0-255>, {}, {}, {} <semitones>, {}): ",
            PAUSE, LOUDER, SOFTER, LEVEL, UP, DOWN, TRANSPOSE, STOP,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let event = match parse(&input) {
            Some(event) => event,
            None => {
                warn!(input = input.trim(), "Unrecognized input");
                return Ok(true);
            }
        };

        events_tx
            .send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a command line into an event.
fn parse(input: &str) -> Option<Event> {
    let input = input.trim().to_lowercase();
    let mut words = input.split_whitespace();
    let command = words.next()?;
    let argument = words.next();
    if words.next().is_some() {
        return None;
    }

    match (command, argument) {
        (PAUSE, None) => Some(Event::TogglePause),
        (LOUDER, None) => Some(Event::Louder),
        (SOFTER, None) => Some(Event::Softer),
        (LEVEL, Some(level)) => level.parse().ok().map(Event::Level),
        (UP, None) => Some(Event::Up),
        (DOWN, None) => Some(Event::Down),
        (TRANSPOSE, Some(semitones)) => semitones.parse().ok().map(Event::Transpose),
        (STOP, None) => Some(Event::Stop),
        _ => None,
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> thread::JoinHandle<Result<(), io::Error>> {
        thread::spawn(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard input closed.");
            Ok(())
        })
    }
}
