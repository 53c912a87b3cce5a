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
use std::{io, sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, span, Level};

use crate::controls::Controls;

pub mod keyboard;

/// How far a single louder/softer step moves the loudness.
const LEVEL_STEP: i16 = 32;

/// Controller events that change the live playback controls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Pauses playback, or resumes it if it's already paused.
    TogglePause,

    /// Raises the loudness by one step.
    Louder,

    /// Lowers the loudness by one step.
    Softer,

    /// Sets the loudness to the given level.
    Level(u8),

    /// Transposes up by a semitone.
    Up,

    /// Transposes down by a semitone.
    Down,

    /// Sets the transpose to the given number of semitones.
    Transpose(i8),

    /// Stops playback for good.
    Stop,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> thread::JoinHandle<Result<(), io::Error>>;
}

/// Applies driver events to the playback controls.
pub struct Controller {
    handle: thread::JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(controls: Arc<Controls>, driver: Arc<dyn Driver>) -> Controller {
        let (events_tx, events_rx) = crossbeam_channel::bounded(1);
        let monitor = driver.monitor_events(events_tx);

        Controller {
            handle: thread::spawn(move || Controller::apply_events(controls, events_rx, monitor)),
        }
    }

    /// Returns true once the driver has closed and all of its events were applied.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn apply_events(
        controls: Arc<Controls>,
        events_rx: Receiver<Event>,
        monitor: thread::JoinHandle<Result<(), io::Error>>,
    ) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        info!("Controller started.");
        for event in events_rx.iter() {
            info!(event = format!("{:?}", event), "Received event.");
            apply(&controls, event);
        }

        info!("Controller closing.");
        match monitor.join() {
            Ok(Err(e)) => error!(err = e.to_string(), "Event monitor failed."),
            Err(_) => error!("Error waiting for event monitor to stop."),
            Ok(Ok(())) => {}
        }
    }
}

/// Applies a single event to the controls.
pub fn apply(controls: &Controls, event: Event) {
    match event {
        Event::TogglePause => {
            controls.toggle_pause();
        }
        Event::Louder => {
            let level = controls.nudge_level(LEVEL_STEP);
            info!(level, "Louder.");
        }
        Event::Softer => {
            let level = controls.nudge_level(-LEVEL_STEP);
            info!(level, "Softer.");
        }
        Event::Level(level) => controls.set_level(level),
        Event::Up => {
            let transpose = controls.nudge_transpose(1);
            info!(transpose, "Transposed up.");
        }
        Event::Down => {
            let transpose = controls.nudge_transpose(-1);
            info!(transpose, "Transposed down.");
        }
        Event::Transpose(semitones) => controls.set_transpose(semitones),
        Event::Stop => controls.stop(),
    }
}
