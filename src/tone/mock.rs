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
use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tracing::trace;

/// Something that happened to a mock device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// The tone was started at the given frequency.
    Start(u32),
    /// The tone was stopped.
    Stop,
    /// Time passed. Only written by the mock clock.
    Wait(Duration),
}

pub type ActionLog = Arc<Mutex<Vec<Action>>>;

/// A mock device. Doesn't actually make a sound. A recording mock keeps every action it
/// receives, a plain one only counts them.
#[derive(Clone)]
pub struct Device {
    name: String,
    log: Option<ActionLog>,
    frequency: Arc<AtomicU32>,
    starts: Arc<AtomicU64>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            log: None,
            frequency: Arc::new(AtomicU32::new(0)),
            starts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Gets a mock device that records everything that happens to it.
    pub fn recording(name: &str) -> Device {
        Device {
            log: Some(Arc::new(Mutex::new(Vec::new()))),
            ..Device::get(name)
        }
    }

    /// Returns the action log. A non-recording device gets a fresh, detached log.
    pub fn log(&self) -> ActionLog {
        self.log
            .clone()
            .unwrap_or_else(|| Arc::new(Mutex::new(Vec::new())))
    }

    /// Returns a copy of everything recorded so far.
    pub fn actions(&self) -> Vec<Action> {
        match &self.log {
            Some(log) => log.lock().expect("unable to get log lock").clone(),
            None => Vec::new(),
        }
    }

    /// The frequency currently sounding, if any.
    pub fn sounding(&self) -> Option<u32> {
        match self.frequency.load(Ordering::Relaxed) {
            0 => None,
            frequency => Some(frequency),
        }
    }

    /// How many times the tone was started.
    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::Relaxed)
    }

    fn record(&self, action: Action) {
        if let Some(log) = &self.log {
            log.lock().expect("unable to get log lock").push(action);
        }
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn start(&self, frequency_hz: u32) {
        trace!(device = self.name, frequency_hz, "Tone on.");
        self.frequency.store(frequency_hz, Ordering::Relaxed);
        self.starts.fetch_add(1, Ordering::Relaxed);
        self.record(Action::Start(frequency_hz));
    }

    fn stop(&self) {
        trace!(device = self.name, "Tone off.");
        self.frequency.store(0, Ordering::Relaxed);
        self.record(Action::Stop);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod test {
    use crate::tone::Device as _;

    use super::{Action, Device};

    #[test]
    fn recording_device() {
        let device = Device::recording("mock");
        device.start(440);
        assert_eq!(Some(440), device.sounding());
        device.stop();
        assert_eq!(None, device.sounding());
        assert_eq!(vec![Action::Start(440), Action::Stop], device.actions());
        assert_eq!(1, device.start_count());
    }

    #[test]
    fn plain_device_only_counts() {
        let device = Device::get("mock");
        device.start(440);
        device.start(880);
        assert!(device.actions().is_empty());
        assert_eq!(2, device.start_count());
        assert_eq!(Some(880), device.sounding());
    }
}
