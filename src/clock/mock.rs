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
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::tone::mock::{Action, ActionLog};

type Hook = Box<dyn FnMut(Duration) + Send>;

/// A mock clock. Doesn't actually sleep, it advances a virtual timer and records each
/// wait into an action log, usually the one belonging to a mock tone device.
pub struct Clock {
    log: ActionLog,
    elapsed: Arc<Mutex<Duration>>,
    hook: Option<Hook>,
}

impl Clock {
    /// Creates a clock that writes into the given action log.
    pub fn sharing(log: ActionLog) -> Clock {
        Clock {
            log,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            hook: None,
        }
    }

    /// Registers a callback that is invoked with the virtual time after every sleep.
    pub fn with_hook<F>(mut self, hook: F) -> Clock
    where
        F: FnMut(Duration) + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Returns a handle to the virtual elapsed time.
    pub fn elapsed_handle(&self) -> Arc<Mutex<Duration>> {
        self.elapsed.clone()
    }
}

impl super::Clock for Clock {
    fn sleep(&mut self, duration: Duration) {
        let now = {
            let mut elapsed = self.elapsed.lock().expect("unable to get elapsed lock");
            *elapsed += duration;
            *elapsed
        };
        self.log
            .lock()
            .expect("unable to get log lock")
            .push(Action::Wait(duration));

        if let Some(hook) = self.hook.as_mut() {
            hook(now);
        }
    }
}
