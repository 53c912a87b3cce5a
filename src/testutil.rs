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
    thread,
    time::{Duration, SystemTime},
};

use crate::tone::mock::Action;

pub mod smf;

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed().expect("System time error");
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Every frequency the tone was started at, in order.
pub fn starts(actions: &[Action]) -> Vec<u32> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::Start(frequency) => Some(*frequency),
            _ => None,
        })
        .collect()
}

/// The total time slept.
pub fn total_wait(actions: &[Action]) -> Duration {
    actions
        .iter()
        .map(|action| match action {
            Action::Wait(duration) => *duration,
            _ => Duration::ZERO,
        })
        .sum()
}

/// The total time slept while the tone was on.
pub fn sounding_time(actions: &[Action]) -> Duration {
    let mut on = false;
    let mut sounding = Duration::ZERO;
    for action in actions {
        match action {
            Action::Start(_) => on = true,
            Action::Stop => on = false,
            Action::Wait(duration) if on => sounding += *duration,
            Action::Wait(_) => {}
        }
    }
    sounding
}

/// Counts the waits of exactly the given length.
pub fn count_waits(actions: &[Action], duration: Duration) -> usize {
    actions
        .iter()
        .filter(|action| **action == Action::Wait(duration))
        .count()
}
