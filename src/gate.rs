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
use std::time::Duration;

/// The loudness that keeps the tone on for the whole gate.
pub const FULL_LEVEL: u8 = 255;

/// A single gate: the tone is on for `on`, then off for `off`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slice {
    pub level: u8,
    pub on: Duration,
    pub off: Duration,
}

impl Slice {
    /// Builds a gate of the given period with an on time proportional to the level.
    pub fn new(level: u8, gate_period_ms: u32) -> Slice {
        let period_us = u64::from(gate_period_ms) * 1000;
        let on_us = period_us * u64::from(level) / u64::from(FULL_LEVEL);
        Slice {
            level,
            on: Duration::from_micros(on_us),
            off: Duration::from_micros(period_us - on_us),
        }
    }

    /// The full width of the gate.
    pub fn period(&self) -> Duration {
        self.on + self.off
    }
}

/// The number of gates used to render a phase of the given length.
pub fn steps(duration_ms: u32, gate_period_ms: u32) -> u32 {
    (duration_ms / gate_period_ms.max(1)).max(1)
}

/// Renders a linear ramp from one loudness level to another as a sequence of gates. The
/// first gate sits at `from` and the last at `to`, with levels interpolated in between.
/// Rendering is a pure function of its inputs.
pub fn render_phase(from: u8, to: u8, duration_ms: u32, gate_period_ms: u32) -> Vec<Slice> {
    let gate_period_ms = gate_period_ms.max(1);
    let steps = steps(duration_ms, gate_period_ms);
    let denominator = i64::from((steps - 1).max(1));
    let from = i64::from(from);
    let span = i64::from(to) - from;

    (0..steps)
        .map(|step| {
            let level = from + span * i64::from(step) / denominator;
            Slice::new(level.clamp(0, i64::from(FULL_LEVEL)) as u8, gate_period_ms)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    fn rendered_duration(slices: &[Slice]) -> Duration {
        slices.iter().map(Slice::period).sum()
    }

    #[test]
    fn slice_duty_cycle() {
        let full = Slice::new(255, 4);
        assert_eq!(Duration::from_millis(4), full.on);
        assert_eq!(Duration::ZERO, full.off);

        let silent = Slice::new(0, 4);
        assert_eq!(Duration::ZERO, silent.on);
        assert_eq!(Duration::from_millis(4), silent.off);

        // 4000us * 51 / 255 = 800us.
        let fifth = Slice::new(51, 4);
        assert_eq!(Duration::from_micros(800), fifth.on);
        assert_eq!(Duration::from_micros(3200), fifth.off);
        assert_eq!(Duration::from_millis(4), fifth.period());
    }

    #[test]
    fn attack_ramp() {
        let slices = render_phase(0, 255, 20, 4);
        let levels: Vec<u8> = slices.iter().map(|slice| slice.level).collect();
        assert_eq!(vec![0, 63, 127, 191, 255], levels);
        assert_eq!(Duration::from_millis(20), rendered_duration(&slices));
    }

    #[test]
    fn release_ramp() {
        let slices = render_phase(200, 0, 12, 4);
        let levels: Vec<u8> = slices.iter().map(|slice| slice.level).collect();
        assert_eq!(vec![200, 100, 0], levels);
    }

    #[test]
    fn hold_is_constant() {
        let slices = render_phase(180, 180, 40, 4);
        assert_eq!(10, slices.len());
        assert!(slices.iter().all(|slice| slice.level == 180));
    }

    #[test]
    fn single_step_uses_start_level() {
        // Shorter than one gate still renders a single gate.
        let slices = render_phase(0, 255, 3, 4);
        assert_eq!(1, slices.len());
        assert_eq!(0, slices[0].level);

        let slices = render_phase(90, 255, 4, 4);
        assert_eq!(1, slices.len());
        assert_eq!(90, slices[0].level);
    }

    #[test]
    fn remainder_is_truncated() {
        assert_eq!(2, steps(11, 4));
        assert_eq!(1, steps(0, 4));
        assert_eq!(7, steps(7, 0));
        let slices = render_phase(255, 255, 11, 4);
        assert_eq!(Duration::from_millis(8), rendered_duration(&slices));
    }

    #[test]
    fn rendering_is_idempotent() {
        for (from, to, ms, gate) in [(0, 255, 37, 4), (255, 0, 120, 3), (17, 17, 9, 5)] {
            assert_eq!(
                render_phase(from, to, ms, gate),
                render_phase(from, to, ms, gate)
            );
        }
    }
}
