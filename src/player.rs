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
use std::{cmp::min, sync::Arc, time::Duration};

use midly::num::u7;
use tracing::{debug, info, span, warn, Level};

use crate::{
    clock::Clock,
    controls::Controls,
    envelope::EnvelopeConfig,
    gate::{self, Slice},
    melody::{Event, Melody, Tempo},
    pitch, tone,
};

/// This is the longest the player will sleep through silence before checking the pause and
/// stop flags again.
const MAX_SILENCE_CHUNK: Duration = Duration::from_millis(50);

/// How often the pause flag is polled while paused.
const PAUSE_POLL: Duration = Duration::from_millis(10);

/// Timing settings for the envelope player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    /// The width of a single gate.
    pub gate_period_ms: u32,
    /// Silence inserted at the end of each note so consecutive notes are articulated.
    pub inter_note_gap_ms: u32,
    /// The pause between the end of a melody and the start of the next pass.
    pub loop_pause: Duration,
    /// Attack and release settings.
    pub envelope: EnvelopeConfig,
    /// How many passes to play. None loops forever.
    pub loops: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            gate_period_ms: 4,
            inter_note_gap_ms: 15,
            loop_pause: Duration::from_secs(2),
            envelope: EnvelopeConfig::default(),
            loops: None,
        }
    }
}

/// Whether playback should carry on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stopped,
}

/// The envelope player. Plays melodies through a tone device, shaping each note with an
/// attack/hold/release envelope made out of duty-cycled gates.
pub struct Player {
    device: Arc<dyn tone::Device>,
    clock: Box<dyn Clock>,
    settings: Settings,
    controls: Arc<Controls>,
}

impl Player {
    pub fn new(
        device: Arc<dyn tone::Device>,
        clock: Box<dyn Clock>,
        settings: Settings,
        controls: Arc<Controls>,
    ) -> Player {
        Player {
            device,
            clock,
            settings,
            controls,
        }
    }

    /// Plays the melody over and over, pausing between passes, until the configured number of
    /// loops is reached or a stop is requested. Returns the number of completed passes.
    pub fn play(&mut self, melody: &Melody) -> u32 {
        let span = span!(Level::INFO, "play melody");
        let _enter = span.enter();

        if melody.is_empty() {
            warn!(melody = melody.name(), "Melody has no events, nothing to play.");
            return 0;
        }

        info!(
            device = self.device.name(),
            melody = melody.name(),
            events = melody.len(),
            loops = ?self.settings.loops,
            "Playing melody."
        );

        let mut passes = 0;
        loop {
            if self.play_once(melody) == Flow::Stopped {
                break;
            }
            passes += 1;
            debug!(passes, "Finished pass.");

            if self.settings.loops.is_some_and(|loops| passes >= loops) {
                break;
            }
            if self.silence(self.settings.loop_pause) == Flow::Stopped {
                break;
            }
        }

        self.device.stop();
        info!(passes, "Playback finished.");
        passes
    }

    /// Plays every event of the melody once.
    pub fn play_once(&mut self, melody: &Melody) -> Flow {
        let tempo = melody.tempo();
        for event in melody.events() {
            if self.play_event(tempo, event) == Flow::Stopped {
                return Flow::Stopped;
            }
        }
        Flow::Continue
    }

    /// Plays a single event. Loudness and transpose are sampled once, at the start.
    pub fn play_event(&mut self, tempo: Tempo, event: &Event) -> Flow {
        let ms = tempo.ticks_to_ms(event.ticks());
        let snapshot = self.controls.snapshot();

        let note = match event.get_note() {
            Some(note) => note,
            None => {
                debug!(ms, "Rest.");
                return self.silence(Duration::from_millis(u64::from(ms)));
            }
        };

        let transposed = pitch::transpose(note, snapshot.transpose);
        let frequency = match pitch::audible_frequency(transposed) {
            Some(frequency) => frequency,
            None => {
                // The whole duration is silent, there's no gap to shape.
                debug!(note = transposed.as_int(), ms, "Inaudible note.");
                return self.silence(Duration::from_millis(u64::from(ms)));
            }
        };

        let gap_ms = if ms > self.settings.inter_note_gap_ms {
            self.settings.inter_note_gap_ms
        } else {
            0
        };
        let target = target_level(snapshot.level, event.velocity());

        if self.play_note(frequency, ms - gap_ms, target) == Flow::Stopped {
            return Flow::Stopped;
        }
        self.silence(Duration::from_millis(u64::from(gap_ms)))
    }

    /// Renders the attack, hold and release of a note, then pads any time the gates didn't
    /// cover with silence. Gates never run past the sounding time, the last one is cut short
    /// instead.
    fn play_note(&mut self, frequency: u32, sounding_ms: u32, target: u8) -> Flow {
        let shape = self.settings.envelope.shape(sounding_ms);
        debug!(frequency, sounding_ms, target, %shape, "Note.");

        let phases = [
            (0, target, shape.attack_ms),
            (target, target, shape.hold_ms),
            (target, 0, shape.release_ms),
        ];

        let mut remaining = Duration::from_millis(u64::from(sounding_ms));
        for (from, to, ms) in phases {
            if ms == 0 {
                continue;
            }

            let slices = gate::render_phase(from, to, ms, self.settings.gate_period_ms);
            if self.render(frequency, &slices, &mut remaining) == Flow::Stopped {
                return Flow::Stopped;
            }
        }

        self.silence(remaining)
    }

    /// Drives the tone device through the given gates, spending at most `remaining`.
    fn render(&mut self, frequency: u32, slices: &[Slice], remaining: &mut Duration) -> Flow {
        for slice in slices {
            if remaining.is_zero() {
                break;
            }
            if self.checkpoint() == Flow::Stopped {
                return Flow::Stopped;
            }

            let on = min(slice.on, *remaining);
            *remaining -= on;
            let off = min(slice.off, *remaining);
            *remaining -= off;

            if !on.is_zero() {
                self.device.start(frequency);
                self.clock.sleep(on);
            }
            if !off.is_zero() {
                self.device.stop();
                self.clock.sleep(off);
            }
        }
        Flow::Continue
    }

    /// Holds the tone off for the given duration. Long silences are broken up so that pause
    /// and stop requests are honored promptly.
    fn silence(&mut self, duration: Duration) -> Flow {
        self.device.stop();

        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.checkpoint() == Flow::Stopped {
                return Flow::Stopped;
            }

            let chunk = min(remaining, MAX_SILENCE_CHUNK);
            self.clock.sleep(chunk);
            remaining -= chunk;
        }
        Flow::Continue
    }

    /// Checked at every gate boundary. Blocks while paused, keeping our place in the melody.
    fn checkpoint(&mut self) -> Flow {
        if self.controls.is_paused() {
            self.device.stop();
            info!("Playback paused.");
            while self.controls.is_paused() {
                if self.controls.is_stopped() {
                    return Flow::Stopped;
                }
                self.clock.sleep(PAUSE_POLL);
            }
            info!("Playback resumed.");
        }

        if self.controls.is_stopped() {
            return Flow::Stopped;
        }
        Flow::Continue
    }
}

/// Scales the loudness level by the event's velocity, if it has one.
pub fn target_level(level: u8, velocity: Option<u7>) -> u8 {
    match velocity {
        Some(velocity) => (u16::from(level) * u16::from(velocity.as_int()) / 127) as u8,
        None => level,
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use midly::num::u7;

    use crate::{
        clock,
        controls::Controls,
        melody::{Event, Melody, Tempo},
        testutil::{count_waits, sounding_time, starts, total_wait},
        tone::mock::{Action, Device},
    };

    use super::{target_level, Flow, Player, Settings};

    fn player(settings: Settings, controls: Arc<Controls>) -> (Player, Device) {
        let device = Device::recording("mock");
        let clock = clock::mock::Clock::sharing(device.log());
        (
            Player::new(
                Arc::new(device.clone()),
                Box::new(clock),
                settings,
                controls,
            ),
            device,
        )
    }

    fn player_with_hook<F>(
        settings: Settings,
        controls: Arc<Controls>,
        hook: F,
    ) -> (Player, Device, Arc<Mutex<Duration>>)
    where
        F: FnMut(Duration) + Send + 'static,
    {
        let device = Device::recording("mock");
        let clock = clock::mock::Clock::sharing(device.log()).with_hook(hook);
        let elapsed = clock.elapsed_handle();
        (
            Player::new(
                Arc::new(device.clone()),
                Box::new(clock),
                settings,
                controls,
            ),
            device,
            elapsed,
        )
    }

    #[test]
    fn rest_is_silent() {
        let (mut player, device) = player(Settings::default(), Arc::new(Controls::default()));
        let tempo = Tempo::new(120, 384);

        assert_eq!(
            Flow::Continue,
            player.play_event(tempo, &Event::from_raw(-1, 200))
        );

        let actions = device.actions();
        assert!(starts(&actions).is_empty());
        assert_eq!(Duration::from_millis(260), total_wait(&actions));
    }

    #[test]
    fn note_keeps_its_duration() {
        let (mut player, device) = player(Settings::default(), Arc::new(Controls::default()));
        let tempo = Tempo::new(120, 384);

        player.play_event(tempo, &Event::note(u7::new(60), 384));

        let actions = device.actions();
        assert_eq!(Duration::from_millis(500), total_wait(&actions));
        assert!(starts(&actions).iter().all(|frequency| *frequency == 262));
        // The hold alone is 340ms at full loudness.
        let sounding = sounding_time(&actions);
        assert!(sounding >= Duration::from_millis(340), "{:?}", sounding);
        assert!(sounding < Duration::from_millis(485), "{:?}", sounding);
        // The gap is the last thing that happens.
        assert_eq!(Some(&Action::Wait(Duration::from_millis(15))), actions.last());
        assert_eq!(None, device.sounding());
    }

    #[test]
    fn short_note_has_no_gap() {
        let settings = Settings {
            inter_note_gap_ms: 15,
            ..Settings::default()
        };
        let (mut player, device) = player(settings, Arc::new(Controls::default()));

        player.play_event(Tempo::milliseconds(), &Event::note(u7::new(69), 12));

        let actions = device.actions();
        assert_eq!(Duration::from_millis(12), total_wait(&actions));
        assert!(!starts(&actions).is_empty());
        assert_eq!(0, count_waits(&actions, Duration::from_millis(15)));
    }

    #[test]
    fn gates_never_outlast_the_note() {
        let settings = Settings {
            inter_note_gap_ms: 0,
            ..Settings::default()
        };
        let (mut player, device) = player(settings, Arc::new(Controls::default()));

        // A 15ms note is a 6ms attack, 1ms hold and 8ms release. The hold is shorter than a
        // single gate.
        for ms in [15, 13, 17, 21, 26, 5] {
            player.play_event(Tempo::milliseconds(), &Event::note(u7::new(69), ms));
        }

        let actions = device.actions();
        assert_eq!(Duration::from_millis(97), total_wait(&actions));
        assert_eq!(None, device.sounding());
    }

    #[test]
    fn zero_duration_note() {
        let (mut player, device) = player(Settings::default(), Arc::new(Controls::default()));

        player.play_event(Tempo::milliseconds(), &Event::note(u7::new(69), 0));

        let actions = device.actions();
        assert_eq!(Duration::ZERO, total_wait(&actions));
        assert!(starts(&actions).is_empty());
    }

    #[test]
    fn transpose_and_ceiling() {
        let controls = Arc::new(Controls::new(255, 12));
        let (mut player, device) = player(Settings::default(), controls.clone());

        player.play_event(Tempo::milliseconds(), &Event::note(u7::new(57), 100));
        assert!(starts(&device.actions()).iter().all(|f| *f == 440));

        controls.set_transpose(24);
        player.play_event(Tempo::milliseconds(), &Event::note(u7::new(100), 100));
        assert!(starts(&device.actions()).contains(&4000));
    }

    #[test]
    fn inaudible_note_is_a_full_rest() {
        let controls = Arc::new(Controls::new(255, -24));
        let (mut player, device) = player(Settings::default(), controls);

        // 40 - 24 = 16, far below 60 Hz.
        player.play_event(Tempo::milliseconds(), &Event::note(u7::new(40), 300));

        let actions = device.actions();
        assert!(starts(&actions).is_empty());
        assert_eq!(Duration::from_millis(300), total_wait(&actions));
        assert_eq!(0, count_waits(&actions, Duration::from_millis(15)));
    }

    #[test]
    fn zero_level_never_sounds() {
        let (mut player, device) = player(Settings::default(), Arc::new(Controls::new(0, 0)));

        player.play_event(Tempo::milliseconds(), &Event::note(u7::new(69), 300));

        let actions = device.actions();
        assert!(starts(&actions).is_empty());
        assert_eq!(Duration::from_millis(300), total_wait(&actions));
    }

    #[test]
    fn velocity_scales_loudness() {
        assert_eq!(255, target_level(255, None));
        assert_eq!(255, target_level(255, Some(u7::new(127))));
        assert_eq!(128, target_level(255, Some(u7::new(64))));
        assert_eq!(0, target_level(255, Some(u7::new(0))));
        assert_eq!(50, target_level(100, Some(u7::new(64))));
    }

    #[test]
    fn bounded_loops() {
        let settings = Settings {
            loops: Some(2),
            loop_pause: Duration::from_millis(100),
            ..Settings::default()
        };
        let (mut player, device) = player(settings, Arc::new(Controls::default()));
        let melody = Melody::new(
            "two notes",
            Tempo::new(120, 384),
            vec![Event::note(u7::new(60), 384), Event::note(u7::new(64), 384)],
        );

        assert_eq!(2, player.play(&melody));
        // Two passes of a second each, with one pause in between.
        assert_eq!(Duration::from_millis(2100), total_wait(&device.actions()));
    }

    #[test]
    fn empty_melody() {
        let (mut player, _) = player(Settings::default(), Arc::new(Controls::default()));
        let melody = Melody::new("empty", Tempo::milliseconds(), vec![]);
        assert_eq!(0, player.play(&melody));
    }

    #[test]
    fn pause_keeps_position() {
        let controls = Arc::new(Controls::default());
        let hook_controls = controls.clone();
        let (mut player, device, elapsed) = player_with_hook(
            Settings::default(),
            controls,
            move |now: Duration| {
                if now >= Duration::from_millis(100) && now < Duration::from_millis(300) {
                    hook_controls.set_paused(true);
                } else if now >= Duration::from_millis(300) {
                    hook_controls.set_paused(false);
                }
            },
        );
        let melody = Melody::new(
            "two notes",
            Tempo::new(120, 384),
            vec![Event::note(u7::new(60), 384), Event::note(u7::new(64), 384)],
        );

        assert_eq!(Flow::Continue, player.play_once(&melody));

        let actions = device.actions();
        assert!(count_waits(&actions, Duration::from_millis(10)) >= 19);
        assert!(starts(&actions).contains(&330));

        let elapsed = *elapsed.lock().expect("unable to get elapsed lock");
        assert!(elapsed >= Duration::from_millis(1190), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(1215), "{:?}", elapsed);
    }

    #[test]
    fn stop_ends_endless_playback() {
        let controls = Arc::new(Controls::default());
        let hook_controls = controls.clone();
        let (mut player, device, elapsed) = player_with_hook(
            Settings::default(),
            controls,
            move |now: Duration| {
                if now >= Duration::from_secs(5) {
                    hook_controls.stop();
                }
            },
        );
        let melody = Melody::new(
            "one note",
            Tempo::milliseconds(),
            vec![Event::note(u7::new(69), 500)],
        );

        // 500ms note plus a 2s pause, so the stop lands during the second pause.
        assert_eq!(2, player.play(&melody));
        let elapsed = *elapsed.lock().expect("unable to get elapsed lock");
        assert!(elapsed < Duration::from_millis(5100), "{:?}", elapsed);
        assert_eq!(None, device.sounding());
    }
}
