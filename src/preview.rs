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
    f64::consts::PI,
    path::{Path, PathBuf},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use midly::num::u7;
use tracing::info;

use crate::{
    convert::{BuzzerEvent, BuzzerSong, ConvertError},
    pitch,
    util::filename_display,
};

pub const SAMPLE_RATE: u32 = 44_100;

/// Peak amplitude of the loudest level, leaving headroom for overlapping notes.
const MAX_AMPLITUDE: f64 = 0.25;

/// Relative amplitude of each loudness level when there are three or fewer.
const LOUDNESS_SCALE: [f64; 3] = [0.35, 0.65, 1.0];

/// Every note ramps to zero over at least this many samples, so nothing is cut off at full
/// amplitude.
const MIN_DECAY_SAMPLES: usize = 22;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("unable to read buzzer JSON: {0}")]
    Read(#[from] ConvertError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("no events in {0}")]
    NoEvents(String),
}

/// Maps a loudness level to a sine amplitude.
pub fn loudness_to_amplitude(level: u8, levels: u8) -> f64 {
    if level == 0 || levels == 0 {
        return 0.0;
    }

    let index = usize::from(level.min(levels) - 1);
    if usize::from(levels) <= LOUDNESS_SCALE.len() {
        LOUDNESS_SCALE[index] * MAX_AMPLITUDE
    } else {
        f64::from(level) / f64::from(levels) * MAX_AMPLITUDE
    }
}

/// Renders the song to mono samples at [SAMPLE_RATE]. Each note is a sine that holds its
/// amplitude through the gate and then fades linearly to zero by the end of the note.
pub fn render(song: &BuzzerSong) -> Vec<f64> {
    let end_ms = song.duration_ms();
    if song.events.is_empty() {
        return Vec::new();
    }

    let mut buffer = vec![0.0; ms_to_samples(end_ms) + 1];
    for event in song.events.iter().filter(|event| !event.rest) {
        let Some(frequency_hz) = frequency(event) else {
            continue;
        };
        let amplitude = loudness_to_amplitude(
            event.loudness_level.unwrap_or(song.loudness_levels),
            song.loudness_levels,
        );
        render_note(&mut buffer, event, f64::from(frequency_hz), amplitude);
    }

    let peak = buffer.iter().fold(0.0_f64, |peak, sample| peak.max(sample.abs()));
    if peak > 1.0 {
        buffer.iter_mut().for_each(|sample| *sample /= peak);
    }
    buffer
}

fn frequency(event: &BuzzerEvent) -> Option<u32> {
    event.frequency_hz.or_else(|| {
        event
            .note
            .and_then(u7::try_from)
            .map(|note| pitch::midi_note_to_freq(note).round() as u32)
    })
}

fn ms_to_samples(ms: u64) -> usize {
    (ms * u64::from(SAMPLE_RATE) / 1000) as usize
}

fn render_note(buffer: &mut [f64], event: &BuzzerEvent, frequency_hz: f64, amplitude: f64) {
    let start = ms_to_samples(event.start_ms);
    let length = ms_to_samples(event.duration_ms);
    let gate = ms_to_samples(event.gate_ms.unwrap_or(event.duration_ms));
    if length == 0 || start + length > buffer.len() {
        return;
    }

    let decay_start = if length > MIN_DECAY_SAMPLES {
        gate.min(length - MIN_DECAY_SAMPLES)
    } else {
        0
    };
    let decay_length = length - decay_start;

    let sample_rate = f64::from(SAMPLE_RATE);
    for (i, out) in buffer[start..start + length].iter_mut().enumerate() {
        let envelope = if i < decay_start {
            1.0
        } else if decay_length <= 1 {
            0.0
        } else {
            1.0 - (i - decay_start) as f64 / (decay_length - 1) as f64
        };
        let t = i as f64 / sample_rate;
        *out += amplitude * envelope * (2.0 * PI * frequency_hz * t).sin();
    }
}

/// Writes samples in [-1, 1] as a mono 16 bit WAV.
pub fn write_wav(path: &Path, samples: &[f64]) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;
    for sample in samples {
        writer.write_sample((sample * f64::from(i16::MAX)) as i16)?;
    }
    writer.finalize()
}

/// Where the preview for a buzzer JSON file is written.
pub fn output_path(json_path: &Path, output_dir: Option<&Path>) -> PathBuf {
    let wav_path = json_path.with_extension("wav");
    match (output_dir, wav_path.file_name()) {
        (Some(dir), Some(file_name)) => dir.join(file_name),
        _ => wav_path,
    }
}

/// Renders a buzzer JSON file to a WAV. Returns the path written.
pub fn preview_file(
    json_path: &Path,
    output_dir: Option<&Path>,
) -> Result<PathBuf, PreviewError> {
    let song = BuzzerSong::read(json_path)?;
    if song.events.is_empty() {
        return Err(PreviewError::NoEvents(filename_display(json_path).to_string()));
    }

    let samples = render(&song);
    let wav_path = output_path(json_path, output_dir);
    write_wav(&wav_path, &samples)?;
    info!(
        file = filename_display(json_path),
        output = filename_display(&wav_path),
        seconds = samples.len() as f64 / f64::from(SAMPLE_RATE),
        "Wrote preview."
    );
    Ok(wav_path)
}

#[cfg(test)]
mod test {
    use std::{error::Error, path::Path};

    use crate::convert::{BuzzerEvent, BuzzerSong};

    use super::{
        loudness_to_amplitude, output_path, preview_file, render, PreviewError, SAMPLE_RATE,
    };

    fn song(events: Vec<BuzzerEvent>) -> BuzzerSong {
        BuzzerSong {
            events,
            ..Default::default()
        }
    }

    #[test]
    fn amplitudes() {
        assert_eq!(0.0, loudness_to_amplitude(0, 3));
        assert_eq!(0.35 * 0.25, loudness_to_amplitude(1, 3));
        assert_eq!(0.25, loudness_to_amplitude(3, 3));
        assert_eq!(0.25, loudness_to_amplitude(9, 3));
        assert_eq!(0.1, loudness_to_amplitude(2, 5));
    }

    #[test]
    fn notes_end_at_zero() {
        let samples = render(&song(vec![
            BuzzerEvent::note(0, 100, 90, 69, 440, 3, 127),
            BuzzerEvent::rest(100, 50),
            BuzzerEvent::note(150, 100, 30, 81, 880, 2, 64),
        ]));

        assert_eq!(SAMPLE_RATE as usize / 4 + 1, samples.len());
        // The last sample of each note is fully faded out.
        assert_eq!(0.0, samples[4409]);
        assert_eq!(0.0, samples[11024]);
        // The rest is silent.
        assert!(samples[4410..6615].iter().all(|sample| *sample == 0.0));
        // The held part reaches the full amplitude.
        let peak = samples[..3969].iter().fold(0.0_f64, |p, s| p.max(s.abs()));
        assert!(peak > 0.24 && peak <= 0.25, "{}", peak);
    }

    #[test]
    fn overlapping_notes_are_normalized() {
        let loud: Vec<BuzzerEvent> = (0..8)
            .map(|_| BuzzerEvent::note(0, 100, 100, 69, 440, 3, 127))
            .collect();
        let samples = render(&song(loud));
        let peak = samples.iter().fold(0.0_f64, |p, s| p.max(s.abs()));
        assert!(peak <= 1.0 + f64::EPSILON, "{}", peak);
        assert!(peak > 0.99, "{}", peak);
    }

    #[test]
    fn preview_paths() {
        let path = Path::new("/songs/tune.buzzer.json");
        assert_eq!(Path::new("/songs/tune.buzzer.wav"), output_path(path, None));
        assert_eq!(
            Path::new("/tmp/tune.buzzer.wav"),
            output_path(path, Some(Path::new("/tmp")))
        );
    }

    #[test]
    fn preview_writes_wav() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let json_path = dir.path().join("tune.buzzer.json");
        song(vec![BuzzerEvent::note(0, 50, 45, 69, 440, 3, 127)]).write(&json_path, false)?;

        let wav_path = preview_file(&json_path, None)?;
        let reader = hound::WavReader::open(&wav_path)?;
        assert_eq!(1, reader.spec().channels);
        assert_eq!(16, reader.spec().bits_per_sample);
        assert_eq!(2206, reader.len());

        let empty_path = dir.path().join("empty.buzzer.json");
        song(vec![]).write(&empty_path, true)?;
        assert!(matches!(
            preview_file(&empty_path, None),
            Err(PreviewError::NoEvents(_))
        ));
        Ok(())
    }
}
