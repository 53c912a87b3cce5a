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
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

/// Peak amplitude of the square wave. A full scale square wave is unpleasant.
const AMPLITUDE: f32 = 0.2;

/// The name that selects the host's default output device.
const DEFAULT_DEVICE: &str = "default";

/// A tone device backed by a sound card. It plays a square wave, which is about as close
/// as a speaker gets to a piezo being toggled by a timer pin.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The running output stream, if the device has been opened for playback.
    output: Option<Output>,
}

/// Holds the output thread. cpal streams can't always be sent between threads, so the
/// stream lives on its own thread until the device is dropped.
struct Output {
    /// The frequency the stream is producing. Zero is silence.
    frequency: Arc<AtomicU32>,
    shutdown: Arc<AtomicBool>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that can produce output.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if device.default_output_config().is_err() {
                    continue;
                }

                devices.push(Device {
                    name: device.name()?,
                    host_id,
                    device,
                    output: None,
                })
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device and starts its output stream.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        let mut device = if name == DEFAULT_DEVICE {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device available")?;
            Device {
                name: device.name()?,
                host_id: host.id(),
                device,
                output: None,
            }
        } else {
            match Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
            {
                Some(device) => device,
                None => return Err(format!("no device found with name {}", name).into()),
            }
        };

        device.output = Some(Output::start(device.device.clone(), &device.name)?);
        Ok(device)
    }
}

impl Output {
    fn start(device: cpal::Device, name: &str) -> Result<Output, Box<dyn Error>> {
        let frequency = Arc::new(AtomicU32::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        let join_handle = {
            let frequency = frequency.clone();
            let shutdown = shutdown.clone();
            let name = name.to_string();
            thread::spawn(move || {
                let span = span!(Level::INFO, "tone output (cpal)");
                let _enter = span.enter();

                let stream = match build_stream(&device, frequency) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
                info!(device = name, "Tone output started.");
                let _ = ready_tx.send(Ok(()));

                while !shutdown.load(Ordering::Relaxed) {
                    thread::park_timeout(Duration::from_millis(100));
                }
                info!(device = name, "Tone output stopped.");
            })
        };

        ready_rx.recv()??;
        Ok(Output {
            frequency,
            shutdown,
            thread: Mutex::new(Some(join_handle)),
        })
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(join_handle) = self.thread.lock().expect("unable to get lock").take() {
            join_handle.thread().unpark();
            if join_handle.join().is_err() {
                error!("Error while joining tone output thread.");
            }
        }
    }
}

/// Builds a square wave output stream in whatever sample format the device prefers.
fn build_stream(
    device: &cpal::Device,
    frequency: Arc<AtomicU32>,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    Ok(match sample_format {
        cpal::SampleFormat::F32 => square_wave_stream::<f32>(device, &config, frequency)?,
        cpal::SampleFormat::I16 => square_wave_stream::<i16>(device, &config, frequency)?,
        cpal::SampleFormat::I32 => square_wave_stream::<i32>(device, &config, frequency)?,
        cpal::SampleFormat::U16 => square_wave_stream::<u16>(device, &config, frequency)?,
        sample_format => {
            return Err(format!("unsupported sample format {:?}", sample_format).into())
        }
    })
}

fn square_wave_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    frequency: Arc<AtomicU32>,
) -> Result<cpal::Stream, Box<dyn Error>>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = usize::from(config.channels);
    let sample_rate = config.sample_rate.0 as f32;
    let mut oscillator = SquareWave::new(sample_rate);

    Ok(device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frequency = frequency.load(Ordering::Relaxed);
            for frame in data.chunks_mut(channels) {
                let sample = T::from_sample(oscillator.next(frequency));
                frame.iter_mut().for_each(|out| *out = sample);
            }
        },
        |e| error!(err = e.to_string(), "Tone output stream error."),
        None,
    )?)
}

/// A naive square wave oscillator. A frequency of zero outputs silence.
struct SquareWave {
    sample_rate: f32,
    phase: f32,
}

impl SquareWave {
    fn new(sample_rate: f32) -> SquareWave {
        SquareWave {
            sample_rate,
            phase: 0.0,
        }
    }

    fn next(&mut self, frequency: u32) -> f32 {
        if frequency == 0 {
            self.phase = 0.0;
            return 0.0;
        }

        self.phase = (self.phase + frequency as f32 / self.sample_rate).fract();
        if self.phase < 0.5 {
            AMPLITUDE
        } else {
            -AMPLITUDE
        }
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn start(&self, frequency_hz: u32) {
        if let Some(output) = &self.output {
            output.frequency.store(frequency_hz, Ordering::Relaxed);
        }
    }

    fn stop(&self) {
        if let Some(output) = &self.output {
            output.frequency.store(0, Ordering::Relaxed);
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.host_id.name())
    }
}
