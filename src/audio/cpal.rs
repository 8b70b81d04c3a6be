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

//! The cpal output device: owns the output stream whose callback drives the
//! mixer.

use std::error::Error;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, StreamConfig};
use tracing::{error, info};

use super::mixer::Mixer;
use crate::config::AudioConfig;

/// The number of output channels the instrument plays through.
const OUTPUT_CHANNELS: u16 = 2;

/// A running output stream. Playback stops when this is dropped.
pub struct OutputStream {
    stream: cpal::Stream,
    device_name: String,
}

impl OutputStream {
    /// Opens the configured output device and starts the stream. The mixer
    /// moves into the audio callback and is driven block by block from
    /// there.
    pub fn start(config: &AudioConfig, mut mixer: Mixer) -> Result<Self, Box<dyn Error>> {
        let host = cpal::default_host();
        let device = match config.device() {
            Some(name) => host
                .output_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| format!("no output device named {}", name))?,
            None => host
                .default_output_device()
                .ok_or("no default output device")?,
        };
        let device_name = device.name()?;

        let stream_config = StreamConfig {
            channels: OUTPUT_CHANNELS,
            sample_rate: config.sample_rate(),
            buffer_size: BufferSize::Fixed(config.buffer_size() as u32),
        };

        info!(
            device = device_name,
            sample_rate = config.sample_rate(),
            buffer_size = config.buffer_size(),
            "Starting output stream"
        );

        let channels = usize::from(OUTPUT_CHANNELS);
        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                mixer.fill_interleaved(data, channels);
            },
            |e| error!(error = %e, "Output stream error"),
            None,
        )?;
        stream.play()?;

        Ok(Self {
            stream,
            device_name,
        })
    }

    /// The name of the device the stream plays through.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stops playback. Dropping the stream has the same effect; this makes
    /// the shutdown ordering explicit at the call site.
    pub fn stop(self) {
        drop(self.stream);
    }
}

/// Lists the names of the available output devices.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for device in host.output_devices()? {
        names.push(device.name()?);
    }
    Ok(names)
}
