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

//! Test helpers for generating audio fixtures.

#[cfg(test)]
use std::{error::Error, path::Path};

#[cfg(test)]
use hound::{SampleFormat, WavSpec, WavWriter};

/// Writes a 32-bit float WAV file with one Vec per channel.
#[cfg(test)]
pub fn write_wav(path: &Path, channels: &[Vec<f32>], sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let channel_count = channels.len();
    assert!(channel_count > 0, "need at least one channel");
    let frames = channels[0].len();
    assert!(
        channels.iter().all(|c| c.len() == frames),
        "channels must be the same length"
    );

    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels: channel_count as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    // Interleave the planar input.
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Generates a sine wave at the given frequency.
#[cfg(test)]
pub fn sine(frequency: f32, amplitude: f32, sample_rate: u32, samples: usize) -> Vec<f32> {
    (0..samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}
