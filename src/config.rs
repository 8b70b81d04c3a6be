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

//! Instrument configuration.
//!
//! One YAML file describes the audio output, the polyphony limit, parameter
//! defaults and the ordered list of (bank, key, file) bindings. The resolved
//! configuration is passed down as a dependency; there is no global state.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default engine sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
/// Default audio block size in frames.
pub const DEFAULT_BUFFER_SIZE: usize = 512;
/// Default polyphony limit.
pub const DEFAULT_POLYPHONY: usize = 16;

/// Audio output configuration.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct AudioConfig {
    /// The output device name. Unset picks the host default.
    device: Option<String>,

    /// The engine sample rate.
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,

    /// The audio block size in frames.
    #[serde(default = "default_buffer_size")]
    buffer_size: usize,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl AudioConfig {
    /// Gets the configured device name, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Gets the engine sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Gets the block size in frames.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// One (bank, key, file) binding record.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct Binding {
    /// The bank id this binding belongs to.
    bank: char,

    /// The key that triggers the clip.
    key: char,

    /// The audio file, relative to the configuration file unless absolute.
    file: String,
}

impl Binding {
    /// Gets the bank id.
    pub fn bank(&self) -> char {
        self.bank
    }

    /// Gets the trigger key.
    pub fn key(&self) -> char {
        self.key
    }

    /// Gets the audio file path.
    pub fn file(&self) -> &str {
        &self.file
    }
}

#[cfg(test)]
impl Binding {
    /// Creates a new binding (test only).
    pub fn new(bank: char, key: char, file: &str) -> Self {
        Self {
            bank,
            key,
            file: file.to_string(),
        }
    }
}

/// Initial values for the live parameters. Unset fields keep the documented
/// defaults; all values are clamped into their ranges when applied.
#[derive(Deserialize, Clone, Serialize, Debug, Default)]
pub struct ParamDefaults {
    bandwidth: Option<f32>,
    decay: Option<f32>,
    damping: Option<f32>,
    wetness: Option<f32>,
    rate: Option<f32>,
}

impl ParamDefaults {
    /// Applies the configured values onto a parameter set.
    pub fn apply(&self, params: &crate::params::Params) {
        if let Some(bandwidth) = self.bandwidth {
            params.set_bandwidth(bandwidth);
        }
        if let Some(decay) = self.decay {
            params.set_decay(decay);
        }
        if let Some(damping) = self.damping {
            params.set_damping(damping);
        }
        if let Some(wetness) = self.wetness {
            params.set_wetness(wetness);
        }
        if let Some(rate) = self.rate {
            params.set_rate(rate);
        }
    }
}

/// The full instrument configuration.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct Config {
    /// Audio output settings.
    #[serde(default)]
    audio: AudioConfig,

    /// The polyphony limit.
    #[serde(default = "default_polyphony")]
    polyphony: usize,

    /// Initial parameter values.
    #[serde(default)]
    params: ParamDefaults,

    /// The key bindings, in declaration order.
    bindings: Vec<Binding>,

    /// The directory sample paths are resolved against. Filled in from the
    /// configuration file's location on load.
    #[serde(skip)]
    base_path: PathBuf,
}

fn default_polyphony() -> usize {
    DEFAULT_POLYPHONY
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Config, Box<dyn Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        let mut config: Config = serde_yml::from_str(&contents)
            .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))?;

        config.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.bindings.is_empty() {
            return Err("configuration has no key bindings".into());
        }
        if self.polyphony == 0 {
            return Err("polyphony must be at least 1".into());
        }
        // Bank selection takes precedence over triggering, so a trigger key
        // equal to any bank id would be unreachable.
        let bank_ids: std::collections::HashSet<char> =
            self.bindings.iter().map(|b| b.bank).collect();
        for binding in &self.bindings {
            if bank_ids.contains(&binding.key) {
                return Err(format!(
                    "key '{}' in bank '{}' collides with a bank id",
                    binding.key, binding.bank
                )
                .into());
            }
        }
        Ok(())
    }

    /// Gets the audio output settings.
    pub fn audio(&self) -> &AudioConfig {
        &self.audio
    }

    /// Gets the polyphony limit.
    pub fn polyphony(&self) -> usize {
        self.polyphony
    }

    /// Gets the initial parameter values.
    pub fn params(&self) -> &ParamDefaults {
        &self.params
    }

    /// Gets the key bindings in declaration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Gets the directory sample paths are resolved against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Gets the first bank id in declaration order, the startup bank.
    pub fn initial_bank(&self) -> Option<char> {
        self.bindings.first().map(|b| b.bank())
    }
}
