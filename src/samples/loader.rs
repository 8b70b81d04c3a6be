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

//! Sample asset loading.
//!
//! Clips are decoded entirely into memory at startup, downmixed to mono and
//! resampled to the engine rate, so the audio thread never touches the disk.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

/// Error loading a sample asset. All variants are startup-time failures; the
/// library refuses to come up with an incomplete clip set.
#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported or corrupt audio in {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: SymphoniaError,
    },

    #[error("no audio track in {}", .0.display())]
    NoAudioTrack(PathBuf),

    #[error("no sample rate declared in {}", .0.display())]
    NoSampleRate(PathBuf),

    #[error("no audio data in {}", .0.display())]
    Empty(PathBuf),
}

/// A decoded clip: an immutable mono buffer at the engine sample rate.
/// Shared read-only between every voice that plays it.
pub struct SampleAsset {
    data: Vec<f32>,
    sample_rate: u32,
}

impl SampleAsset {
    /// The number of samples in the clip.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads the sample at the given index. Out-of-range reads yield silence
    /// so interpolating one sample past the end is safe.
    #[inline]
    pub fn sample(&self, index: usize) -> f32 {
        self.data.get(index).copied().unwrap_or(0.0)
    }

    /// The sample rate the clip was resampled to (used for testing).
    #[allow(dead_code)]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The clip duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.data.len() as f64 / self.sample_rate as f64)
    }

    /// The memory size of the clip in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    #[cfg(test)]
    pub fn from_samples(data: Vec<f32>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }
}

impl std::fmt::Debug for SampleAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleAsset")
            .field("samples", &self.data.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Decodes clips into memory, caching by path so a file bound to several
/// keys is only decoded and stored once.
pub struct SampleLoader {
    cache: HashMap<PathBuf, Arc<SampleAsset>>,
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new loader targeting the engine sample rate.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Loads a clip from a file, returning a cached copy if already loaded.
    pub fn load(&mut self, path: &Path) -> Result<Arc<SampleAsset>, AssetLoadError> {
        if let Some(asset) = self.cache.get(path) {
            debug!(path = ?path, "Using cached clip");
            return Ok(asset.clone());
        }

        let (samples, channels, source_rate) = decode_file(path)?;
        if samples.is_empty() || channels == 0 {
            return Err(AssetLoadError::Empty(path.to_path_buf()));
        }

        let mono = downmix_to_mono(&samples, channels);
        let data = if source_rate == self.target_sample_rate {
            mono
        } else {
            info!(
                path = ?path,
                source_rate,
                target_rate = self.target_sample_rate,
                "Resampling clip"
            );
            resample_linear(&mono, source_rate, self.target_sample_rate)
        };

        let asset = Arc::new(SampleAsset {
            data,
            sample_rate: self.target_sample_rate,
        });

        info!(
            path = ?path,
            samples = asset.len(),
            duration_ms = asset.duration().as_millis(),
            memory_kb = asset.memory_size() / 1024,
            "Clip loaded"
        );

        self.cache.insert(path.to_path_buf(), asset.clone());
        Ok(asset)
    }

    /// Returns the total memory used by cached clips.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|a| a.memory_size()).sum()
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_clips", &self.cache.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes an audio file to interleaved f32 samples.
fn decode_file(path: &Path) -> Result<(Vec<f32>, usize, u32), AssetLoadError> {
    let file = File::open(path).map_err(|e| AssetLoadError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let fmt_opts: FormatOptions = Default::default();
    let meta_opts: MetadataOptions = Default::default();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| AssetLoadError::Decode {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut format_reader = probed.format;
    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AssetLoadError::NoAudioTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let params = &track.codec_params;

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| AssetLoadError::NoSampleRate(path.to_path_buf()))?;

    let mut decoder =
        get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| AssetLoadError::Decode {
                path: path.to_path_buf(),
                source: e,
            })?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channels = 0usize;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            // Some decoders report EOF as a decode error on the final packet.
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(AssetLoadError::Decode {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(AssetLoadError::Decode {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let buf = sample_buf
            .get_or_insert_with(|| SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    Ok((samples, channels, sample_rate))
}

/// Downmixes interleaved samples to mono by averaging channels.
fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Resamples a mono buffer with linear interpolation. Quality is sufficient
/// for one-shot clips; a band-limited resampler would be overkill here.
fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let target_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for target_index in 0..target_len {
        let source_pos = target_index as f64 / ratio;
        let index = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        let s0 = samples.get(index).copied().unwrap_or(0.0);
        let s1 = samples.get(index + 1).copied().unwrap_or(s0);
        output.push(s0 + (s1 - s0) * frac);
    }

    output
}
