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

//! Session recording.
//!
//! The full post-effect output is accumulated in memory for the life of the
//! session and written out once, at shutdown, as a mono 32-bit float WAV.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use rand::Rng;
use tracing::info;

/// Initial reservation, in seconds of audio, so steady appending does not
/// reallocate during a typical session.
const RESERVED_SECONDS: usize = 600;

/// Error writing the recording at shutdown. This is the one fatal error
/// path in the instrument; no audio work follows it.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("failed to create recording {path}: {source}")]
    Create {
        path: String,
        source: hound::Error,
    },

    #[error("failed to write recording {path}: {source}")]
    Write {
        path: String,
        source: hound::Error,
    },
}

/// Accumulates the mixed output one sample at a time.
pub struct Recorder {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Recorder {
    /// Creates a recorder for the given sample rate with a generous
    /// up-front reservation.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::with_capacity(sample_rate as usize * RESERVED_SECONDS),
            sample_rate,
        }
    }

    /// Appends one output sample. Amortized O(1).
    #[inline]
    pub fn append(&mut self, sample: f32) {
        self.samples.push(sample);
    }

    /// The number of samples recorded so far (used for testing/debugging).
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The recorded samples (used for testing/debugging).
    #[allow(dead_code)]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Writes the whole session as a mono 32-bit float WAV.
    pub fn flush(&self, path: &Path) -> Result<(), RecorderError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let path_str = path.display().to_string();
        let mut writer = WavWriter::create(path, spec).map_err(|e| RecorderError::Create {
            path: path_str.clone(),
            source: e,
        })?;

        for &sample in &self.samples {
            writer
                .write_sample(sample)
                .map_err(|e| RecorderError::Write {
                    path: path_str.clone(),
                    source: e,
                })?;
        }
        writer.finalize().map_err(|e| RecorderError::Write {
            path: path_str.clone(),
            source: e,
        })?;

        info!(
            path = path_str,
            samples = self.samples.len(),
            seconds = self.samples.len() as f64 / f64::from(self.sample_rate),
            "Recording written"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Generates the session's recording file name with a random numeric suffix.
pub fn recording_filename() -> String {
    format!("recording-{}.wav", rand::thread_rng().gen_range(0..10_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_counts_samples() {
        let mut recorder = Recorder::new(48000);
        assert!(recorder.is_empty());
        for i in 0..1024 {
            recorder.append(i as f32);
        }
        assert_eq!(recorder.len(), 1024);
    }

    #[test]
    fn test_flush_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.wav");

        let mut recorder = Recorder::new(48000);
        let samples: Vec<f32> = (0..4800)
            .map(|i| (i as f32 * 0.001).sin() * 0.5)
            .collect();
        for &sample in &samples {
            recorder.append(sample);
        }
        recorder.flush(&path).expect("flush");

        let mut reader = hound::WavReader::open(&path).expect("open");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, SampleFormat::Float);

        let decoded: Vec<f32> = reader
            .samples::<f32>()
            .map(|s| s.expect("sample"))
            .collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_flush_to_bad_path_fails() {
        let recorder = Recorder::new(48000);
        let result = recorder.flush(Path::new("/nonexistent/dir/out.wav"));
        assert!(matches!(result, Err(RecorderError::Create { .. })));
    }

    #[test]
    fn test_recording_filename_shape() {
        let name = recording_filename();
        assert!(name.starts_with("recording-"));
        assert!(name.ends_with(".wav"));
    }
}
