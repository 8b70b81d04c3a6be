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

//! The per-block mixing and effect stage.
//!
//! Runs entirely on the audio thread. Each block: pick up queued triggers,
//! sum the active voices into a mono accumulator, run the shared reverb,
//! reclaim finished voices, and forward the post-effect left channel to the
//! recorder. Nothing here allocates or blocks; an empty pool mixes silence.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use super::recorder::Recorder;
use super::reverb::Reverb;
use crate::params::Params;
use crate::samples::{SampleAsset, VoicePool};

/// A trigger request handed from the control thread to the audio thread.
pub struct Trigger {
    pub asset: Arc<SampleAsset>,
    pub rate: f32,
}

/// The audio-thread half of the instrument.
pub struct Mixer {
    pool: VoicePool,
    reverb: Reverb,
    params: Arc<Params>,
    triggers: Receiver<Trigger>,
    recorder: Arc<Mutex<Recorder>>,
    /// Mono accumulator, preallocated to the block size.
    mono: Vec<f32>,
    left: Vec<f32>,
    right: Vec<f32>,
    block_size: usize,
    blocks_processed: u64,
}

impl Mixer {
    pub fn new(
        pool: VoicePool,
        params: Arc<Params>,
        triggers: Receiver<Trigger>,
        recorder: Arc<Mutex<Recorder>>,
        block_size: usize,
    ) -> Self {
        Self {
            pool,
            reverb: Reverb::new(),
            params,
            triggers,
            recorder,
            mono: vec![0.0; block_size],
            left: vec![0.0; block_size],
            right: vec![0.0; block_size],
            block_size,
            blocks_processed: 0,
        }
    }

    /// Processes one block of up to `block_size` frames. Returns the left
    /// and right output slices for the block.
    pub fn process_block(&mut self, frames: usize) -> (&[f32], &[f32]) {
        let frames = frames.min(self.block_size);

        // Queued triggers are applied at the block boundary. Every message
        // carries a reservation, so a free slot is guaranteed; the fallback
        // releases the reservation rather than growing the pool.
        while let Ok(trigger) = self.triggers.try_recv() {
            match self.pool.acquire() {
                Some(slot) => self.pool.trigger(slot, trigger.asset, trigger.rate),
                None => self.pool.reservations().release(),
            }
        }

        let mono = &mut self.mono[..frames];
        mono.fill(0.0);

        // Plain linear summation: each voice contributes its samples
        // unscaled, independent of how many others are sounding.
        for voice in self.pool.voices_mut() {
            if !voice.is_active() {
                continue;
            }
            for accumulator in mono.iter_mut() {
                *accumulator += voice.advance();
            }
        }

        self.reverb.set_bandwidth(self.params.bandwidth());
        self.reverb.set_decay(self.params.decay());
        self.reverb.set_damping(self.params.damping());
        let wetness = self.params.wetness();

        for n in 0..frames {
            let dry = self.mono[n];
            let (wet_left, wet_right) = self.reverb.process(dry);
            self.left[n] = dry + wetness * (wet_left - dry);
            self.right[n] = dry + wetness * (wet_right - dry);
        }

        self.pool.reclaim();

        // The recorder lock is uncontended for the whole session: the
        // control thread only takes it after the stream has stopped.
        {
            let mut recorder = self.recorder.lock();
            for n in 0..frames {
                recorder.append(self.left[n]);
            }
        }

        self.blocks_processed += 1;
        (&self.left[..frames], &self.right[..frames])
    }

    /// Fills an interleaved stereo buffer, processing in block-size chunks.
    pub fn fill_interleaved(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let mut frame_offset = 0;
        let total_frames = data.len() / channels;

        while frame_offset < total_frames {
            let frames = (total_frames - frame_offset).min(self.block_size);
            let (left, right) = self.process_block(frames);

            for n in 0..frames {
                let base = (frame_offset + n) * channels;
                data[base] = left[n];
                if channels > 1 {
                    data[base + 1] = right[n];
                    for extra in 2..channels {
                        data[base + extra] = 0.0;
                    }
                }
            }
            frame_offset += frames;
        }
    }

    /// The number of blocks processed so far (used for testing/debugging).
    #[allow(dead_code)]
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }

    /// The number of currently active voices.
    pub fn active_voices(&self) -> usize {
        self.pool.active_count()
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("block_size", &self.block_size)
            .field("blocks_processed", &self.blocks_processed)
            .field("active_voices", &self.active_voices())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;

    const BLOCK_SIZE: usize = 512;

    fn test_mixer(capacity: usize) -> (Mixer, Sender<Trigger>, crate::samples::VoiceReservations) {
        let pool = VoicePool::new(capacity);
        let reservations = pool.reservations();
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let recorder = Arc::new(Mutex::new(Recorder::new(48000)));
        let mixer = Mixer::new(pool, Arc::new(Params::new()), rx, recorder, BLOCK_SIZE);
        (mixer, tx, reservations)
    }

    fn constant_asset(value: f32, len: usize) -> Arc<SampleAsset> {
        Arc::new(SampleAsset::from_samples(vec![value; len], 48000))
    }

    fn send_trigger(
        tx: &Sender<Trigger>,
        reservations: &crate::samples::VoiceReservations,
        asset: Arc<SampleAsset>,
        rate: f32,
    ) {
        assert!(reservations.try_reserve());
        tx.send(Trigger { asset, rate }).expect("send");
    }

    #[test]
    fn test_empty_pool_mixes_silence() {
        let (mut mixer, _tx, _r) = test_mixer(4);
        let (left, right) = mixer.process_block(BLOCK_SIZE);
        assert!(left.iter().all(|&s| s == 0.0));
        assert!(right.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_summation_is_linear() {
        let (mut mixer, tx, reservations) = test_mixer(8);
        // Three voices with distinct constant values; dry sum is exact.
        send_trigger(&tx, &reservations, constant_asset(0.25, 48000), 1.0);
        send_trigger(&tx, &reservations, constant_asset(0.125, 48000), 1.0);
        send_trigger(&tx, &reservations, constant_asset(-0.0625, 48000), 1.0);

        // Wetness 0: the left output is exactly the dry sum.
        mixer.params.set_wetness(0.0);
        let (left, _) = mixer.process_block(BLOCK_SIZE);
        let expected = 0.25 + 0.125 - 0.0625;
        for &sample in left {
            assert!((sample - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_voice_lifecycle_across_blocks() {
        // 48000-sample clip at rate 1.0 with 512-frame blocks: the voice is
        // exhausted during block 94 (94 * 512 = 48128) and its slot is free
        // from block 95 on.
        let (mut mixer, tx, reservations) = test_mixer(16);
        send_trigger(&tx, &reservations, constant_asset(0.5, 48000), 1.0);

        for _ in 0..93 {
            mixer.process_block(BLOCK_SIZE);
            assert_eq!(mixer.active_voices(), 1);
        }
        mixer.process_block(BLOCK_SIZE);
        assert_eq!(mixer.active_voices(), 0);
        assert_eq!(mixer.blocks_processed(), 94);
        assert_eq!(reservations.in_use(), 0);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let (mut mixer, tx, reservations) = test_mixer(16);
        for _ in 0..16 {
            send_trigger(&tx, &reservations, constant_asset(0.01, 48000), 1.0);
        }
        // The 17th reservation fails closed; nothing is queued for it.
        assert!(!reservations.try_reserve());

        mixer.process_block(BLOCK_SIZE);
        assert_eq!(mixer.active_voices(), 16);
    }

    #[test]
    fn test_recorder_receives_every_left_sample() {
        let (mut mixer, tx, reservations) = test_mixer(4);
        send_trigger(&tx, &reservations, constant_asset(0.5, 4800), 1.0);

        let blocks = 20;
        for _ in 0..blocks {
            mixer.process_block(BLOCK_SIZE);
        }

        let recorder = mixer.recorder.lock();
        assert_eq!(recorder.len(), blocks * BLOCK_SIZE);
    }

    #[test]
    fn test_recording_matches_left_output() {
        let (mut mixer, tx, reservations) = test_mixer(4);
        mixer.params.set_wetness(0.25);
        send_trigger(&tx, &reservations, constant_asset(0.5, 2048), 1.0);

        let mut produced: Vec<f32> = Vec::new();
        for _ in 0..8 {
            let (left, _) = mixer.process_block(BLOCK_SIZE);
            produced.extend_from_slice(left);
        }

        let recorder = mixer.recorder.lock();
        assert_eq!(recorder.samples(), produced.as_slice());
    }

    #[test]
    fn test_wet_blend_reaches_both_channels() {
        let (mut mixer, tx, reservations) = test_mixer(4);
        mixer.params.set_wetness(1.0);
        send_trigger(&tx, &reservations, constant_asset(0.5, 48000), 1.0);

        let mut left_energy = 0.0f64;
        let mut right_energy = 0.0f64;
        for _ in 0..40 {
            let (left, right) = mixer.process_block(BLOCK_SIZE);
            left_energy += left.iter().map(|&s| f64::from(s * s)).sum::<f64>();
            right_energy += right.iter().map(|&s| f64::from(s * s)).sum::<f64>();
        }
        assert!(left_energy > 0.0);
        assert!(right_energy > 0.0);
    }

    #[test]
    fn test_fill_interleaved_stereo() {
        let (mut mixer, tx, reservations) = test_mixer(4);
        mixer.params.set_wetness(0.0);
        send_trigger(&tx, &reservations, constant_asset(0.5, 48000), 1.0);

        let mut data = vec![0.0f32; BLOCK_SIZE * 2];
        mixer.fill_interleaved(&mut data, 2);

        for frame in data.chunks_exact(2) {
            assert!((frame[0] - 0.5).abs() < 1e-6);
        }
        assert_eq!(mixer.blocks_processed(), 1);
    }
}
