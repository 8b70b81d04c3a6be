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

//! Voices and the fixed-capacity voice pool.
//!
//! A voice is one playback of a clip; the pool owns a fixed set of voice
//! slots that are recycled for the life of the process. Slots are only ever
//! mutated on the audio thread; the control thread interacts through the
//! shared reservation counter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::loader::SampleAsset;

/// Floor applied to playback rates so the cursor always moves forward.
const MIN_RATE: f32 = 1e-3;

/// A small visual payload regenerated on every trigger, for an external view
/// layer to render however it likes. Playback never reads it.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisualToken {
    /// Three vertices in the unit ball.
    pub vertices: [[f32; 3]; 3],
    /// One RGB color per vertex.
    pub colors: [[f32; 3]; 3],
}

impl VisualToken {
    fn randomize(&mut self, rng: &mut SmallRng) {
        for vertex in self.vertices.iter_mut() {
            for coord in vertex.iter_mut() {
                *coord = rng.gen_range(-1.0..1.0);
            }
        }
        for color in self.colors.iter_mut() {
            for channel in color.iter_mut() {
                *channel = rng.gen_range(0.0..1.0);
            }
        }
    }
}

/// One playback instance of a clip. Holds a borrowed (shared, read-only)
/// reference to the asset and a fractional cursor over it.
pub struct Voice {
    asset: Option<Arc<SampleAsset>>,
    position: f64,
    rate: f64,
    active: bool,
    token: VisualToken,
}

impl Voice {
    fn idle() -> Self {
        Self {
            asset: None,
            position: 0.0,
            rate: 1.0,
            active: false,
            token: VisualToken::default(),
        }
    }

    /// Binds the voice to a clip, resets the cursor to the start and marks
    /// it active. Reused slots restart from zero regardless of prior state.
    pub fn configure(&mut self, asset: Arc<SampleAsset>, rate: f32) {
        self.asset = Some(asset);
        self.position = 0.0;
        // Rates at or below zero would stall or reverse the cursor.
        self.rate = f64::from(rate.max(MIN_RATE));
        self.active = true;
    }

    /// Produces the next output sample and moves the cursor forward by the
    /// playback rate. Fractional cursor positions are read with linear
    /// interpolation. Once the cursor reaches the end of the clip the voice
    /// is done and yields silence.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if !self.active || self.is_done() {
            return 0.0;
        }
        let asset = match &self.asset {
            Some(asset) => asset,
            None => return 0.0,
        };

        let index = self.position.floor() as usize;
        let frac = (self.position - index as f64) as f32;
        let s0 = asset.sample(index);
        let s1 = asset.sample(index + 1);
        let sample = s0 + (s1 - s0) * frac;

        let len = asset.len() as f64;
        self.position = (self.position + self.rate).min(len);

        sample
    }

    /// True once playback has exhausted the clip.
    pub fn is_done(&self) -> bool {
        match &self.asset {
            Some(asset) => self.position >= asset.len() as f64,
            None => true,
        }
    }

    /// True while the voice occupies its slot (set on trigger, cleared on
    /// reclamation).
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The visual payload from the most recent trigger (read by an external
    /// view layer).
    #[allow(dead_code)]
    pub fn token(&self) -> &VisualToken {
        &self.token
    }
}

/// Shared view of how many voice slots are spoken for: currently active
/// voices plus triggers queued but not yet picked up by the audio thread.
/// Lets the control thread fail closed without touching voice state.
#[derive(Clone)]
pub struct VoiceReservations {
    in_use: Arc<AtomicUsize>,
    capacity: usize,
}

impl VoiceReservations {
    fn new(capacity: usize) -> Self {
        Self {
            in_use: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Reserves a slot if one is free. Returns false when the pool is at
    /// capacity, in which case the trigger must be dropped.
    pub fn try_reserve(&self) -> bool {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |in_use| {
                if in_use < self.capacity {
                    Some(in_use + 1)
                } else {
                    None
                }
            })
            .is_ok()
    }

    /// Releases a reservation (a voice finished, or a queued trigger was
    /// abandoned).
    pub fn release(&self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }

    /// The number of slots currently reserved.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// The polyphony limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Fixed-capacity pool of reusable voice slots. Allocation scans slots in
/// ascending index order, so identical trigger sequences produce identical
/// slot assignments. When every slot is busy the newest trigger is dropped;
/// nothing is stolen.
pub struct VoicePool {
    voices: Vec<Voice>,
    reservations: VoiceReservations,
    rng: SmallRng,
}

impl VoicePool {
    /// Creates a pool with the given polyphony limit.
    pub fn new(capacity: usize) -> Self {
        Self {
            voices: (0..capacity).map(|_| Voice::idle()).collect(),
            reservations: VoiceReservations::new(capacity),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Returns a handle to the shared reservation counter for the control
    /// thread.
    pub fn reservations(&self) -> VoiceReservations {
        self.reservations.clone()
    }

    /// Finds a free slot, lowest index first. Returns `None` when every slot
    /// is active; the caller drops the trigger.
    pub fn acquire(&mut self) -> Option<usize> {
        self.voices.iter().position(|v| !v.is_active())
    }

    /// Configures and activates the voice in the given slot.
    pub fn trigger(&mut self, slot: usize, asset: Arc<SampleAsset>, rate: f32) {
        let voice = &mut self.voices[slot];
        voice.configure(asset, rate);
        voice.token.randomize(&mut self.rng);
    }

    /// Deactivates every voice that has finished playback, freeing its slot
    /// and reservation. Runs once per audio block, after mixing.
    pub fn reclaim(&mut self) {
        for voice in self.voices.iter_mut() {
            if voice.is_active() && voice.is_done() {
                voice.active = false;
                self.reservations.release();
            }
        }
    }

    /// The number of currently active voices.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// The polyphony limit (used for testing/debugging).
    #[allow(dead_code)]
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Iterates over the voice slots mutably, for the mixing loop.
    pub fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut()
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("capacity", &self.voices.len())
            .field("active", &self.active_count())
            .finish()
    }
}
