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

//! The input router: resolves key events against the active bank and hands
//! trigger requests to the audio thread.
//!
//! Runs on the control thread. Every condition on this path is an outcome
//! value; nothing here panics or propagates errors toward the audio context.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::audio::Trigger;
use crate::params::Params;
use crate::samples::{SampleLibrary, VoiceReservations};

/// The result of one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A voice was reserved and the trigger queued.
    Triggered,
    /// The key selected a new active bank.
    BankSelected(char),
    /// The key has no binding in the active bank.
    NoBinding,
    /// Every voice slot is busy; the trigger was dropped.
    NoFreeVoice,
}

/// Maps key events to sample triggers.
pub struct Router {
    library: Arc<SampleLibrary>,
    params: Arc<Params>,
    triggers: Sender<Trigger>,
    reservations: VoiceReservations,
    active_bank: char,
}

impl Router {
    /// Creates a router starting on the given bank.
    pub fn new(
        library: Arc<SampleLibrary>,
        params: Arc<Params>,
        triggers: Sender<Trigger>,
        reservations: VoiceReservations,
        initial_bank: char,
    ) -> Self {
        Self {
            library,
            params,
            triggers,
            reservations,
            active_bank: initial_bank,
        }
    }

    /// The currently selected bank.
    pub fn active_bank(&self) -> char {
        self.active_bank
    }

    /// Switches the active bank. Has no audio effect.
    pub fn select_bank(&mut self, bank: char) {
        self.active_bank = bank;
        info!(bank = %bank, "Switched bank");
    }

    /// Handles one key event: bank ids switch the active bank, anything
    /// else is looked up in it and triggered if possible.
    pub fn handle_key(&mut self, key: char) -> TriggerOutcome {
        if self.library.has_bank(key) {
            self.select_bank(key);
            return TriggerOutcome::BankSelected(key);
        }

        let asset = match self.library.lookup(self.active_bank, key) {
            Some(asset) => asset.clone(),
            None => {
                warn!(key = %key, bank = %self.active_bank, "No sample for key");
                return TriggerOutcome::NoBinding;
            }
        };

        if !self.reservations.try_reserve() {
            warn!(
                key = %key,
                capacity = self.reservations.capacity(),
                "All voices busy, dropping trigger"
            );
            return TriggerOutcome::NoFreeVoice;
        }

        let rate = self.params.rate();
        match self.triggers.try_send(Trigger { asset, rate }) {
            Ok(()) => {
                debug!(key = %key, bank = %self.active_bank, rate, "Triggered");
                TriggerOutcome::Triggered
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                // The queue is sized to the polyphony limit, so a failed
                // send means the engine is gone; give the slot back.
                self.reservations.release();
                warn!(key = %key, "Trigger queue unavailable");
                TriggerOutcome::NoFreeVoice
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("active_bank", &self.active_bank)
            .field("voices_in_use", &self.reservations.in_use())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{SampleAsset, VoicePool};
    use crossbeam_channel::Receiver;

    fn test_router(capacity: usize) -> (Router, Receiver<Trigger>) {
        let asset = |len| Arc::new(SampleAsset::from_samples(vec![0.5; len], 48000));
        let library = Arc::new(SampleLibrary::from_assets(vec![
            ('1', 'a', asset(100)),
            ('1', 's', asset(200)),
            ('2', 'a', asset(300)),
        ]));
        let pool = VoicePool::new(capacity);
        let reservations = pool.reservations();
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let router = Router::new(library, Arc::new(Params::new()), tx, reservations, '1');
        (router, rx)
    }

    #[test]
    fn test_trigger_resolves_active_bank() {
        let (mut router, rx) = test_router(4);

        assert_eq!(router.handle_key('a'), TriggerOutcome::Triggered);
        let trigger = rx.try_recv().expect("queued trigger");
        assert_eq!(trigger.asset.len(), 100);

        assert_eq!(router.handle_key('2'), TriggerOutcome::BankSelected('2'));
        assert_eq!(router.active_bank(), '2');

        assert_eq!(router.handle_key('a'), TriggerOutcome::Triggered);
        let trigger = rx.try_recv().expect("queued trigger");
        assert_eq!(trigger.asset.len(), 300);
    }

    #[test]
    fn test_unbound_key_reports_no_binding() {
        let (mut router, rx) = test_router(4);

        assert_eq!(router.handle_key('x'), TriggerOutcome::NoBinding);
        assert!(rx.try_recv().is_err());
        // No reservation was consumed.
        assert_eq!(router.reservations.in_use(), 0);
    }

    #[test]
    fn test_unknown_bank_digit_is_a_lookup() {
        let (mut router, _rx) = test_router(4);
        // '3' is not a configured bank, so it's treated as a trigger key.
        assert_eq!(router.handle_key('3'), TriggerOutcome::NoBinding);
        assert_eq!(router.active_bank(), '1');
    }

    #[test]
    fn test_exhausted_pool_drops_newest() {
        let (mut router, rx) = test_router(16);

        for _ in 0..16 {
            assert_eq!(router.handle_key('a'), TriggerOutcome::Triggered);
        }
        // The 17th trigger fails closed and is never queued.
        assert_eq!(router.handle_key('a'), TriggerOutcome::NoFreeVoice);
        assert_eq!(rx.len(), 16);
        assert_eq!(router.reservations.in_use(), 16);
    }

    #[test]
    fn test_trigger_carries_current_rate() {
        let (mut router, rx) = test_router(4);
        router.params.set_rate(1.5);

        assert_eq!(router.handle_key('a'), TriggerOutcome::Triggered);
        let trigger = rx.try_recv().expect("queued trigger");
        assert_eq!(trigger.rate, 1.5);
    }

    #[test]
    fn test_disconnected_queue_releases_reservation() {
        let (mut router, rx) = test_router(4);
        drop(rx);

        assert_eq!(router.handle_key('a'), TriggerOutcome::NoFreeVoice);
        assert_eq!(router.reservations.in_use(), 0);
    }
}
