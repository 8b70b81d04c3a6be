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

//! The sample library: every configured clip, addressed by (bank, key).
//!
//! All clips load eagerly at startup. A missing binding during live play is
//! an expected condition and surfaces as a `None` lookup, never an error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::loader::{AssetLoadError, SampleAsset, SampleLoader};
use crate::config::Binding;

/// An immutable map from (bank, key) to a loaded clip.
pub struct SampleLibrary {
    banks: HashMap<char, HashMap<char, Arc<SampleAsset>>>,
}

impl SampleLibrary {
    /// Loads every configured binding eagerly. Any load failure aborts the
    /// whole library; the instrument does not come up with missing clips.
    pub fn load(
        bindings: &[Binding],
        base_path: &Path,
        sample_rate: u32,
    ) -> Result<Self, AssetLoadError> {
        let mut loader = SampleLoader::new(sample_rate);
        let mut banks: HashMap<char, HashMap<char, Arc<SampleAsset>>> = HashMap::new();

        for binding in bindings {
            let path = if Path::new(binding.file()).is_absolute() {
                Path::new(binding.file()).to_path_buf()
            } else {
                base_path.join(binding.file())
            };

            info!(
                bank = %binding.bank(),
                key = %binding.key(),
                file = binding.file(),
                "Loading clip"
            );
            let asset = loader.load(&path)?;
            banks
                .entry(binding.bank())
                .or_default()
                .insert(binding.key(), asset);
        }

        info!(
            banks = banks.len(),
            clips = banks.values().map(|b| b.len()).sum::<usize>(),
            memory_kb = loader.total_memory_usage() / 1024,
            "Sample library loaded"
        );

        Ok(Self { banks })
    }

    /// Looks up the clip bound to a key in a bank. Missing keys are an
    /// expected live-play condition.
    pub fn lookup(&self, bank: char, key: char) -> Option<&Arc<SampleAsset>> {
        self.banks.get(&bank)?.get(&key)
    }

    /// True if the given bank id exists.
    pub fn has_bank(&self, bank: char) -> bool {
        self.banks.contains_key(&bank)
    }

    /// The configured bank ids, sorted.
    pub fn bank_ids(&self) -> Vec<char> {
        let mut ids: Vec<char> = self.banks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The keys bound in a bank, sorted.
    pub fn keys_in_bank(&self, bank: char) -> Vec<char> {
        let mut keys: Vec<char> = self
            .banks
            .get(&bank)
            .map(|b| b.keys().copied().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    /// The total number of bound clips.
    pub fn len(&self) -> usize {
        self.banks.values().map(|b| b.len()).sum()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn from_assets(assets: Vec<(char, char, Arc<SampleAsset>)>) -> Self {
        let mut banks: HashMap<char, HashMap<char, Arc<SampleAsset>>> = HashMap::new();
        for (bank, key, asset) in assets {
            banks.entry(bank).or_default().insert(key, asset);
        }
        Self { banks }
    }
}

impl std::fmt::Debug for SampleLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLibrary")
            .field("banks", &self.banks.len())
            .field("clips", &self.len())
            .finish()
    }
}
