use crate::core::models::ids::{ParticleId, ordered_pair};
use std::collections::BTreeSet;

/// Set of captured (bonded, inside-the-shell) unordered particle pairs.
///
/// Owned by the interaction that tracks it. Iteration order is sorted so that saved documents
/// are reproducible.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CaptureMap {
    pairs: BTreeSet<(ParticleId, ParticleId)>,
}

impl CaptureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = [ParticleId; 2]>) -> Self {
        Self {
            pairs: pairs
                .into_iter()
                .map(|[a, b]| ordered_pair(a, b))
                .collect(),
        }
    }

    /// Rebuilds the map from a capture test over candidate pairs.
    pub fn rebuild(
        &mut self,
        candidates: impl IntoIterator<Item = (ParticleId, ParticleId)>,
        mut is_captured: impl FnMut(ParticleId, ParticleId) -> bool,
    ) {
        self.pairs.clear();
        for (a, b) in candidates {
            if a != b && is_captured(a, b) {
                self.pairs.insert(ordered_pair(a, b));
            }
        }
    }

    #[inline]
    pub fn is_captured(&self, a: ParticleId, b: ParticleId) -> bool {
        self.pairs.contains(&ordered_pair(a, b))
    }

    /// Returns false if the pair was already captured.
    pub fn add(&mut self, a: ParticleId, b: ParticleId) -> bool {
        self.pairs.insert(ordered_pair(a, b))
    }

    /// Returns false if the pair was not captured.
    pub fn remove(&mut self, a: ParticleId, b: ParticleId) -> bool {
        self.pairs.remove(&ordered_pair(a, b))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticleId, ParticleId)> + '_ {
        self.pairs.iter().copied()
    }

    pub fn to_pairs(&self) -> Vec<[ParticleId; 2]> {
        self.iter().map(|(a, b)| [a, b]).collect()
    }
}
