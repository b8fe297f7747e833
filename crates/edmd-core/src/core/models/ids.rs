use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a particle.
///
/// Particle IDs are dense: a simulation of `N` particles uses exactly `0..N`, so the ID doubles
/// as the index into every per-particle table (particles, cell links, scheduler entries).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticleId(pub usize);

impl ParticleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for ParticleId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Returns the pair in ascending order, the canonical key for unordered pairs.
#[inline]
pub fn ordered_pair(a: ParticleId, b: ParticleId) -> (ParticleId, ParticleId) {
    if a <= b { (a, b) } else { (b, a) }
}
