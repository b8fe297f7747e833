use super::ids::ParticleId;
use serde::{Deserialize, Serialize};

/// A predicate over particle IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ParticleRange {
    #[default]
    All,
    None,
    Single {
        id: ParticleId,
    },
    /// Inclusive on both ends.
    Ranged {
        start: ParticleId,
        end: ParticleId,
    },
    List {
        ids: Vec<ParticleId>,
    },
}

impl ParticleRange {
    pub fn contains(&self, id: ParticleId) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Single { id: only } => *only == id,
            Self::Ranged { start, end } => *start <= id && id <= *end,
            Self::List { ids } => ids.contains(&id),
        }
    }

    /// Number of members among particles `0..n`.
    pub fn count(&self, n: usize) -> usize {
        (0..n).filter(|&i| self.contains(ParticleId(i))).count()
    }
}

/// A predicate over unordered particle pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PairRange {
    #[default]
    All,
    None,
    /// Both particles belong to `range`.
    Single { range: ParticleRange },
    /// One particle in each range, in either order.
    Pair {
        first: ParticleRange,
        second: ParticleRange,
    },
    /// Consecutive particles of linear chains of `interval` members laid out from `start` to
    /// `end` inclusive.
    Chains {
        start: ParticleId,
        end: ParticleId,
        interval: usize,
    },
}

impl PairRange {
    pub fn contains(&self, a: ParticleId, b: ParticleId) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Single { range } => range.contains(a) && range.contains(b),
            Self::Pair { first, second } => {
                (first.contains(a) && second.contains(b))
                    || (first.contains(b) && second.contains(a))
            }
            Self::Chains {
                start,
                end,
                interval,
            } => {
                let (lo, hi) = super::ids::ordered_pair(a, b);
                if *interval == 0 || lo < *start || hi > *end || hi.0 - lo.0 != 1 {
                    return false;
                }
                (lo.0 - start.0) / interval == (hi.0 - start.0) / interval
            }
        }
    }
}
