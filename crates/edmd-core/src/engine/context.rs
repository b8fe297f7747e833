use super::globals::Global;
use super::locals::Local;
use super::state::SimState;
use crate::core::models::ids::ParticleId;

/// What an interaction may look at while initialising.
pub struct InteractionContext<'a> {
    pub id: usize,
    pub state: &'a SimState,
    /// Whether this interaction is the one governing a pair. Earlier interactions shadow
    /// later ones whose ranges overlap.
    pub governs: &'a dyn Fn(ParticleId, ParticleId) -> bool,
}

/// What a global may look at while initialising or rebuilding.
pub struct GlobalContext<'a> {
    pub state: &'a SimState,
    pub locals: &'a [Box<dyn Local>],
    /// Longest interaction distance at the current system time.
    pub longest_interaction: f64,
}

/// What a system may use while initialising. Systems may draw random numbers, so the state
/// is lent mutably.
pub struct SystemContext<'a> {
    pub state: &'a mut SimState,
    pub globals: &'a [Box<dyn Global>],
    /// Longest interaction distance before any compression growth.
    pub base_longest_interaction: f64,
}
