use super::globals::Global;
use super::interactions::Interaction;
use super::locals::Local;
use super::neighbourhood::Neighbourhood;
use super::systems::System;
use crate::core::models::ids::ParticleId;

/// Every event source of a simulation. The `id` carried by an event source indexes the
/// matching vector here.
#[derive(Debug, Default)]
pub struct Components {
    pub interactions: Vec<Box<dyn Interaction>>,
    pub globals: Vec<Box<dyn Global>>,
    pub locals: Vec<Box<dyn Local>>,
    pub systems: Vec<Box<dyn System>>,
}

impl Components {
    /// Index of the first interaction whose range contains the pair.
    pub fn interaction_for(&self, p1: ParticleId, p2: ParticleId) -> Option<usize> {
        self.interactions
            .iter()
            .position(|interaction| interaction.range().contains(p1, p2))
    }

    /// The neighbour list maintained by a global, if any.
    pub fn neighbourhood(&self) -> Option<&dyn Neighbourhood> {
        self.globals.iter().find_map(|global| global.neighbourhood())
    }

    /// Longest interaction distance before compression growth.
    pub fn base_longest_interaction(&self) -> f64 {
        self.interactions
            .iter()
            .map(|interaction| interaction.max_int_dist())
            .fold(0.0, f64::max)
    }
}
