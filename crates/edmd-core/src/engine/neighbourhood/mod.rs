//! # Neighbourhood Query Layer
//!
//! Answers "who could interact with this particle" without saying anything about when. The
//! scheduler only ever computes pair events for the candidates enumerated here, which keeps a
//! full update proportional to the local density instead of the system size.
//!
//! - [`grid::CellGrid`] - cell-list enumeration over the same and neighbouring cells
//! - [`AllPairs`] - brute-force enumeration, used when no cell list is configured

pub mod grid;

use crate::core::models::ids::ParticleId;
use grid::CellGrid;

pub trait Neighbourhood {
    /// Calls `visit` once for every candidate partner of `particle`, never for `particle`
    /// itself.
    fn particle_neighbourhood(&self, particle: ParticleId, visit: &mut dyn FnMut(ParticleId));

    /// Calls `visit` once for every local that may interact with `particle`.
    fn particle_local_neighbourhood(&self, particle: ParticleId, visit: &mut dyn FnMut(usize));
}

impl Neighbourhood for CellGrid {
    fn particle_neighbourhood(&self, particle: ParticleId, visit: &mut dyn FnMut(ParticleId)) {
        self.particle_neighbours(particle).for_each(visit);
    }

    fn particle_local_neighbourhood(&self, particle: ParticleId, visit: &mut dyn FnMut(usize)) {
        self.local_neighbourhood(particle).iter().copied().for_each(visit);
    }
}

/// Every particle is a candidate for every other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllPairs {
    pub particles: usize,
    pub locals: usize,
}

impl Neighbourhood for AllPairs {
    fn particle_neighbourhood(&self, particle: ParticleId, visit: &mut dyn FnMut(ParticleId)) {
        (0..self.particles)
            .map(ParticleId)
            .filter(|&other| other != particle)
            .for_each(visit);
    }

    fn particle_local_neighbourhood(&self, _particle: ParticleId, visit: &mut dyn FnMut(usize)) {
        (0..self.locals).for_each(visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn all_pairs_visits_everyone_else_once() {
        let all = AllPairs {
            particles: 4,
            locals: 2,
        };
        let mut seen = Vec::new();
        all.particle_neighbourhood(ParticleId(2), &mut |p| seen.push(p));
        assert_eq!(seen, vec![ParticleId(0), ParticleId(1), ParticleId(3)]);
        let mut locals = Vec::new();
        all.particle_local_neighbourhood(ParticleId(2), &mut |l| locals.push(l));
        assert_eq!(locals, vec![0, 1]);
    }

    #[test]
    fn grid_visitor_agrees_with_iterator() {
        let positions = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.5, 0.0, 0.0),
            Vector3::new(-4.0, 0.0, 0.0),
        ];
        let mut grid = CellGrid::new(Vector3::new(10.0, 10.0, 10.0), 1.0, false, true, 3).unwrap();
        grid.place_all(positions.iter());
        let neighbourhood: &dyn Neighbourhood = &grid;
        let mut seen = Vec::new();
        neighbourhood.particle_neighbourhood(ParticleId(0), &mut |p| seen.push(p));
        assert_eq!(seen, vec![ParticleId(1)]);
    }
}
