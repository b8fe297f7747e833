use super::config::ConfigError;
use super::dynamics::Dynamics;
use super::ensemble::Ensemble;
use super::event::ParticleDelta;
use crate::core::models::boundary::{BoundaryCondition, minimum_image};
use crate::core::models::ids::ParticleId;
use crate::core::models::particle::Particle;
use crate::core::models::species::Species;
use crate::core::models::units::Units;
use nalgebra::Vector3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Relative kinematics of a pair, with the separation mapped onto its minimum image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairKinematics {
    pub rij: Vector3<f64>,
    pub vij: Vector3<f64>,
}

/// The mutable physical state every event source reads and writes.
///
/// Two clocks are kept. `system_time` is physical time and may be exchanged between replicas.
/// The private stream clock only ever advances; particle `last_update` stamps and scheduler
/// keys are measured against it, so swapping physical time never disturbs lazy streaming.
#[derive(Debug, Clone)]
pub struct SimState {
    pub particles: Vec<Particle>,
    pub species: Vec<Species>,
    species_of: Vec<usize>,
    pub dynamics: Dynamics,
    pub boundary: BoundaryCondition,
    pub primary_cell: Vector3<f64>,
    pub units: Units,
    pub system_time: f64,
    clock: f64,
    pub event_count: u64,
    pub end_event_count: u64,
    pub ensemble: Ensemble,
    pub rng: ChaCha8Rng,
}

impl SimState {
    pub fn new(
        particles: Vec<Particle>,
        species: Vec<Species>,
        primary_cell: Vector3<f64>,
        boundary: BoundaryCondition,
        dynamics: Dynamics,
        seed: u64,
    ) -> Self {
        Self {
            particles,
            species,
            species_of: Vec::new(),
            dynamics,
            boundary,
            primary_cell,
            units: Units::default(),
            system_time: 0.0,
            clock: 0.0,
            event_count: 0,
            end_event_count: 0,
            ensemble: Ensemble::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn volume(&self) -> f64 {
        self.primary_cell.product()
    }

    #[inline]
    pub fn particle(&self, id: ParticleId) -> &Particle {
        &self.particles[id.index()]
    }

    #[inline]
    pub fn particle_mut(&mut self, id: ParticleId) -> &mut Particle {
        &mut self.particles[id.index()]
    }

    pub fn particle_ids(&self) -> impl Iterator<Item = ParticleId> + use<> {
        (0..self.particles.len()).map(ParticleId)
    }

    /// Binds every particle to its species, checking each belongs to exactly one and that the
    /// species account for every particle.
    pub fn assign_species(&mut self) -> Result<(), ConfigError> {
        let n = self.particles.len();
        let mut species_of = Vec::with_capacity(n);
        for id in (0..n).map(ParticleId) {
            let mut matches = self
                .species
                .iter()
                .enumerate()
                .filter(|(_, s)| s.range.contains(id))
                .map(|(index, _)| index);
            let first = matches.next();
            let extra = matches.count();
            match first {
                Some(index) if extra == 0 => species_of.push(index),
                _ => {
                    return Err(ConfigError::ParticleSpecies {
                        id,
                        count: first.map_or(0, |_| 1 + extra),
                    });
                }
            }
        }

        let found: usize = self.species.iter().map(|s| s.range.count(n)).sum();
        if found != n {
            return Err(ConfigError::SpeciesCount { expected: n, found });
        }
        self.species_of = species_of;
        Ok(())
    }

    #[inline]
    pub fn species_index(&self, id: ParticleId) -> usize {
        self.species_of[id.index()]
    }

    #[inline]
    pub fn species_of(&self, id: ParticleId) -> &Species {
        &self.species[self.species_of[id.index()]]
    }

    #[inline]
    pub fn inverse_mass(&self, id: ParticleId) -> f64 {
        self.species_of(id).inverse_mass()
    }

    pub fn inverse_inertia(&self, id: ParticleId) -> f64 {
        match self.species_of(id).moment_of_inertia() {
            Some(i) if i > 0.0 && i.is_finite() => 1.0 / i,
            _ => 0.0,
        }
    }

    /// Advances both clocks. Particles are not touched; they catch up lazily.
    pub fn advance(&mut self, dt: f64) {
        self.system_time += dt;
        self.clock += dt;
    }

    /// Streams one particle to the current clock.
    pub fn update_particle(&mut self, id: ParticleId) {
        let clock = self.clock;
        let particle = &mut self.particles[id.index()];
        let dt = clock - particle.last_update;
        if dt != 0.0 {
            self.dynamics.stream_particle(particle, dt);
            particle.last_update = clock;
        }
    }

    pub fn update_all_particles(&mut self) {
        for index in 0..self.particles.len() {
            self.update_particle(ParticleId(index));
        }
    }

    /// Separation and relative velocity of `p1` with respect to `p2`. Both particles must be
    /// up to date.
    pub fn pair(&self, p1: ParticleId, p2: ParticleId) -> PairKinematics {
        let a = self.particle(p1);
        let b = self.particle(p2);
        let mut rij = a.position - b.position;
        self.boundary.apply(&mut rij, &self.primary_cell);
        PairKinematics {
            rij,
            vij: a.velocity - b.velocity,
        }
    }

    /// Folds a position into the primary box regardless of the boundary condition.
    pub fn folded_position(&self, position: &Vector3<f64>) -> Vector3<f64> {
        minimum_image(position, &self.primary_cell)
    }

    /// Applies a velocity and spin change, reporting what changed.
    pub fn apply_kick(
        &mut self,
        id: ParticleId,
        dv: Vector3<f64>,
        dw: Vector3<f64>,
    ) -> ParticleDelta {
        let species = self.species_index(id);
        let mass = self.species[species].mass;
        let inertia = self.species[species].moment_of_inertia().unwrap_or(0.0);
        let ke_before = self.kinetic_energy(id);

        let particle = &mut self.particles[id.index()];
        let old_velocity = particle.velocity;
        let old_angular_velocity = particle.angular_velocity();
        if mass.is_finite() {
            particle.velocity += dv;
        }
        if let Some(orientation) = particle.orientation.as_mut() {
            if inertia.is_finite() {
                orientation.angular_velocity += dw;
            }
        }
        let new_velocity = particle.velocity;
        let new_angular_velocity = particle.angular_velocity();

        ParticleDelta {
            id,
            species,
            old_velocity,
            new_velocity,
            old_angular_velocity,
            new_angular_velocity,
            delta_ke: self.kinetic_energy(id) - ke_before,
        }
    }

    /// Replaces a particle's velocity outright (thermostat resampling).
    pub fn set_velocity(&mut self, id: ParticleId, velocity: Vector3<f64>) -> ParticleDelta {
        let dv = velocity - self.particle(id).velocity;
        self.apply_kick(id, dv, Vector3::zeros())
    }

    /// Translational plus rotational kinetic energy; zero for immovable particles.
    pub fn kinetic_energy(&self, id: ParticleId) -> f64 {
        let species = self.species_of(id);
        if !species.mass.is_finite() {
            return 0.0;
        }
        let particle = self.particle(id);
        let translational = 0.5 * species.mass * particle.velocity.norm_squared();
        let rotational = match species.moment_of_inertia() {
            Some(i) if i.is_finite() => 0.5 * i * particle.angular_velocity().norm_squared(),
            _ => 0.0,
        };
        translational + rotational
    }

    pub fn total_kinetic_energy(&self) -> f64 {
        self.particle_ids().map(|id| self.kinetic_energy(id)).sum()
    }

    /// `kT` from the translational kinetic energy of the movable particles.
    pub fn kinetic_temperature(&self) -> f64 {
        let mut twice_ke = 0.0;
        let mut movable = 0usize;
        for id in self.particle_ids() {
            let species = self.species_of(id);
            if species.mass.is_finite() {
                twice_ke += species.mass * self.particle(id).velocity.norm_squared();
                movable += 1;
            }
        }
        if movable == 0 {
            0.0
        } else {
            twice_ke / (3.0 * movable as f64)
        }
    }
}
