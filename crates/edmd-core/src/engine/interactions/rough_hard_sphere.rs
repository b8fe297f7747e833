use super::{
    Interaction, contact_normal, participants, require_inertia, require_orientation,
    sphere_volume,
};
use crate::core::io::document::{InteractionConfig, RoughHardSphereConfig};
use crate::core::models::ids::ParticleId;
use crate::core::models::range::PairRange;
use crate::core::models::units::Units;
use crate::core::physics::impulses::{Inertia, rough_collision};
use crate::engine::context::InteractionContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;

/// Hard spheres whose surfaces grip on contact, trading translational and spin momentum.
/// `tangential_elasticity` runs from -1 (smooth) to 1 (perfectly rough).
#[derive(Debug, Clone)]
pub struct RoughHardSphere {
    name: String,
    diameter: f64,
    elasticity: f64,
    tangential_elasticity: f64,
    range: PairRange,
    id: usize,
}

impl RoughHardSphere {
    pub fn new(
        name: impl Into<String>,
        diameter: f64,
        elasticity: f64,
        tangential_elasticity: f64,
        range: PairRange,
    ) -> Self {
        Self {
            name: name.into(),
            diameter,
            elasticity,
            tangential_elasticity,
            range,
            id: 0,
        }
    }

    pub fn from_config(config: &RoughHardSphereConfig, units: &Units) -> Self {
        Self::new(
            config.name.clone(),
            config.diameter * units.length,
            config.elasticity,
            config.tangential_elasticity,
            config.range.clone(),
        )
    }
}

impl Interaction for RoughHardSphere {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn initialise(&mut self, ctx: &InteractionContext<'_>) -> Result<(), EngineError> {
        self.id = ctx.id;
        require_orientation(&self.name, ctx)?;
        require_inertia(&self.name, ctx)
    }

    fn max_int_dist(&self) -> f64 {
        self.diameter
    }

    fn excluded_volume(&self) -> f64 {
        sphere_volume(self.diameter)
    }

    fn get_event(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> Event {
        let source = EventSource::Interaction { id: self.id, p1, p2 };
        let pair = state.pair(p1, p2);
        match state
            .dynamics
            .sphere_in_root(&pair.rij, &pair.vij, self.diameter, state.system_time)
        {
            Some(dt) => Event::new(source, EventType::Core, dt),
            None => Event::none(source),
        }
    }

    fn run_event(&mut self, event: &Event, state: &mut SimState) -> Result<EventData, EngineError> {
        let (p1, p2) = participants(event)?;
        let pair = state.pair(p1, p2);
        let n = contact_normal(&pair.rij, p1, p2)?;
        let radius = 0.5 * self.diameter;
        let spin_sum = state.particle(p1).angular_velocity() + state.particle(p2).angular_velocity();
        let g = pair.vij - spin_sum.cross(&n) * radius;

        let inertia = Inertia {
            inv_mass1: state.inverse_mass(p1),
            inv_mass2: state.inverse_mass(p2),
            inv_inertia1: state.inverse_inertia(p1),
            inv_inertia2: state.inverse_inertia(p2),
        };
        let update = rough_collision(
            &n,
            &g,
            &inertia,
            radius,
            self.elasticity,
            self.tangential_elasticity,
        );

        let d1 = state.apply_kick(p1, update.dv1, update.dw1);
        let d2 = state.apply_kick(p2, update.dv2, update.dw2);
        Ok(EventData::new(EventType::Core)
            .with_deltas([d1, d2])
            .with_reschedule([p1, p2]))
    }

    fn overlaps(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> bool {
        state
            .dynamics
            .sphere_overlap(&state.pair(p1, p2).rij, self.diameter, state.system_time)
    }

    fn rescale_lengths(&mut self, factor: f64) {
        self.diameter *= factor;
    }

    fn to_config(&self, units: &Units) -> InteractionConfig {
        InteractionConfig::RoughHardSphere(RoughHardSphereConfig {
            name: self.name.clone(),
            diameter: self.diameter / units.length,
            elasticity: self.elasticity,
            tangential_elasticity: self.tangential_elasticity,
            range: self.range.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::core::models::particle::{Orientation, Particle};
    use crate::engine::config::ConfigError;
    use nalgebra::Vector3;

    fn spinning_pair() -> SimState {
        fixtures::state(vec![
            Particle::new(
                ParticleId(0),
                Vector3::new(-0.75, 0.0, 0.0),
                Vector3::new(1.0, 0.3, 0.0),
            )
            .with_orientation(Orientation::new(Vector3::z(), Vector3::new(0.0, 0.0, 2.0))),
            Particle::new(
                ParticleId(1),
                Vector3::new(0.75, 0.1, 0.0),
                Vector3::new(-1.0, 0.0, 0.2),
            )
            .with_orientation(Orientation::new(Vector3::x(), Vector3::new(1.0, -1.0, 0.0))),
        ])
    }

    fn ctx(state: &SimState) -> InteractionContext<'_> {
        InteractionContext {
            id: 0,
            state,
            governs: &fixtures::governs_all,
        }
    }

    #[test]
    fn perfectly_rough_elastic_collision_conserves_total_energy() {
        let mut state = spinning_pair();
        let mut rough = RoughHardSphere::new("Rough", 1.0, 1.0, 1.0, PairRange::All);
        rough.initialise(&ctx(&state)).unwrap();

        let event = rough.get_event(ParticleId(0), ParticleId(1), &state);
        assert_eq!(event.event_type, EventType::Core);
        state.advance(event.dt);
        state.update_all_particles();
        let before = state.total_kinetic_energy();
        let spin_before = state.particle(ParticleId(0)).angular_velocity();

        let data = rough.run_event(&event, &mut state).unwrap();
        assert!((state.total_kinetic_energy() - before).abs() < 1e-9);
        assert_ne!(state.particle(ParticleId(0)).angular_velocity(), spin_before);
        assert_eq!(data.deltas.len(), 2);
    }

    #[test]
    fn missing_orientation_is_rejected() {
        let state = fixtures::head_on(2.0, 1.0);
        let mut rough = RoughHardSphere::new("Rough", 1.0, 1.0, 1.0, PairRange::All);
        let err = rough.initialise(&ctx(&state)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::MissingOrientation { .. })
        ));
    }
}
