use super::{Interaction, contact_normal, participants, sphere_volume};
use crate::core::io::document::{HardSphereConfig, InteractionConfig};
use crate::core::models::ids::ParticleId;
use crate::core::models::range::PairRange;
use crate::core::models::units::Units;
use crate::core::physics::impulses::{Inertia, smooth_collision};
use crate::engine::context::InteractionContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use nalgebra::Vector3;

/// Smooth impenetrable spheres.
#[derive(Debug, Clone)]
pub struct HardSphere {
    name: String,
    diameter: f64,
    elasticity: f64,
    range: PairRange,
    id: usize,
}

impl HardSphere {
    pub fn new(name: impl Into<String>, diameter: f64, elasticity: f64, range: PairRange) -> Self {
        Self {
            name: name.into(),
            diameter,
            elasticity,
            range,
            id: 0,
        }
    }

    pub fn from_config(config: &HardSphereConfig, units: &Units) -> Self {
        Self::new(
            config.name.clone(),
            config.diameter * units.length,
            config.elasticity,
            config.range.clone(),
        )
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }
}

impl Interaction for HardSphere {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn initialise(&mut self, ctx: &InteractionContext<'_>) -> Result<(), EngineError> {
        self.id = ctx.id;
        Ok(())
    }

    fn max_int_dist(&self) -> f64 {
        self.diameter
    }

    fn excluded_volume(&self) -> f64 {
        sphere_volume(self.diameter)
    }

    fn supports_compression(&self) -> bool {
        true
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
        let inertia = Inertia::translational(state.inverse_mass(p1), state.inverse_mass(p2));
        let update = smooth_collision(
            &n,
            &pair.vij,
            &inertia,
            self.elasticity,
            state.dynamics.surface_speed(self.diameter),
        );

        let d1 = state.apply_kick(p1, update.dv1, Vector3::zeros());
        let d2 = state.apply_kick(p2, update.dv2, Vector3::zeros());
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
        InteractionConfig::HardSphere(HardSphereConfig {
            name: self.name.clone(),
            diameter: self.diameter / units.length,
            elasticity: self.elasticity,
            range: self.range.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::engine::dynamics::Dynamics;

    const TOLERANCE: f64 = 1e-9;

    fn setup() -> HardSphere {
        let mut hs = HardSphere::new("Bulk", 1.0, 1.0, PairRange::All);
        let state = fixtures::head_on(2.1, 2.0);
        hs.initialise(&InteractionContext {
            id: 3,
            state: &state,
            governs: &fixtures::governs_all,
        })
        .unwrap();
        hs
    }

    #[test]
    fn head_on_collision_time_matches_analytic_value() {
        let hs = setup();
        let state = fixtures::head_on(2.1, 2.0);
        let event = hs.get_event(ParticleId(0), ParticleId(1), &state);
        assert_eq!(event.event_type, EventType::Core);
        let expected = (2.1 - 1.0) / 2.0;
        assert!((event.dt - expected).abs() <= TOLERANCE * expected);
        assert_eq!(event.source.source_id(), 3);
    }

    #[test]
    fn receding_pair_predicts_nothing() {
        let hs = setup();
        let state = fixtures::head_on(2.1, -2.0);
        assert!(hs.get_event(ParticleId(0), ParticleId(1), &state).is_none());
    }

    #[test]
    fn elastic_collision_exchanges_velocities() {
        let mut hs = setup();
        let mut state = fixtures::head_on(2.1, 2.0);
        let event = hs.get_event(ParticleId(0), ParticleId(1), &state);
        state.advance(event.dt);
        state.update_all_particles();
        let ke = state.total_kinetic_energy();

        let data = hs.run_event(&event, &mut state).unwrap();
        assert_eq!(data.event_type, EventType::Core);
        assert_eq!(data.reschedule, vec![ParticleId(0), ParticleId(1)]);
        assert!((state.particle(ParticleId(0)).velocity.x + 1.0).abs() < TOLERANCE);
        assert!((state.particle(ParticleId(1)).velocity.x - 1.0).abs() < TOLERANCE);
        assert!((state.total_kinetic_energy() - ke).abs() < TOLERANCE);
        assert!(data.delta_ke().abs() < TOLERANCE);
    }

    #[test]
    fn compression_brings_contact_forward() {
        let hs = setup();
        let mut state = fixtures::head_on(2.1, 2.0);
        state.dynamics = Dynamics::Compression { growth_rate: 0.5 };
        let event = hs.get_event(ParticleId(0), ParticleId(1), &state);
        // 2.1 - 2t = 1 + 0.5t
        assert!((event.dt - 1.1 / 2.5).abs() < TOLERANCE);
    }

    #[test]
    fn overlap_and_rescale() {
        let mut hs = setup();
        let state = fixtures::head_on(0.9, 0.0);
        assert!(hs.overlaps(ParticleId(0), ParticleId(1), &state));
        hs.rescale_lengths(0.5);
        assert!(!hs.overlaps(ParticleId(0), ParticleId(1), &state));
        let units = Units {
            length: 0.25,
            ..Units::default()
        };
        match hs.to_config(&units) {
            InteractionConfig::HardSphere(c) => assert_eq!(c.diameter, 2.0),
            other => panic!("unexpected config {other:?}"),
        }
    }
}
