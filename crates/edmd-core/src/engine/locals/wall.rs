use super::Local;
use crate::core::io::document::{LocalConfig, WallConfig};
use crate::core::models::ids::ParticleId;
use crate::core::models::range::ParticleRange;
use crate::core::models::units::Units;
use crate::core::physics::roots::plane_crossing_time;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use nalgebra::{Unit, Vector3};

/// An infinite plane through `origin` facing along `normal`. Particles of the given
/// `diameter` bounce off it with restitution `elasticity`.
#[derive(Debug, Clone)]
pub struct Wall {
    name: String,
    origin: Vector3<f64>,
    normal: Unit<Vector3<f64>>,
    elasticity: f64,
    diameter: f64,
    range: ParticleRange,
    id: usize,
}

impl Wall {
    pub fn new(
        name: impl Into<String>,
        origin: Vector3<f64>,
        normal: Vector3<f64>,
        elasticity: f64,
        diameter: f64,
        range: ParticleRange,
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            normal: Unit::new_normalize(normal),
            elasticity,
            diameter,
            range,
            id: 0,
        }
    }

    pub fn from_config(config: &WallConfig, units: &Units) -> Self {
        Self::new(
            config.name.clone(),
            Vector3::from(config.origin) * units.length,
            Vector3::from(config.normal),
            config.elasticity,
            config.diameter * units.length,
            config.range.clone(),
        )
    }

    /// Signed distance of a particle's contact surface from the plane.
    fn clearance(&self, position: &Vector3<f64>) -> f64 {
        (position - self.origin).dot(&self.normal) - 0.5 * self.diameter
    }
}

impl Local for Wall {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, id: usize, _state: &SimState) -> Result<(), EngineError> {
        self.id = id;
        Ok(())
    }

    fn applies_to(&self, particle: ParticleId) -> bool {
        self.range.contains(particle)
    }

    fn touches_cell(&self, origin: &Vector3<f64>, width: &Vector3<f64>) -> bool {
        // The contact plane touches the cell when its corners lie on both sides of it.
        let mut below = false;
        let mut above = false;
        for corner in 0..8 {
            let offset = Vector3::from_fn(|i, _| {
                if corner & (1 << i) != 0 { width[i] } else { 0.0 }
            });
            let side = self.clearance(&(origin + offset));
            below |= side <= 0.0;
            above |= side >= 0.0;
        }
        below && above
    }

    fn get_event(&self, particle: ParticleId, state: &SimState) -> Event {
        let source = EventSource::Local {
            id: self.id,
            particle,
        };
        let p = state.particle(particle);
        let accel = state.dynamics.acceleration(p).dot(&self.normal);
        let dt = plane_crossing_time(
            self.clearance(&p.position),
            p.velocity.dot(&self.normal),
            accel,
        );
        if dt.is_finite() {
            Event::new(source, EventType::Wall, dt)
        } else {
            Event::none(source)
        }
    }

    fn run_event(&mut self, event: &Event, state: &mut SimState) -> Result<EventData, EngineError> {
        let EventSource::Local { particle, .. } = event.source else {
            return Err(EngineError::Consistency(format!(
                "wall {} received an event from {:?}",
                self.name, event.source
            )));
        };

        let vn = state.particle(particle).velocity.dot(&self.normal);
        if vn >= 0.0 {
            // Drifted past while already leaving: nothing to reflect.
            return Ok(EventData::new(EventType::Virtual).with_reschedule([particle]));
        }
        let dv = self.normal.into_inner() * (-(1.0 + self.elasticity) * vn);
        let delta = state.apply_kick(particle, dv, Vector3::zeros());
        Ok(EventData::new(EventType::Wall)
            .with_deltas([delta])
            .with_reschedule([particle]))
    }

    fn overlaps(&self, particle: ParticleId, state: &SimState) -> bool {
        self.applies_to(particle) && self.clearance(&state.particle(particle).position) < 0.0
    }

    fn rescale_lengths(&mut self, factor: f64) {
        self.diameter *= factor;
    }

    fn to_config(&self, units: &Units) -> LocalConfig {
        let origin = self.origin / units.length;
        LocalConfig::Wall(WallConfig {
            name: self.name.clone(),
            origin: [origin.x, origin.y, origin.z],
            normal: [self.normal.x, self.normal.y, self.normal.z],
            elasticity: self.elasticity,
            diameter: self.diameter / units.length,
            range: self.range.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::Particle;
    use crate::engine::dynamics::Dynamics;
    use crate::engine::interactions::fixtures;

    fn floor() -> Wall {
        let mut wall = Wall::new(
            "Floor",
            Vector3::new(0.0, 0.0, -5.0),
            Vector3::z(),
            1.0,
            1.0,
            ParticleRange::All,
        );
        wall.id = 2;
        wall
    }

    fn falling(vz: f64) -> SimState {
        fixtures::state(vec![Particle::new(
            ParticleId(0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.3, 0.0, vz),
        )])
    }

    #[test]
    fn reflection_reverses_the_normal_velocity() {
        let mut wall = floor();
        let mut state = falling(-1.5);
        let event = wall.get_event(ParticleId(0), &state);
        assert_eq!(event.event_type, EventType::Wall);
        assert!((event.dt - 3.0).abs() < 1e-12);

        state.advance(event.dt);
        state.update_all_particles();
        let data = wall.run_event(&event, &mut state).unwrap();
        assert_eq!(data.event_type, EventType::Wall);
        let v = state.particle(ParticleId(0)).velocity;
        assert!((v.z - 1.5).abs() < 1e-12);
        assert_eq!(v.x, 0.3);
    }

    #[test]
    fn receding_particle_never_hits() {
        let wall = floor();
        assert!(wall.get_event(ParticleId(0), &falling(1.0)).is_none());
    }

    #[test]
    fn gravity_brings_a_rising_particle_back() {
        let wall = floor();
        let mut state = falling(1.0);
        state.dynamics = Dynamics::Gravity {
            g: Vector3::new(0.0, 0.0, -2.0),
        };
        // 4.5 + t - t^2 = 0
        let expected = (1.0 + (1.0f64 + 18.0).sqrt()) / 2.0;
        let event = wall.get_event(ParticleId(0), &state);
        assert!((event.dt - expected).abs() < 1e-9);
    }

    #[test]
    fn drifted_past_and_leaving_is_not_reflected() {
        let mut wall = floor();
        let mut state = falling(0.5);
        state.particle_mut(ParticleId(0)).position.z = -4.6;
        let event = Event::new(
            EventSource::Local {
                id: 2,
                particle: ParticleId(0),
            },
            EventType::Wall,
            0.0,
        );
        let data = wall.run_event(&event, &mut state).unwrap();
        assert_eq!(data.event_type, EventType::Virtual);
        assert_eq!(state.particle(ParticleId(0)).velocity.z, 0.5);
        assert!(wall.overlaps(ParticleId(0), &state));
    }

    #[test]
    fn only_cells_straddling_the_contact_plane_are_touched() {
        let wall = floor();
        let width = Vector3::new(1.0, 1.0, 1.0);
        assert!(wall.touches_cell(&Vector3::new(3.0, 3.0, -5.0), &width));
        assert!(!wall.touches_cell(&Vector3::new(0.0, 0.0, 0.0), &width));
        assert!(!wall.touches_cell(&Vector3::new(0.0, 0.0, -7.0), &width));
    }
}
