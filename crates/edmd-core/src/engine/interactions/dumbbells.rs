use super::{
    Interaction, governed_pairs, participants, require_inertia, require_orientation,
    sphere_volume,
};
use crate::core::io::document::{DumbbellsConfig, InteractionConfig};
use crate::core::models::ids::ParticleId;
use crate::core::models::range::PairRange;
use crate::core::models::units::Units;
use crate::core::physics::impulses::{Inertia, offcentre_collision};
use crate::core::physics::roots::travel_time;
use crate::engine::capture::CaptureMap;
use crate::engine::context::InteractionContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use nalgebra::{Unit, Vector3};
use tracing::{debug, warn};

const MAX_ADVANCEMENT_STEPS: usize = 10_000;

/// Relative gap below which two spheres count as touching.
const CONTACT_TOLERANCE: f64 = 1e-10;

/// Rigid dumbbells: two spheres of `radius` whose centres sit `length / 2` either side of the
/// particle position along its orientation axis.
///
/// Pairs closer than the bounding sphere (`length + 2 radius`) are captured. Sphere contacts
/// are only searched for between captured pairs, by conservative advancement up to the time
/// the pair leaves its bounding sphere.
#[derive(Debug, Clone)]
pub struct Dumbbells {
    name: String,
    length: f64,
    radius: f64,
    elasticity: f64,
    range: PairRange,
    id: usize,
    captures: CaptureMap,
    loaded_captures: Option<Vec<[ParticleId; 2]>>,
}

/// Relative motion of two dumbbells, extrapolated free-flight from the moment it was taken.
struct PairMotion {
    rij: Vector3<f64>,
    vij: Vector3<f64>,
    aij: Vector3<f64>,
    axis1: crate::core::models::particle::Orientation,
    axis2: crate::core::models::particle::Orientation,
}

/// Closest sphere pair of two dumbbells at some instant.
struct Contact {
    gap: f64,
    normal: Vector3<f64>,
    arm1: Vector3<f64>,
    arm2: Vector3<f64>,
}

impl PairMotion {
    fn closest(&self, t: f64, half_length: f64, radius: f64) -> Contact {
        let rij = self.rij + self.vij * t + self.aij * (0.5 * t * t);
        let u1 = self.axis1.axis_after(t).into_inner() * half_length;
        let u2 = self.axis2.axis_after(t).into_inner() * half_length;

        let mut best: Option<Contact> = None;
        for arm1 in [u1, -u1] {
            for arm2 in [u2, -u2] {
                let sep = rij + arm1 - arm2;
                let gap = sep.norm() - 2.0 * radius;
                if best.as_ref().is_none_or(|b| gap < b.gap) {
                    best = Some(Contact {
                        gap,
                        normal: sep,
                        arm1,
                        arm2,
                    });
                }
            }
        }
        let mut contact = best.unwrap_or(Contact {
            gap: f64::INFINITY,
            normal: Vector3::x(),
            arm1: Vector3::zeros(),
            arm2: Vector3::zeros(),
        });
        contact.normal = contact.normal.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::x);
        contact
    }

    /// Shortest time in which any sphere-sphere gap could shrink by `gap`, starting at `t`.
    fn safe_step(&self, t: f64, gap: f64, half_length: f64) -> f64 {
        let spin = half_length
            * (self.axis1.angular_velocity.norm() + self.axis2.angular_velocity.norm());
        let speed = (self.vij + self.aij * t).norm() + spin;
        travel_time(gap, speed, self.aij.norm())
    }

    /// Normal velocity of the contact points, negative when approaching.
    fn approach_speed(&self, t: f64, contact: &Contact, radius: f64) -> f64 {
        let vij = self.vij + self.aij * t;
        let lever1 = contact.arm1 - contact.normal * radius;
        let lever2 = contact.arm2 + contact.normal * radius;
        let g = vij + self.axis1.angular_velocity.cross(&lever1)
            - self.axis2.angular_velocity.cross(&lever2);
        g.dot(&contact.normal)
    }
}

enum Advancement {
    Contact(f64),
    Clear,
    GaveUp(f64),
}

impl Dumbbells {
    pub fn new(
        name: impl Into<String>,
        length: f64,
        radius: f64,
        elasticity: f64,
        range: PairRange,
    ) -> Self {
        Self {
            name: name.into(),
            length,
            radius,
            elasticity,
            range,
            id: 0,
            captures: CaptureMap::new(),
            loaded_captures: None,
        }
    }

    pub fn from_config(config: &DumbbellsConfig, units: &Units) -> Self {
        let mut dumbbells = Self::new(
            config.name.clone(),
            config.length * units.length,
            config.radius * units.length,
            config.elasticity,
            config.range.clone(),
        );
        dumbbells.loaded_captures = config.captured.clone();
        dumbbells
    }

    pub fn captures(&self) -> &CaptureMap {
        &self.captures
    }

    #[inline]
    fn bounding_diameter(&self) -> f64 {
        self.length + 2.0 * self.radius
    }

    fn motion(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> Option<PairMotion> {
        let a = state.particle(p1);
        let b = state.particle(p2);
        let pair = state.pair(p1, p2);
        Some(PairMotion {
            rij: pair.rij,
            vij: pair.vij,
            aij: state.dynamics.acceleration(a) - state.dynamics.acceleration(b),
            axis1: a.orientation.clone()?,
            axis2: b.orientation.clone()?,
        })
    }

    /// Steps forward by the largest interval in which no gap can close, stopping at the first
    /// approaching contact before `horizon`.
    fn advance_to_contact(&self, motion: &PairMotion, horizon: f64) -> Advancement {
        let half = 0.5 * self.length;
        let tolerance = CONTACT_TOLERANCE * self.bounding_diameter();

        let mut t = 0.0;
        for _ in 0..MAX_ADVANCEMENT_STEPS {
            if t >= horizon {
                return Advancement::Clear;
            }
            let contact = motion.closest(t, half, self.radius);
            if contact.gap <= tolerance {
                if motion.approach_speed(t, &contact, self.radius) < 0.0 {
                    return Advancement::Contact(t);
                }
                // Touching but separating: step past the contact.
                t += motion.safe_step(t, 2.0 * tolerance, half);
                continue;
            }
            t += motion.safe_step(t, contact.gap, half);
        }
        Advancement::GaveUp(t)
    }
}

impl Interaction for Dumbbells {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn initialise(&mut self, ctx: &InteractionContext<'_>) -> Result<(), EngineError> {
        self.id = ctx.id;
        require_orientation(&self.name, ctx)?;
        require_inertia(&self.name, ctx)?;
        match self.loaded_captures.take() {
            Some(pairs) => self.captures = CaptureMap::from_pairs(pairs),
            None => {
                let bounding = self.bounding_diameter();
                let mut captures = CaptureMap::new();
                captures.rebuild(governed_pairs(ctx), |a, b| {
                    ctx.state.pair(a, b).rij.norm_squared() < bounding * bounding
                });
                self.captures = captures;
            }
        }
        debug!(
            interaction = %self.name,
            captured = self.captures.len(),
            "Dumbbell bounding-sphere map ready."
        );
        Ok(())
    }

    fn max_int_dist(&self) -> f64 {
        self.bounding_diameter()
    }

    fn excluded_volume(&self) -> f64 {
        let d = 2.0 * self.radius;
        let lens = if self.length < d {
            std::f64::consts::PI * (2.0 * d + self.length) * (d - self.length).powi(2) / 12.0
        } else {
            0.0
        };
        2.0 * sphere_volume(d) - lens
    }

    fn get_event(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> Event {
        let source = EventSource::Interaction { id: self.id, p1, p2 };
        let pair = state.pair(p1, p2);
        let bounding = self.bounding_diameter();
        let t = state.system_time;

        if !self.captures.is_captured(p1, p2) {
            return match state.dynamics.sphere_in_root(&pair.rij, &pair.vij, bounding, t) {
                Some(dt) => Event::new(source, EventType::WellIn, dt),
                None => Event::none(source),
            };
        }

        let Some(motion) = self.motion(p1, p2, state) else {
            return Event::none(source);
        };
        let exit = state.dynamics.sphere_out_root(&pair.rij, &pair.vij, bounding, t);
        match self.advance_to_contact(&motion, exit) {
            Advancement::Contact(dt) => Event::new(source, EventType::Core, dt),
            Advancement::Clear if exit.is_finite() => Event::new(source, EventType::WellOut, exit),
            Advancement::Clear => Event::none(source),
            Advancement::GaveUp(dt) => {
                warn!(
                    interaction = %self.name,
                    p1 = %p1,
                    p2 = %p2,
                    "Conservative advancement hit its step limit; rechecking later."
                );
                Event::new(source, EventType::Virtual, dt)
            }
        }
    }

    fn run_event(&mut self, event: &Event, state: &mut SimState) -> Result<EventData, EngineError> {
        let (p1, p2) = participants(event)?;
        match event.event_type {
            EventType::WellIn => {
                self.captures.add(p1, p2);
                Ok(EventData::new(EventType::Virtual).with_reschedule([p1, p2]))
            }
            EventType::WellOut => {
                self.captures.remove(p1, p2);
                Ok(EventData::new(EventType::Virtual).with_reschedule([p1, p2]))
            }
            EventType::Virtual => Ok(EventData::new(EventType::Virtual).with_reschedule([p1, p2])),
            EventType::Core => {
                let motion = self
                    .motion(p1, p2, state)
                    .ok_or(EngineError::MissingInteraction(p1, p2))?;
                let contact = motion.closest(0.0, 0.5 * self.length, self.radius);
                let n = Unit::new_unchecked(contact.normal);
                let lever1 = contact.arm1 - contact.normal * self.radius;
                let lever2 = contact.arm2 + contact.normal * self.radius;
                let g = motion.vij + motion.axis1.angular_velocity.cross(&lever1)
                    - motion.axis2.angular_velocity.cross(&lever2);
                let inertia = Inertia {
                    inv_mass1: state.inverse_mass(p1),
                    inv_mass2: state.inverse_mass(p2),
                    inv_inertia1: state.inverse_inertia(p1),
                    inv_inertia2: state.inverse_inertia(p2),
                };
                let update = offcentre_collision(&n, &g, &lever1, &lever2, &inertia, self.elasticity);

                let d1 = state.apply_kick(p1, update.dv1, update.dw1);
                let d2 = state.apply_kick(p2, update.dv2, update.dw2);
                Ok(EventData::new(EventType::Core)
                    .with_deltas([d1, d2])
                    .with_reschedule([p1, p2]))
            }
            other => Err(EngineError::Consistency(format!(
                "dumbbells {} cannot run a {other} event",
                self.name
            ))),
        }
    }

    fn overlaps(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> bool {
        self.motion(p1, p2, state).is_some_and(|motion| {
            motion.closest(0.0, 0.5 * self.length, self.radius).gap
                < -CONTACT_TOLERANCE * self.bounding_diameter()
        })
    }

    fn rescale_lengths(&mut self, factor: f64) {
        self.length *= factor;
        self.radius *= factor;
    }

    fn to_config(&self, units: &Units) -> InteractionConfig {
        InteractionConfig::Dumbbells(DumbbellsConfig {
            name: self.name.clone(),
            length: self.length / units.length,
            radius: self.radius / units.length,
            elasticity: self.elasticity,
            range: self.range.clone(),
            captured: Some(self.captures.to_pairs()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::core::models::particle::{Orientation, Particle};

    fn dumbbell(id: usize, x: f64, vx: f64, axis: Vector3<f64>, spin: Vector3<f64>) -> Particle {
        Particle::new(ParticleId(id), Vector3::new(x, 0.0, 0.0), Vector3::new(vx, 0.0, 0.0))
            .with_orientation(Orientation::new(axis, spin))
    }

    fn setup(state: &SimState) -> Dumbbells {
        let mut dumbbells = Dumbbells::new("Rods", 1.0, 0.25, 1.0, PairRange::All);
        dumbbells
            .initialise(&InteractionContext {
                id: 0,
                state,
                governs: &fixtures::governs_all,
            })
            .unwrap();
        dumbbells
    }

    fn run(dumbbells: &mut Dumbbells, state: &mut SimState) -> (Event, EventData) {
        let event = dumbbells.get_event(ParticleId(0), ParticleId(1), state);
        assert!(event.dt.is_finite(), "no event predicted");
        state.advance(event.dt);
        state.update_all_particles();
        let data = dumbbells.run_event(&event, state).unwrap();
        (event, data)
    }

    #[test]
    fn distant_pair_first_enters_the_bounding_sphere() {
        let mut state = fixtures::state(vec![
            dumbbell(0, -2.0, 1.0, Vector3::x(), Vector3::zeros()),
            dumbbell(1, 2.0, -1.0, Vector3::x(), Vector3::zeros()),
        ]);
        let mut dumbbells = setup(&state);
        assert!(dumbbells.captures().is_empty());

        let (event, data) = run(&mut dumbbells, &mut state);
        assert_eq!(event.event_type, EventType::WellIn);
        assert_eq!(data.event_type, EventType::Virtual);
        assert!((event.dt - 1.25).abs() < 1e-9);
        assert_eq!(dumbbells.captures().len(), 1);
    }

    #[test]
    fn side_by_side_dumbbells_touch_when_the_gap_closes() {
        // Parallel axes along y: sphere centres 1.2 apart touch when 1.2 - 2t = 0.5.
        let mut state = fixtures::state(vec![
            dumbbell(0, -0.6, 1.0, Vector3::y(), Vector3::zeros()),
            dumbbell(1, 0.6, -1.0, Vector3::y(), Vector3::zeros()),
        ]);
        let mut dumbbells = setup(&state);
        assert_eq!(dumbbells.captures().len(), 1);
        let energy = state.total_kinetic_energy();
        let (event, data) = run(&mut dumbbells, &mut state);
        assert_eq!(event.event_type, EventType::Core);
        assert!((event.dt - 0.35).abs() < 1e-8);
        assert_eq!(data.event_type, EventType::Core);
        assert!(state.particle(ParticleId(0)).angular_velocity().norm() > 0.0);
        assert!((state.total_kinetic_energy() - energy).abs() < 1e-9);
    }

    #[test]
    fn off_centre_elastic_collision_conserves_energy() {
        let mut state = fixtures::state(vec![
            dumbbell(0, -0.6, 1.0, Vector3::new(1.0, 0.4, 0.0), Vector3::new(0.0, 0.0, 0.7)),
            dumbbell(1, 0.6, -0.5, Vector3::new(0.3, 1.0, 0.2), Vector3::new(0.2, 0.0, -0.4)),
        ]);
        let mut dumbbells = setup(&state);
        let mut energy = state.total_kinetic_energy();
        for _ in 0..6 {
            let event = dumbbells.get_event(ParticleId(0), ParticleId(1), &state);
            if event.is_none() {
                break;
            }
            state.advance(event.dt);
            state.update_all_particles();
            let data = dumbbells.run_event(&event, &mut state).unwrap();
            if data.event_type == EventType::Core {
                assert!((state.total_kinetic_energy() - energy).abs() < 1e-9);
                energy = state.total_kinetic_energy();
            }
            assert!(!dumbbells.overlaps(ParticleId(0), ParticleId(1), &state));
        }
    }

    #[test]
    fn excluded_volume_accounts_for_sphere_overlap() {
        let dumbbells = Dumbbells::new("Rods", 0.0, 0.5, 1.0, PairRange::All);
        assert!((dumbbells.excluded_volume() - sphere_volume(1.0)).abs() < 1e-12);
        let apart = Dumbbells::new("Rods", 2.0, 0.5, 1.0, PairRange::All);
        assert!((apart.excluded_volume() - 2.0 * sphere_volume(1.0)).abs() < 1e-12);
    }
}
