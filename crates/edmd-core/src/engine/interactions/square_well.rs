use super::{Interaction, contact_normal, governed_pairs, participants, sphere_volume};
use crate::core::io::document::{InteractionConfig, SquareWellConfig};
use crate::core::models::ids::ParticleId;
use crate::core::models::range::PairRange;
use crate::core::models::units::Units;
use crate::core::physics::impulses::{Inertia, smooth_collision, step_crossing};
use crate::engine::capture::CaptureMap;
use crate::engine::context::InteractionContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use nalgebra::Vector3;
use tracing::debug;

/// Hard core of `diameter` surrounded by an attractive step of depth `well_depth` out to
/// `lambda * diameter`.
///
/// Whether a pair sits inside the well is tracked by a capture map rather than re-derived
/// from the separation, so a pair resting exactly on the well edge is never ambiguous.
#[derive(Debug, Clone)]
pub struct SquareWell {
    name: String,
    diameter: f64,
    lambda: f64,
    well_depth: f64,
    elasticity: f64,
    range: PairRange,
    id: usize,
    captures: CaptureMap,
    loaded_captures: Option<Vec<[ParticleId; 2]>>,
}

impl SquareWell {
    pub fn new(
        name: impl Into<String>,
        diameter: f64,
        lambda: f64,
        well_depth: f64,
        elasticity: f64,
        range: PairRange,
    ) -> Self {
        Self {
            name: name.into(),
            diameter,
            lambda,
            well_depth,
            elasticity,
            range,
            id: 0,
            captures: CaptureMap::new(),
            loaded_captures: None,
        }
    }

    pub fn from_config(config: &SquareWellConfig, units: &Units) -> Self {
        let mut well = Self::new(
            config.name.clone(),
            config.diameter * units.length,
            config.lambda,
            config.well_depth * units.energy(),
            config.elasticity,
            config.range.clone(),
        );
        well.loaded_captures = config.captured.clone();
        well
    }

    pub fn captures(&self) -> &CaptureMap {
        &self.captures
    }

    #[inline]
    fn well_diameter(&self) -> f64 {
        self.lambda * self.diameter
    }

    fn inside_well(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> bool {
        state
            .dynamics
            .sphere_overlap(&state.pair(p1, p2).rij, self.well_diameter(), state.system_time)
    }
}

impl Interaction for SquareWell {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn initialise(&mut self, ctx: &InteractionContext<'_>) -> Result<(), EngineError> {
        self.id = ctx.id;
        match self.loaded_captures.take() {
            Some(pairs) => self.captures = CaptureMap::from_pairs(pairs),
            None => {
                let mut captures = CaptureMap::new();
                captures.rebuild(governed_pairs(ctx), |a, b| self.inside_well(a, b, ctx.state));
                self.captures = captures;
            }
        }
        debug!(
            interaction = %self.name,
            captured = self.captures.len(),
            "Square-well capture map ready."
        );
        Ok(())
    }

    fn max_int_dist(&self) -> f64 {
        self.well_diameter()
    }

    fn excluded_volume(&self) -> f64 {
        sphere_volume(self.diameter)
    }

    fn get_event(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> Event {
        let source = EventSource::Interaction { id: self.id, p1, p2 };
        let pair = state.pair(p1, p2);
        let dynamics = &state.dynamics;
        let t = state.system_time;

        if self.captures.is_captured(p1, p2) {
            if let Some(dt) = dynamics.sphere_in_root(&pair.rij, &pair.vij, self.diameter, t) {
                return Event::new(source, EventType::Core, dt);
            }
            let dt = dynamics.sphere_out_root(&pair.rij, &pair.vij, self.well_diameter(), t);
            if dt.is_finite() {
                Event::new(source, EventType::WellOut, dt)
            } else {
                Event::none(source)
            }
        } else {
            match dynamics.sphere_in_root(&pair.rij, &pair.vij, self.well_diameter(), t) {
                Some(dt) => Event::new(source, EventType::WellIn, dt),
                None => Event::none(source),
            }
        }
    }

    fn run_event(&mut self, event: &Event, state: &mut SimState) -> Result<EventData, EngineError> {
        let (p1, p2) = participants(event)?;
        let pair = state.pair(p1, p2);
        let n = contact_normal(&pair.rij, p1, p2)?;
        let inertia = Inertia::translational(state.inverse_mass(p1), state.inverse_mass(p2));

        let (resolved, update) = match event.event_type {
            EventType::Core => (
                EventType::Core,
                smooth_collision(&n, &pair.vij, &inertia, self.elasticity, 0.0),
            ),
            EventType::WellIn => {
                let crossing = step_crossing(&n, &pair.vij, &inertia, self.well_depth);
                if crossing.crossed {
                    self.captures.add(p1, p2);
                    (EventType::WellKeUp, crossing.update)
                } else {
                    (EventType::Bounce, crossing.update)
                }
            }
            EventType::WellOut => {
                let crossing = step_crossing(&n, &pair.vij, &inertia, -self.well_depth);
                if crossing.crossed {
                    self.captures.remove(p1, p2);
                    (EventType::WellKeDown, crossing.update)
                } else {
                    (EventType::Bounce, crossing.update)
                }
            }
            other => {
                return Err(EngineError::Consistency(format!(
                    "square well {} cannot run a {other} event",
                    self.name
                )));
            }
        };

        let d1 = state.apply_kick(p1, update.dv1, Vector3::zeros());
        let d2 = state.apply_kick(p2, update.dv2, Vector3::zeros());
        Ok(EventData::new(resolved)
            .with_deltas([d1, d2])
            .with_reschedule([p1, p2]))
    }

    fn overlaps(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> bool {
        state
            .dynamics
            .sphere_overlap(&state.pair(p1, p2).rij, self.diameter, state.system_time)
    }

    fn internal_energy(&self) -> f64 {
        -self.well_depth * self.captures.len() as f64
    }

    fn rescale_lengths(&mut self, factor: f64) {
        self.diameter *= factor;
    }

    fn to_config(&self, units: &Units) -> InteractionConfig {
        InteractionConfig::SquareWell(SquareWellConfig {
            name: self.name.clone(),
            diameter: self.diameter / units.length,
            lambda: self.lambda,
            well_depth: self.well_depth / units.energy(),
            elasticity: self.elasticity,
            range: self.range.clone(),
            captured: Some(self.captures.to_pairs()),
        })
    }
}
