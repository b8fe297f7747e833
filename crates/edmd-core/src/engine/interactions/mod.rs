//! # Interactions
//!
//! Particle-pair event sources. Each interaction owns its parameters and a [`PairRange`]; the
//! first interaction (in configuration order) whose range contains a pair governs it.
//!
//! - [`hard_sphere::HardSphere`] - impenetrable smooth spheres
//! - [`square_well::SquareWell`] - hard core plus an attractive step, with a capture map
//! - [`rough_hard_sphere::RoughHardSphere`] - spheres exchanging spin on contact
//! - [`dumbbells::Dumbbells`] - rigid two-sphere bodies, orientation aware

pub mod dumbbells;
pub mod hard_sphere;
pub mod rough_hard_sphere;
pub mod square_well;

use super::context::InteractionContext;
use super::error::EngineError;
use super::event::{Event, EventData};
use super::state::SimState;
use crate::core::io::document::InteractionConfig;
use crate::core::models::ids::ParticleId;
use crate::core::models::range::PairRange;
use crate::core::models::units::Units;
use std::fmt;

pub trait Interaction: fmt::Debug {
    fn name(&self) -> &str;

    fn range(&self) -> &PairRange;

    fn initialise(&mut self, ctx: &InteractionContext<'_>) -> Result<(), EngineError>;

    /// Longest distance at which this interaction can produce an event, before compression
    /// growth is applied.
    fn max_int_dist(&self) -> f64;

    /// Volume a particle excludes when this is its self-interaction.
    fn excluded_volume(&self) -> f64;

    fn supports_compression(&self) -> bool {
        false
    }

    /// Predicts the next event of the pair. Both particles must be up to date.
    fn get_event(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> Event;

    /// Resolves an event this interaction predicted, with both particles streamed to it.
    fn run_event(&mut self, event: &Event, state: &mut SimState) -> Result<EventData, EngineError>;

    /// Whether the pair currently violates the interaction's geometry.
    fn overlaps(&self, p1: ParticleId, p2: ParticleId, state: &SimState) -> bool;

    /// Potential energy stored in the interaction.
    fn internal_energy(&self) -> f64 {
        0.0
    }

    fn rescale_lengths(&mut self, factor: f64);

    fn to_config(&self, units: &Units) -> InteractionConfig;
}

/// Builds an interaction from its document entry, converting file units to internal units.
pub fn from_config(config: &InteractionConfig, units: &Units) -> Box<dyn Interaction> {
    match config {
        InteractionConfig::HardSphere(c) => Box::new(hard_sphere::HardSphere::from_config(c, units)),
        InteractionConfig::SquareWell(c) => Box::new(square_well::SquareWell::from_config(c, units)),
        InteractionConfig::RoughHardSphere(c) => {
            Box::new(rough_hard_sphere::RoughHardSphere::from_config(c, units))
        }
        InteractionConfig::Dumbbells(c) => Box::new(dumbbells::Dumbbells::from_config(c, units)),
    }
}

/// Index of the interaction governing a pair, if any.
pub fn governing(ranges: &[PairRange], p1: ParticleId, p2: ParticleId) -> Option<usize> {
    ranges.iter().position(|range| range.contains(p1, p2))
}

fn require_orientation(
    component: &str,
    ctx: &InteractionContext<'_>,
) -> Result<(), EngineError> {
    for particle in &ctx.state.particles {
        if particle.orientation.is_none() && (ctx.governs)(particle.id, particle.id) {
            return Err(super::config::ConfigError::MissingOrientation {
                component: component.to_string(),
                id: particle.id,
            }
            .into());
        }
    }
    Ok(())
}

fn require_inertia(component: &str, ctx: &InteractionContext<'_>) -> Result<(), EngineError> {
    for particle in &ctx.state.particles {
        if (ctx.governs)(particle.id, particle.id) {
            let species = ctx.state.species_of(particle.id);
            if species.inertia_constant.is_none() {
                return Err(super::config::ConfigError::MissingInertia {
                    component: component.to_string(),
                    species: species.name.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Every pair this interaction governs, for capture-map construction.
fn governed_pairs<'a>(
    ctx: &'a InteractionContext<'a>,
) -> impl Iterator<Item = (ParticleId, ParticleId)> + 'a {
    let n = ctx.state.n();
    (0..n).flat_map(move |a| {
        ((a + 1)..n)
            .map(move |b| (ParticleId(a), ParticleId(b)))
            .filter(move |&(a, b)| (ctx.governs)(a, b))
    })
}

/// The pair an interaction event was predicted for.
fn participants(event: &Event) -> Result<(ParticleId, ParticleId), EngineError> {
    match event.source {
        super::event::EventSource::Interaction { p1, p2, .. } => Ok((p1, p2)),
        other => Err(EngineError::Consistency(format!(
            "interaction handler received an event from {other:?}"
        ))),
    }
}

/// Unit vector along a contact separation; a vanishing separation cannot define a normal.
fn contact_normal(
    rij: &nalgebra::Vector3<f64>,
    p1: ParticleId,
    p2: ParticleId,
) -> Result<nalgebra::Unit<nalgebra::Vector3<f64>>, EngineError> {
    nalgebra::Unit::try_new(*rij, f64::EPSILON).ok_or(EngineError::InvalidEventTime {
        dt: 0.0,
        particles: vec![p1, p2],
    })
}

fn sphere_volume(diameter: f64) -> f64 {
    std::f64::consts::PI * diameter.powi(3) / 6.0
}
