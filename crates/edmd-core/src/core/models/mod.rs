//! # Core Models Module
//!
//! Data structures describing what is being simulated.
//!
//! - [`ids`] - the dense [`ids::ParticleId`] handle used everywhere instead of references
//! - [`particle`] - kinematic state of one particle, including its lazy-update stamp
//! - [`species`] - mass, inertia and membership of particle families
//! - [`range`] - particle and particle-pair predicates used to scope event sources
//! - [`units`] - conversion between file units and internal units
//! - [`boundary`] - boundary conditions of the primary simulation box

pub mod boundary;
pub mod ids;
pub mod particle;
pub mod range;
pub mod species;
pub mod units;
