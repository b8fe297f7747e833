//! # Physics Module
//!
//! Pure functions behind event prediction and resolution. They operate on plain vectors and
//! scalars, never on the simulation state, so every formula can be tested in isolation.
//!
//! - [`roots`] - earliest crossing times of spheres, shells and planes
//! - [`impulses`] - momentum exchange for smooth, rough, off-centre and well-crossing events

pub mod impulses;
pub mod roots;
