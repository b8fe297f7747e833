//! # Core Module
//!
//! Stateless building blocks of the engine.
//!
//! - **Models** ([`models`]) - particles, species, ID newtypes, ranges, units and boundaries
//! - **Physics** ([`physics`]) - root finding for event prediction and collision impulses
//! - **File I/O** ([`io`]) - the versioned simulation document
//!
//! Nothing in this module knows about event scheduling. The [`crate::engine`] layer composes
//! these pieces into a running simulation.

pub mod io;
pub mod models;
pub mod physics;
