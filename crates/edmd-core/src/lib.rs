//! # EDMD Core Library
//!
//! An event-driven molecular dynamics engine. Instead of integrating equations of motion with a
//! fixed time step, the engine predicts the exact time of the next event for every particle
//! (collision, well crossing, cell-boundary crossing, sentinel) and jumps the whole system to
//! the earliest one.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Particle`, `Species`, ranges, units,
//!   boundary conditions), pure kinematic and impulse formulas in [`core::physics`], and the
//!   versioned TOML document in [`core::io`].
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. It contains the spatial cell grid and
//!   neighbourhood queries, the event scheduler, the polymorphic event sources (interactions,
//!   globals, locals, systems), output plugins and the [`engine::simulation::Simulation`]
//!   driver that owns all of them.
//!
//! - **[`workflows`]: The Public API.** Complete procedures (plain runs, compression, replica
//!   exchange) built from the engine, reporting progress through a callback.

pub mod core;
pub mod engine;
pub mod workflows;
