//! # Engine Module
//!
//! The stateful half of the library: everything needed to turn a simulation document into a
//! running event loop.
//!
//! ## Overview
//!
//! An event-driven simulation never integrates with a time step. Each event source predicts
//! when it will next change a particle, the [`scheduler`] keeps the earliest prediction per
//! particle in one ordered queue, and the [`simulation`] driver repeatedly jumps the system to
//! the front of that queue and lets the responsible source resolve the event.
//!
//! ## Architecture
//!
//! - **State** ([`state`], [`dynamics`], [`ensemble`]) - particles, clocks and the equations
//!   of free motion
//! - **Events** ([`event`]) - event types, sources and what a handler reports back
//! - **Event sources** ([`interactions`], [`globals`], [`locals`], [`systems`]) - trait
//!   objects behind a small predict/resolve contract, gathered in [`components`]
//! - **Neighbourhood** ([`neighbourhood`], [`capture`]) - cell lists and captured-pair maps
//! - **Scheduling** ([`scheduler`]) - the event queue and its invalidation rules
//! - **Driver** ([`simulation`], [`transaction`]) - initialisation phases, the run loop and
//!   replica exchange
//! - **Output** ([`plugins`], [`progress`]) - observers of the event stream and progress
//!   callbacks
//! - **Configuration and errors** ([`config`], [`error`])
//!
//! Event sources never hold a reference to the simulation. They receive the state, and
//! whatever else they may look at, through the [`context`] structs for the duration of a
//! call.

pub mod capture;
pub mod components;
pub mod config;
pub mod context;
pub mod dynamics;
pub mod ensemble;
pub mod error;
pub mod event;
pub mod globals;
pub mod interactions;
pub mod locals;
pub mod neighbourhood;
pub mod plugins;
pub mod progress;
pub mod scheduler;
pub mod simulation;
pub mod state;
pub mod systems;
pub mod transaction;
