use thiserror::Error;

use super::config::ConfigError;
use super::simulation::Status;
use crate::core::io::error::DocumentError;
use crate::core::models::ids::ParticleId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Operation '{operation}' is not valid while the simulation is {status:?}")]
    InvalidState {
        operation: &'static str,
        status: Status,
    },

    #[error("Invalid event time {dt} predicted for particles {particles:?}")]
    InvalidEventTime { dt: f64, particles: Vec<ParticleId> },

    #[error("No interaction governs the pair ({0}, {1})")]
    MissingInteraction(ParticleId, ParticleId),

    #[error("Scheduler consistency check failed: {0}")]
    Consistency(String),

    #[error("Event {event_count} failed: {source}")]
    EventFailed {
        event_count: u64,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Replica exchange rejected: {0}")]
    ReplicaExchange(String),

    #[error("Output error: {0}")]
    Output(String),
}
