use crate::core::models::ids::ParticleId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("TOML parsing error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Document version mismatch: found '{found}', expected '{expected}'")]
    VersionMismatch { found: String, expected: &'static str },
    #[error("Duplicate name '{name}' in section '{section}'")]
    DuplicateName { section: &'static str, name: String },
    #[error("Particle at position {position} has id {found}; ids must run 0..N in order")]
    ParticleOrder { position: usize, found: ParticleId },
    #[error("I/O error: {0}")]
    Stream(#[from] std::io::Error),
}
