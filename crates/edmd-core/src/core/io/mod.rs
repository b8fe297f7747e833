//! # File I/O Module
//!
//! The simulation document: a versioned TOML file describing the complete state of a run
//! (box, boundary, dynamics, species, every event source and every particle).
//!
//! - [`document`] - serde data types mirroring the file layout, plus validation
//! - [`traits`] - the reader/writer contract implemented by the document
//! - [`error`] - failures while reading, validating or writing a document
//!
//! The document is plain data. Converting it into a running simulation, and back, is done by
//! [`crate::engine::simulation::Simulation`].

pub mod document;
pub mod error;
pub mod traits;
