//! Simulation, comparison, and charting of the within-host infection models.
//!
//! [`pipeline::run`] is the entry point used by the `virodyn` binary: it
//! integrates the full and reduced models from a [`Config`], post-processes
//! the trajectories, summarizes them against the observed viral loads, and
//! writes the two diagnostic charts.

pub mod compare;
pub mod config;
mod error;
pub mod pipeline;
pub mod postprocess;
pub mod report;
mod trajectory;

pub use compare::Observation;
pub use config::{Config, ConfigError, OutputConfig};
pub use error::AnalysisError;
pub use trajectory::Trajectory;
