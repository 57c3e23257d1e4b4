//! Core traits and models for virodyn.
//!
//! This crate defines the seams that the solver and the analysis pipeline
//! build on, plus the within-host viral infection model itself:
//!
//! - [`Component`]: a deterministic callable mapping an input to an output
//! - [`solve::ode::Integratable`]: adapts a component into an ODE system
//! - [`ParameterSet`] and [`CellState`]: the model's constants and state
//! - [`InfectionModel`]: the full and reduced dynamics
//! - [`TimeGrid`]: the output grid the integrator samples

mod component;
pub mod dynamics;
mod parameters;
pub mod solve;
mod state;
mod time_grid;

pub use component::Component;
pub use dynamics::{Derivative, DynamicsError, InfectionModel, ModelInput, ModelVariant};
pub use parameters::{ParameterSet, Rates};
pub use state::CellState;
pub use time_grid::{TimeGrid, TimeGridError};
