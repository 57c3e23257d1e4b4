//! Numerical solvers for virodyn.
//!
//! The [`ode`] module integrates any [`Integratable`] component onto a fixed
//! output grid, using either a stiff Rosenbrock method or one of the explicit
//! Runge–Kutta methods provided by `ode_solvers`.
//!
//! [`Integratable`]: virodyn_core::solve::ode::Integratable

pub mod ode;
