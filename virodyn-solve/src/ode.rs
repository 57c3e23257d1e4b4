mod explicit;
mod rosenbrock;

use std::error::Error as StdError;

use ode_solvers::dop_shared::IntegrationError;
use thiserror::Error;
use virodyn_core::{
    Component,
    solve::ode::{Integratable, State},
};

use explicit::Stepper;
use rosenbrock::Tolerances;

/// Default cap on the number of attempted steps across a whole integration.
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

/// Solves an [`Integratable`] component that defines a system of ODEs.
pub struct Solver<C: Integratable<N>, const N: usize> {
    component: C,
}

/// Input for [`Solver::call`].
#[derive(Debug)]
pub struct SolverInput<C: Integratable<N>, const N: usize> {
    /// The initial conditions for integration.
    ///
    /// This input defines the initial system [`State`] using
    /// [`Integratable::extract_state`] and is used to reconstruct component
    /// inputs during integration with [`Integratable::apply_state`].
    pub initial_conditions: C::Input,

    /// The points at which the solution is reported.
    ///
    /// Must be finite and strictly increasing, and must start at the initial
    /// state's `x`. The solver picks its own internal steps and only uses the
    /// grid to decide where to report.
    pub grid: Vec<f64>,

    /// The numerical integration method to use.
    pub method: Method,

    /// Maximum number of attempted steps (accepted and rejected).
    pub max_steps: usize,
}

impl<C: Integratable<N>, const N: usize> SolverInput<C, N> {
    /// Creates an input using the default method and step budget.
    pub fn new(initial_conditions: C::Input, grid: Vec<f64>) -> Self {
        Self {
            initial_conditions,
            grid,
            method: Method::default(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Sets the integration method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the maximum number of attempted steps.
    #[must_use]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Output for [`Solver::call`].
#[derive(Debug)]
pub struct SolverOutput<C: Integratable<N>, const N: usize> {
    /// Work done by the solver.
    pub stats: Stats,

    /// The original input, used to reconstruct component inputs from solver states.
    pub initial_conditions: C::Input,

    /// One state per grid point, in grid order.
    ///
    /// The first state is exactly the initial state.
    pub steps: Vec<State<N>>,
}

impl<C: Integratable<N>, const N: usize> SolverOutput<C, N> {
    /// Reconstructs the component input at every reported step.
    pub fn component_inputs(&self) -> impl Iterator<Item = C::Input> + '_ {
        self.steps
            .iter()
            .map(|state| C::apply_state(&self.initial_conditions, *state))
    }
}

/// Counters describing the work done during one integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of times the component was called.
    pub component_calls: usize,

    /// Number of accepted internal steps.
    pub accepted_steps: usize,

    /// Number of rejected internal steps.
    pub rejected_steps: usize,
}

impl Stats {
    fn absorb(&mut self, other: Stats) {
        self.component_calls += other.component_calls;
        self.accepted_steps += other.accepted_steps;
        self.rejected_steps += other.rejected_steps;
    }

    fn attempted_steps(&self) -> usize {
        self.accepted_steps + self.rejected_steps
    }
}

/// Error returned by [`Solver::call`].
///
/// Every variant other than `InvalidGrid` and `InvalidTolerance` is a
/// numerical failure: the solver could not produce a finite trajectory.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid output grid: {reason}")]
    InvalidGrid { reason: &'static str },

    #[error("invalid tolerances: abs_tol = {abs_tol}, rel_tol = {rel_tol}")]
    InvalidTolerance { abs_tol: f64, rel_tol: f64 },

    #[error("step size too small at x = {x}")]
    StepSizeTooSmall { x: f64 },

    #[error("gave up after {steps} steps at x = {x}")]
    MaxStepsReached { x: f64, steps: usize },

    #[error("singular iteration matrix at x = {x}")]
    SingularMatrix { x: f64 },

    #[error("non-finite state at x = {x}")]
    NonFinite { x: f64 },

    #[error("solver produced no output at x = {x}")]
    MissingOutput { x: f64 },

    #[error(transparent)]
    IntegrationError(#[from] IntegrationError),

    #[error("component call failed")]
    ComponentError {
        #[source]
        error: Box<dyn StdError + Send + Sync + 'static>,
    },
}

/// Supported numerical integration methods for the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    /// Adaptive Rosenbrock 2(3) method (Shampine–Reichelt `ode23s`).
    ///
    /// A linearly implicit, L-stable method that solves one linear system per
    /// stage with a finite-difference Jacobian. It stays stable when some state
    /// variables relax far faster than others, which makes it the right default
    /// for infection dynamics where free virus and target cells change on very
    /// different time scales. Error is controlled against `abs_tol` and
    /// `rel_tol` with a mixed max norm.
    Rosenbrock23 { abs_tol: f64, rel_tol: f64 },

    /// Adaptive Dormand–Prince 5(4) Runge–Kutta method.
    ///
    /// An explicit embedded method that computes both 5th and 4th order
    /// solutions to estimate local truncation error. Efficient for non-stiff
    /// problems; on stiff ones it either crawls or stops with a stiffness
    /// error.
    Dopri5 { abs_tol: f64, rel_tol: f64 },

    /// Adaptive Dormand–Prince 8(5,3) Runge–Kutta method.
    ///
    /// A higher-order explicit embedded method with precise error control,
    /// useful when very low error tolerances are required on non-stiff
    /// problems.
    Dop853 { abs_tol: f64, rel_tol: f64 },
}

impl Default for Method {
    fn default() -> Self {
        Self::Rosenbrock23 {
            abs_tol: 1e-9,
            rel_tol: 1e-6,
        }
    }
}

impl Method {
    /// A short lowercase name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rosenbrock23 { .. } => "rosenbrock23",
            Self::Dopri5 { .. } => "dopri5",
            Self::Dop853 { .. } => "dop853",
        }
    }

    /// Returns `(abs_tol, rel_tol)`.
    #[must_use]
    pub fn tolerances(&self) -> (f64, f64) {
        match *self {
            Self::Rosenbrock23 { abs_tol, rel_tol }
            | Self::Dopri5 { abs_tol, rel_tol }
            | Self::Dop853 { abs_tol, rel_tol } => (abs_tol, rel_tol),
        }
    }

    /// Checks that `abs_tol` is finite and positive and `rel_tol` is finite
    /// and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidTolerance`] otherwise.
    pub fn validate(&self) -> Result<(), SolverError> {
        let (abs_tol, rel_tol) = self.tolerances();
        let abs_ok = abs_tol.is_finite() && abs_tol > 0.0;
        let rel_ok = rel_tol.is_finite() && rel_tol >= 0.0;
        if abs_ok && rel_ok {
            Ok(())
        } else {
            Err(SolverError::InvalidTolerance { abs_tol, rel_tol })
        }
    }
}

impl<C: Integratable<N>, const N: usize> Solver<C, N> {
    /// Creates a new ODE solver for the given component.
    pub fn new(component: C) -> Self {
        Self { component }
    }

    /// Evaluates the component's derivative at `(x, y)`.
    fn derivative(
        &self,
        initial_conditions: &C::Input,
        x: f64,
        y: &[f64; N],
    ) -> Result<[f64; N], SolverError> {
        let input = C::apply_state(initial_conditions, State { x, y: *y });
        let output = self
            .component
            .call(input)
            .map_err(|error| SolverError::ComponentError {
                error: Box::new(error),
            })?;
        Ok(C::extract_derivative(&output))
    }
}

impl<C: Integratable<N>, const N: usize> Component for Solver<C, N> {
    type Input = SolverInput<C, N>;
    type Output = SolverOutput<C, N>;
    type Error = SolverError;

    /// Integrates the component across the output grid using the selected method.
    ///
    /// # Errors
    ///
    /// Returns `SolverError::InvalidGrid` or `SolverError::InvalidTolerance`
    /// for malformed input, `SolverError::ComponentError` if any component call
    /// fails, and one of the numerical variants if the method cannot reach the
    /// end of the grid with a finite state.
    fn call(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        let SolverInput {
            initial_conditions,
            grid,
            method,
            max_steps,
        } = input;

        let State { x: x_start, y: y_start } = C::extract_state(&initial_conditions);
        validate_grid(&grid, x_start)?;
        method.validate()?;

        let (states, stats) = match method {
            Method::Rosenbrock23 { abs_tol, rel_tol } => rosenbrock::integrate(
                |x, y: &[f64; N]| self.derivative(&initial_conditions, x, y),
                &grid,
                y_start,
                Tolerances { abs_tol, rel_tol },
                max_steps,
            )?,
            Method::Dopri5 { abs_tol, rel_tol } => explicit::integrate(
                &self.component,
                &initial_conditions,
                &grid,
                y_start,
                (Stepper::Dopri5, Tolerances { abs_tol, rel_tol }),
                max_steps,
            )?,
            Method::Dop853 { abs_tol, rel_tol } => explicit::integrate(
                &self.component,
                &initial_conditions,
                &grid,
                y_start,
                (Stepper::Dop853, Tolerances { abs_tol, rel_tol }),
                max_steps,
            )?,
        };

        log::debug!(
            "{} integrated {} points: {} calls, {} accepted, {} rejected",
            method.name(),
            grid.len(),
            stats.component_calls,
            stats.accepted_steps,
            stats.rejected_steps,
        );

        let steps = grid
            .into_iter()
            .zip(states)
            .map(|(x, y)| State { x, y })
            .collect();

        Ok(SolverOutput {
            stats,
            initial_conditions,
            steps,
        })
    }
}

fn validate_grid(grid: &[f64], x_start: f64) -> Result<(), SolverError> {
    let Some(&first) = grid.first() else {
        return Err(SolverError::InvalidGrid {
            reason: "grid is empty",
        });
    };
    if grid.iter().any(|x| !x.is_finite()) {
        return Err(SolverError::InvalidGrid {
            reason: "grid contains a non-finite point",
        });
    }
    if grid.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(SolverError::InvalidGrid {
            reason: "grid must be strictly increasing",
        });
    }
    if first != x_start {
        return Err(SolverError::InvalidGrid {
            reason: "grid must start at the initial state",
        });
    }
    Ok(())
}
