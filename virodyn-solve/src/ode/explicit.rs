//! Explicit Runge–Kutta integration through `ode_solvers`.
//!
//! The steppers restart on every grid interval. Each run integrates slightly
//! past the interval's right edge with a dense-output spacing equal to the
//! interval width, so the last dense output lands on the right edge.

use std::{cell::RefCell, rc::Rc};

use ode_solvers::{
    SVector, System,
    dop_shared::{IntegrationError, OutputType},
};
use virodyn_core::solve::ode::{Integratable, State};

use super::{SolverError, Stats, rosenbrock::Tolerances};

/// Fraction of an interval integrated past its right edge.
const OVERSHOOT: f64 = 1e-6;

/// Step count after which `ode_solvers` reports a problem as stiff.
const STIFFNESS_CHECK: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Stepper {
    Dopri5,
    Dop853,
}

/// Step size controller settings, matching `ode_solvers`' defaults.
struct Controller {
    safety: f64,
    beta: f64,
    fac_min: f64,
    fac_max: f64,
}

impl Stepper {
    fn controller(self) -> Controller {
        match self {
            Stepper::Dopri5 => Controller {
                safety: 0.9,
                beta: 0.04,
                fac_min: 0.2,
                fac_max: 10.0,
            },
            Stepper::Dop853 => Controller {
                safety: 0.9,
                beta: 0.0,
                fac_min: 0.333,
                fac_max: 6.0,
            },
        }
    }
}

pub(super) fn integrate<C: Integratable<N>, const N: usize>(
    component: &C,
    initial_conditions: &C::Input,
    grid: &[f64],
    y0: [f64; N],
    (stepper, tol): (Stepper, Tolerances),
    max_steps: usize,
) -> Result<(Vec<[f64; N]>, Stats), SolverError> {
    let mut states = Vec::with_capacity(grid.len());
    states.push(y0);

    let mut stats = Stats::default();
    let mut y = y0;

    for interval in grid.windows(2) {
        let (x_start, x_stop) = (interval[0], interval[1]);
        let width = x_stop - x_start;

        let call_error = Rc::new(RefCell::new(None));
        let system = OdeSystem {
            component,
            initial_conditions,
            call_error: Rc::clone(&call_error),
        };

        let x_end = x_stop + OVERSHOOT * width;
        let y_start: SVector<f64, N> = y.into();
        let Tolerances { abs_tol, rel_tol } = tol;

        // The stepper's own limit admits `n_max + 1` attempts.
        let remaining = max_steps.saturating_sub(stats.attempted_steps());
        let n_max = u32::try_from(remaining.saturating_sub(1)).unwrap_or(u32::MAX);
        let Controller {
            safety,
            beta,
            fac_min,
            fac_max,
        } = stepper.controller();

        let result = match stepper {
            Stepper::Dopri5 => {
                let mut stepper = ode_solvers::Dopri5::from_param(
                    system,
                    x_start,
                    x_end,
                    width,
                    y_start,
                    rel_tol,
                    abs_tol,
                    safety,
                    beta,
                    fac_min,
                    fac_max,
                    x_end - x_start,
                    0.0,
                    n_max,
                    STIFFNESS_CHECK,
                    OutputType::Dense,
                );
                stepper.integrate().map(|stats| {
                    let x_out = stepper.x_out().clone();
                    let y_out = stepper.y_out().clone();
                    (stats, x_out, y_out)
                })
            }
            Stepper::Dop853 => {
                let mut stepper = ode_solvers::Dop853::from_param(
                    system,
                    x_start,
                    x_end,
                    width,
                    y_start,
                    rel_tol,
                    abs_tol,
                    safety,
                    beta,
                    fac_min,
                    fac_max,
                    x_end - x_start,
                    0.0,
                    n_max,
                    STIFFNESS_CHECK,
                    OutputType::Dense,
                );
                stepper.integrate().map(|stats| {
                    let x_out = stepper.x_out().clone();
                    let y_out = stepper.y_out().clone();
                    (stats, x_out, y_out)
                })
            }
        };

        // A failed component call poisons the derivative with NaN, which
        // usually surfaces as an integration error. Report the cause instead.
        if let Some(err) = call_error.borrow_mut().take() {
            return Err(SolverError::ComponentError {
                error: Box::new(err),
            });
        }
        let (interval_stats, x_out, y_out) = match result {
            Ok(output) => output,
            Err(IntegrationError::MaxNumStepReached { x, n_step }) => {
                return Err(SolverError::MaxStepsReached {
                    x,
                    steps: stats.attempted_steps() + n_step as usize,
                });
            }
            Err(error) => return Err(error.into()),
        };

        stats.absorb(Stats {
            component_calls: interval_stats.num_eval as usize,
            accepted_steps: interval_stats.accepted_steps as usize,
            rejected_steps: interval_stats.rejected_steps as usize,
        });
        if stats.attempted_steps() > max_steps {
            return Err(SolverError::MaxStepsReached {
                x: x_stop,
                steps: stats.attempted_steps(),
            });
        }

        let (Some(&x_last), Some(y_last)) = (x_out.last(), y_out.last()) else {
            return Err(SolverError::MissingOutput { x: x_stop });
        };
        if (x_last - x_stop).abs() > OVERSHOOT * width {
            return Err(SolverError::MissingOutput { x: x_stop });
        }

        let state = State {
            x: x_stop,
            y: (*y_last).into(),
        };
        if !state.is_finite() {
            return Err(SolverError::NonFinite { x: x_stop });
        }
        y = state.y;
        states.push(y);
    }

    Ok((states, stats))
}

/// Presents a component to `ode_solvers` as a `System`.
///
/// `System::system` can't fail, so a component error is parked in `call_error`
/// and the derivative is poisoned with NaN until `solout` stops the run.
struct OdeSystem<'a, C: Integratable<N>, const N: usize> {
    component: &'a C,
    initial_conditions: &'a C::Input,
    call_error: Rc<RefCell<Option<C::Error>>>,
}

impl<C: Integratable<N>, const N: usize> System<f64, SVector<f64, N>> for OdeSystem<'_, C, N> {
    fn system(&self, x: f64, y: &SVector<f64, N>, dy: &mut SVector<f64, N>) {
        let state = State { x, y: (*y).into() };
        let input = C::apply_state(self.initial_conditions, state);

        *dy = match self.component.call(input) {
            Ok(output) => C::extract_derivative(&output).into(),
            Err(error) => {
                // Keep the first failure; later ones are usually its fallout.
                self.call_error.borrow_mut().get_or_insert(error);
                SVector::from_element(f64::NAN)
            }
        };
    }

    fn solout(&mut self, _x: f64, _y: &SVector<f64, N>, _dy: &SVector<f64, N>) -> bool {
        self.call_error.borrow().is_some()
    }
}
