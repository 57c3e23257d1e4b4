//! Adaptive Rosenbrock 2(3) integration (Shampine & Reichelt, "The MATLAB
//! ODE Suite", 1997).
//!
//! Each step linearizes the system around the current point with a
//! finite-difference Jacobian `J` and time derivative `T`, factors
//! `W = I - h·γ·J` once, and solves three linear systems with it. The second
//! order solution advances the state and the embedded third order stage
//! estimates the local error.

use nalgebra::{DMatrix, DVector, Dyn, linalg::LU};

use super::{SolverError, Stats};

/// `γ = 1 / (2 + √2)`.
const GAMMA: f64 = 1.0 / (2.0 + std::f64::consts::SQRT_2);

/// `e32 = 6 + √2`.
const E32: f64 = 6.0 + std::f64::consts::SQRT_2;

const SAFETY: f64 = 0.8;
const MIN_SHRINK: f64 = 0.1;
const MAX_GROWTH: f64 = 5.0;

/// Error tolerances for the mixed absolute/relative error norm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Tolerances {
    pub abs_tol: f64,
    pub rel_tol: f64,
}

impl Tolerances {
    fn scale(&self, y: f64, y_new: f64) -> f64 {
        self.abs_tol + self.rel_tol * y.abs().max(y_new.abs())
    }
}

/// Integrates `dy/dx = f(x, y)` from `grid[0]` through every grid point.
///
/// Returns one state per grid point. Internal steps are sized by the local
/// error alone and truncated only to land on the next grid point.
pub(super) fn integrate<F, const N: usize>(
    f: F,
    grid: &[f64],
    y0: [f64; N],
    tol: Tolerances,
    max_steps: usize,
) -> Result<(Vec<[f64; N]>, Stats), SolverError>
where
    F: FnMut(f64, &[f64; N]) -> Result<[f64; N], SolverError>,
{
    let Some((&x_start, targets)) = grid.split_first() else {
        return Err(SolverError::InvalidGrid {
            reason: "grid is empty",
        });
    };

    let mut rhs = Rhs::<F, N> { f, calls: 0 };
    let mut states = Vec::with_capacity(grid.len());
    states.push(y0);

    let mut stats = Stats::default();
    if targets.is_empty() {
        return Ok((states, stats));
    }

    let mut x = x_start;
    let mut y = DVector::from_row_slice(&y0);
    let mut f0 = rhs.eval(x, &y)?;
    let span = grid[grid.len() - 1] - x_start;
    let mut h = initial_step(&y, &f0, tol, span);
    let mut linearization: Option<Linearization> = None;

    for &target in targets {
        while x < target {
            if stats.attempted_steps() >= max_steps {
                return Err(SolverError::MaxStepsReached {
                    x,
                    steps: stats.attempted_steps(),
                });
            }
            if h <= 16.0 * f64::EPSILON * x.abs().max(1.0) {
                return Err(SolverError::StepSizeTooSmall { x });
            }

            // Stretch a step that would stop just short of the target so the
            // next one isn't a sliver.
            let lands = x + 1.01 * h >= target;
            let h_step = if lands { target - x } else { h };

            let lin = match linearization.take() {
                Some(lin) => lin,
                None => Linearization::at(&mut rhs, x, &y, &f0)?,
            };

            let w = DMatrix::identity(N, N) - &lin.jacobian * (h_step * GAMMA);
            let lu = w.lu();
            if !lu.is_invertible() {
                return Err(SolverError::SingularMatrix { x });
            }

            let k1 = solve(&lu, &(&f0 + &lin.time_derivative * (h_step * GAMMA)), x)?;
            let f1 = rhs.eval(x + 0.5 * h_step, &(&y + &k1 * (0.5 * h_step)))?;
            let k2 = solve(&lu, &(&f1 - &k1), x)? + &k1;
            let y_new = &y + &k2 * h_step;
            let f2 = rhs.eval(x + h_step, &y_new)?;
            let k3 = solve(
                &lu,
                &(&f2 - (&k2 - &f1) * E32 - (&k1 - &f0) * 2.0
                    + &lin.time_derivative * (h_step * GAMMA)),
                x,
            )?;

            let local_error = (&k1 - &k2 * 2.0 + &k3) * (h_step / 6.0);
            let err = error_norm(&local_error, &y, &y_new, tol);

            if err <= 1.0 {
                x = if lands { target } else { x + h_step };
                if y_new.iter().any(|v| !v.is_finite()) {
                    return Err(SolverError::NonFinite { x });
                }
                y = y_new;
                f0 = f2;
                stats.accepted_steps += 1;
            } else {
                // Same point, so the linearization still holds.
                linearization = Some(lin);
                stats.rejected_steps += 1;
            }
            h = h_step * step_factor(err);
        }

        let mut state = [0.0; N];
        state.copy_from_slice(y.as_slice());
        states.push(state);
    }

    stats.component_calls = rhs.calls;
    Ok((states, stats))
}

/// Counts calls to the right-hand side and converts between array and vector
/// representations.
struct Rhs<F, const N: usize> {
    f: F,
    calls: usize,
}

impl<F, const N: usize> Rhs<F, N>
where
    F: FnMut(f64, &[f64; N]) -> Result<[f64; N], SolverError>,
{
    fn eval(&mut self, x: f64, y: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        let mut state = [0.0; N];
        state.copy_from_slice(y.as_slice());
        self.calls += 1;
        let derivative = (self.f)(x, &state)?;
        Ok(DVector::from_row_slice(&derivative))
    }
}

/// Jacobian and explicit time derivative of the right-hand side at one point.
struct Linearization {
    jacobian: DMatrix<f64>,
    time_derivative: DVector<f64>,
}

impl Linearization {
    fn at<F, const N: usize>(
        rhs: &mut Rhs<F, N>,
        x: f64,
        y: &DVector<f64>,
        f0: &DVector<f64>,
    ) -> Result<Self, SolverError>
    where
        F: FnMut(f64, &[f64; N]) -> Result<[f64; N], SolverError>,
    {
        let sqrt_eps = f64::EPSILON.sqrt();

        let mut jacobian = DMatrix::zeros(N, N);
        for j in 0..N {
            let mut shifted = y.clone();
            shifted[j] += sqrt_eps * y[j].abs().max(1.0);
            let delta = shifted[j] - y[j];
            let column = (rhs.eval(x, &shifted)? - f0) / delta;
            jacobian.set_column(j, &column);
        }

        let x_shifted = x + sqrt_eps * x.abs().max(1.0);
        let time_derivative = (rhs.eval(x_shifted, y)? - f0) / (x_shifted - x);

        Ok(Self {
            jacobian,
            time_derivative,
        })
    }
}

fn solve(lu: &LU<f64, Dyn, Dyn>, b: &DVector<f64>, x: f64) -> Result<DVector<f64>, SolverError> {
    lu.solve(b).ok_or(SolverError::SingularMatrix { x })
}

/// Largest scaled component of the local error; NaN if anything overflowed.
fn error_norm(error: &DVector<f64>, y: &DVector<f64>, y_new: &DVector<f64>, tol: Tolerances) -> f64 {
    error
        .iter()
        .zip(y.iter().zip(y_new.iter()))
        .map(|(e, (&a, &b))| e.abs() / tol.scale(a, b))
        .fold(0.0, |acc: f64, v| if v.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(v) })
}

/// Step size multiplier for a third-order error estimate.
fn step_factor(err: f64) -> f64 {
    if err == 0.0 {
        MAX_GROWTH
    } else if err.is_finite() {
        (SAFETY * err.powf(-1.0 / 3.0)).clamp(MIN_SHRINK, MAX_GROWTH)
    } else {
        MIN_SHRINK
    }
}

/// Starting step from the size of the state relative to its derivative.
fn initial_step(y: &DVector<f64>, f0: &DVector<f64>, tol: Tolerances, span: f64) -> f64 {
    let rms = |v: &DVector<f64>| {
        let sum: f64 = v
            .iter()
            .zip(y.iter())
            .map(|(vi, &yi)| (vi / tol.scale(yi, yi)).powi(2))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let n = v.len() as f64;
        (sum / n).sqrt()
    };

    let d0 = rms(y);
    let d1 = rms(f0);
    let h = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6 * span
    } else {
        0.01 * d0 / d1
    };
    h.min(span)
}
