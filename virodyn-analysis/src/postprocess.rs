//! Transformations applied to trajectories before comparison and display.

use crate::Trajectory;

/// Smallest virus concentration kept before taking log10.
pub const VIRUS_FLOOR: f64 = 1e-10;

/// Divisor applied to cell counts for display, so charts read in units of 1e11.
pub const DISPLAY_SCALE: f64 = 1e11;

/// Replaces every value below `floor` with `floor`.
///
/// NaN is treated as below the floor.
#[must_use]
pub fn clamp_floor(values: &[f64], floor: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&value| if value >= floor { value } else { floor })
        .collect()
}

/// log10 of the virus series after clamping to [`VIRUS_FLOOR`].
///
/// Never NaN or negative infinity: a non-positive concentration maps to
/// exactly `-10`.
#[must_use]
pub fn log10_viral_load(trajectory: &Trajectory) -> Vec<f64> {
    clamp_floor(&trajectory.virus(), VIRUS_FLOOR)
        .into_iter()
        .map(f64::log10)
        .collect()
}

/// Cell counts divided by a display scale.
#[derive(Debug, Clone, PartialEq)]
pub struct CellPopulations {
    pub susceptible: Vec<f64>,
    pub infected: Vec<f64>,
    pub refractory: Vec<f64>,

    /// `susceptible + infected + refractory`, computed before scaling.
    pub total: Vec<f64>,
}

impl CellPopulations {
    #[must_use]
    pub fn from_trajectory(trajectory: &Trajectory, scale: f64) -> Self {
        Self {
            susceptible: trajectory.series(|s| s.susceptible / scale),
            infected: trajectory.series(|s| s.infected / scale),
            refractory: trajectory.series(|s| s.refractory / scale),
            total: trajectory.series(|s| s.total_cells() / scale),
        }
    }
}
