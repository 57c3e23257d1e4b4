use virodyn_core::{CellState, InfectionModel};
use virodyn_solve::ode::SolverOutput;

/// Model states sampled on the output grid.
///
/// Built once from solver output and never mutated; post-processing reads it
/// and produces new series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    days: Vec<f64>,
    states: Vec<CellState>,
}

impl Trajectory {
    /// Collects one `(day, state)` pair per reported solver step.
    #[must_use]
    pub fn from_output(output: &SolverOutput<InfectionModel, { CellState::LEN }>) -> Self {
        output
            .component_inputs()
            .map(|input| (input.time, input.state))
            .collect()
    }

    #[must_use]
    pub fn days(&self) -> &[f64] {
        &self.days
    }

    #[must_use]
    pub fn states(&self) -> &[CellState] {
        &self.states
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Free virus concentration at each day, unclamped.
    #[must_use]
    pub fn virus(&self) -> Vec<f64> {
        self.series(|state| state.virus)
    }

    /// Maps every state to one value.
    pub fn series(&self, f: impl Fn(&CellState) -> f64) -> Vec<f64> {
        self.states.iter().map(f).collect()
    }
}

impl FromIterator<(f64, CellState)> for Trajectory {
    fn from_iter<I: IntoIterator<Item = (f64, CellState)>>(iter: I) -> Self {
        let (days, states) = iter.into_iter().unzip();
        Self { days, states }
    }
}
