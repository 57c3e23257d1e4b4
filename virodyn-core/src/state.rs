/// The biological system at one instant.
///
/// Components are conceptually non-negative, but nothing here enforces it:
/// the integrator is free to overshoot slightly below zero and any clamping is
/// left to post-processing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellState {
    /// Susceptible target cells (T).
    pub susceptible: f64,
    /// Infected cells (I).
    pub infected: f64,
    /// Refractory cells (R), temporarily protected by interferon.
    pub refractory: f64,
    /// Free virus (V).
    pub virus: f64,
    /// Interferon (F).
    pub interferon: f64,
}

impl CellState {
    /// Number of state variables.
    pub const LEN: usize = 5;

    /// Creates a state from its components in `[T, I, R, V, F]` order.
    #[must_use]
    pub fn new(susceptible: f64, infected: f64, refractory: f64, virus: f64, interferon: f64) -> Self {
        Self {
            susceptible,
            infected,
            refractory,
            virus,
            interferon,
        }
    }

    /// Total cell count, `T + I + R`.
    #[must_use]
    pub fn total_cells(&self) -> f64 {
        self.susceptible + self.infected + self.refractory
    }

    /// Returns `true` if every component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        <[f64; 5]>::from(*self).iter().all(|v| v.is_finite())
    }
}

impl From<[f64; 5]> for CellState {
    fn from([susceptible, infected, refractory, virus, interferon]: [f64; 5]) -> Self {
        Self {
            susceptible,
            infected,
            refractory,
            virus,
            interferon,
        }
    }
}

impl From<CellState> for [f64; 5] {
    fn from(state: CellState) -> Self {
        [
            state.susceptible,
            state.infected,
            state.refractory,
            state.virus,
            state.interferon,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_order_is_t_i_r_v_f() {
        let state = CellState::new(1.0, 2.0, 3.0, 4.0, 5.0);
        assert_eq!(<[f64; 5]>::from(state), [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(CellState::from([1.0, 2.0, 3.0, 4.0, 5.0]), state);
    }

    #[test]
    fn total_excludes_virus_and_interferon() {
        let state = CellState::new(10.0, 2.0, 3.0, 100.0, 50.0);
        assert_eq!(state.total_cells(), 15.0);
    }

    #[test]
    fn detects_non_finite_components() {
        assert!(CellState::default().is_finite());
        assert!(!CellState::new(1.0, f64::NAN, 0.0, 0.0, 0.0).is_finite());
    }
}
