//! Within-host viral infection dynamics.
//!
//! Both models share every equation except the infected-cell balance:
//!
//! ```text
//! dT/dt = -b·V·T - w·F·T + r·R
//! dI/dt =  b·V·T - d_eff(t)·I [- k·I·F]
//! dR/dt =  w·F·T - r·R
//! dV/dt =  p·I - c·V
//! dF/dt =  q·I - d·F
//! ```
//!
//! The bracketed interferon clearance term is present only in the
//! [`ModelVariant::Full`] model.

use thiserror::Error;

use crate::{
    CellState, Component, Rates,
    solve::ode::{Integratable, State},
};

/// Selects which infected-cell balance the model uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Interferon directly clears infected cells at rate `k·I·F`.
    Full,
    /// Interferon only drives refractory conversion; no direct clearance.
    Reduced,
}

impl ModelVariant {
    /// Both variants, full first.
    pub const ALL: [Self; 2] = [Self::Full, Self::Reduced];

    /// A short lowercase name, used in logs and errors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reduced => "reduced",
        }
    }

    /// Interferon-mediated clearance of infected cells, `k·I·F` or zero.
    fn interferon_clearance(self, rates: &Rates, state: &CellState) -> f64 {
        match self {
            Self::Full => rates.interferon_clearance_rate * state.infected * state.interferon,
            Self::Reduced => 0.0,
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Input to [`InfectionModel`]: the current time (days) and state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInput {
    pub time: f64,
    pub state: CellState,
}

/// Instantaneous rate of change of each [`CellState`] component, per day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivative(pub CellState);

/// Errors returned by [`InfectionModel::call`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DynamicsError {
    #[error("non-finite derivative at t = {time}")]
    NonFinite { time: f64 },
}

/// The infection model as a [`Component`].
///
/// Holds the rate constants by value and evaluates the derivative for one
/// [`ModelInput`] per call. Calls are pure, so solvers may evaluate it as often
/// as they like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfectionModel {
    rates: Rates,
    variant: ModelVariant,
}

impl InfectionModel {
    #[must_use]
    pub fn new(rates: Rates, variant: ModelVariant) -> Self {
        Self { rates, variant }
    }

    /// Computes the derivative without checking that it is finite.
    #[must_use]
    pub fn derivative(&self, time: f64, state: &CellState) -> Derivative {
        let Rates {
            infection_rate: b,
            refractory_rate: w,
            reversion_rate: r,
            virus_production_rate: p,
            virus_clearance_rate: c,
            interferon_production_rate: q,
            interferon_decay_rate: d,
            ..
        } = self.rates;
        let CellState {
            susceptible: t_cells,
            infected,
            refractory,
            virus,
            interferon,
        } = *state;

        let infection = b * virus * t_cells;
        let conversion = w * interferon * t_cells;
        let reversion = r * refractory;
        let death = effective_death_rate(&self.rates, time) * infected;
        let clearance = self.variant.interferon_clearance(&self.rates, state);

        Derivative(CellState {
            susceptible: -infection - conversion + reversion,
            infected: infection - death - clearance,
            refractory: conversion - reversion,
            virus: p * infected - c * virus,
            interferon: q * infected - d * interferon,
        })
    }
}

/// Infected-cell death rate at time `t`.
///
/// Equals `dI` up to and including the escalation onset `mu`, and
/// `dI · exp(s · (t - mu))` afterwards.
#[must_use]
pub fn effective_death_rate(rates: &Rates, t: f64) -> f64 {
    if t > rates.escalation_onset {
        rates.infected_death_rate * (rates.escalation_exponent * (t - rates.escalation_onset)).exp()
    } else {
        rates.infected_death_rate
    }
}

impl Component for InfectionModel {
    type Input = ModelInput;
    type Output = Derivative;
    type Error = DynamicsError;

    fn call(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        let derivative = self.derivative(input.time, &input.state);
        if derivative.0.is_finite() {
            Ok(derivative)
        } else {
            Err(DynamicsError::NonFinite { time: input.time })
        }
    }
}

impl Integratable<5> for InfectionModel {
    fn apply_state(_initial_conditions: &Self::Input, state: State<5>) -> Self::Input {
        ModelInput {
            time: state.x,
            state: state.y.into(),
        }
    }

    fn extract_state(input: &Self::Input) -> State<5> {
        State {
            x: input.time,
            y: input.state.into(),
        }
    }

    fn extract_derivative(output: &Self::Output) -> [f64; 5] {
        output.0.into()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn rates() -> Rates {
        Rates {
            infection_rate: 2e-7,
            refractory_rate: 1e-6,
            reversion_rate: 0.1,
            infected_death_rate: 2.0,
            interferon_clearance_rate: 0.01,
            virus_production_rate: 1e3,
            virus_clearance_rate: 5.0,
            interferon_production_rate: 1.0,
            interferon_decay_rate: 2.0,
            escalation_onset: 3.0,
            escalation_exponent: 1.0,
        }
    }

    fn mid_infection() -> CellState {
        CellState::new(5e10, 1e8, 2e9, 1e6, 40.0)
    }

    #[test]
    fn death_rate_is_baseline_until_onset() {
        let rates = rates();
        assert_eq!(effective_death_rate(&rates, 0.0), 2.0);
        assert_eq!(effective_death_rate(&rates, 3.0), 2.0);
        assert_relative_eq!(effective_death_rate(&rates, 4.0), 2.0 * 1f64.exp());
        assert_relative_eq!(effective_death_rate(&rates, 10.0), 2.0 * 7f64.exp());
    }

    #[test]
    fn death_rate_never_decreases_after_onset() {
        let rates = rates();
        let times: Vec<f64> = (0..=700).map(|i| 3.0 + f64::from(i) * 0.01).collect();
        for pair in times.windows(2) {
            assert!(effective_death_rate(&rates, pair[1]) >= effective_death_rate(&rates, pair[0]));
        }
    }

    #[test]
    fn zero_exponent_keeps_death_rate_constant() {
        let rates = Rates {
            escalation_exponent: 0.0,
            ..rates()
        };
        assert_eq!(effective_death_rate(&rates, 9.0), 2.0);
    }

    #[test]
    fn full_model_matches_hand_computed_derivative() {
        let model = InfectionModel::new(rates(), ModelVariant::Full);
        let Derivative(dy) = model.derivative(1.0, &mid_infection());

        // b·V·T = 2e-7 · 1e6 · 5e10 = 1e10, w·F·T = 1e-6 · 40 · 5e10 = 2e6
        assert_relative_eq!(dy.susceptible, -1e10 - 2e6 + 2e8, max_relative = 1e-12);
        assert_relative_eq!(dy.infected, 1e10 - 2e8 - 0.01 * 1e8 * 40.0, max_relative = 1e-12);
        assert_relative_eq!(dy.refractory, 2e6 - 2e8, max_relative = 1e-12);
        assert_relative_eq!(dy.virus, 1e11 - 5e6, max_relative = 1e-12);
        assert_relative_eq!(dy.interferon, 1e8 - 80.0, max_relative = 1e-12);
    }

    #[test]
    fn variants_differ_only_in_infected_balance() {
        let full = InfectionModel::new(rates(), ModelVariant::Full).derivative(5.0, &mid_infection());
        let reduced =
            InfectionModel::new(rates(), ModelVariant::Reduced).derivative(5.0, &mid_infection());

        assert_eq!(full.0.susceptible, reduced.0.susceptible);
        assert_eq!(full.0.refractory, reduced.0.refractory);
        assert_eq!(full.0.virus, reduced.0.virus);
        assert_eq!(full.0.interferon, reduced.0.interferon);
        assert_relative_eq!(
            reduced.0.infected - full.0.infected,
            0.01 * 1e8 * 40.0,
            max_relative = 1e-9
        );
    }

    #[test]
    fn reduced_model_ignores_clearance_rate() {
        let state = mid_infection();
        let base = InfectionModel::new(rates(), ModelVariant::Reduced);
        let boosted = InfectionModel::new(
            Rates {
                interferon_clearance_rate: 100.0,
                ..rates()
            },
            ModelVariant::Reduced,
        );
        assert_eq!(base.derivative(2.0, &state), boosted.derivative(2.0, &state));
    }

    #[test]
    fn call_rejects_non_finite_derivatives() {
        let model = InfectionModel::new(
            Rates {
                escalation_exponent: 1e6,
                ..rates()
            },
            ModelVariant::Full,
        );
        let input = ModelInput {
            time: 9.0,
            state: mid_infection(),
        };
        assert_eq!(model.call(input), Err(DynamicsError::NonFinite { time: 9.0 }));
    }

    #[test]
    fn integratable_round_trips_time_and_state() {
        let input = ModelInput {
            time: 2.5,
            state: mid_infection(),
        };
        let state = InfectionModel::extract_state(&input);
        assert_eq!(state.x, 2.5);
        assert_eq!(InfectionModel::apply_state(&input, state), input);
    }
}
