use crate::CellState;

/// Rate constants of the infection model.
///
/// Rates are per day unless noted; `infection_rate` is per virion per day.
/// Field names disambiguate the source's single-letter keys, in particular the
/// two distinct "d" constants (`infected_death_rate` is `dI`,
/// `interferon_decay_rate` is `d`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    /// Infection rate, `b`.
    pub infection_rate: f64,
    /// Interferon-induced refractory conversion rate, `w`.
    pub refractory_rate: f64,
    /// Refractory to susceptible reversion rate, `r`.
    pub reversion_rate: f64,
    /// Baseline infected-cell death rate, `dI`.
    pub infected_death_rate: f64,
    /// Interferon-enhanced clearance of infected cells, `k`.
    pub interferon_clearance_rate: f64,
    /// Virus production per infected cell, `p`.
    pub virus_production_rate: f64,
    /// Free virus clearance rate, `c`.
    pub virus_clearance_rate: f64,
    /// Interferon production per infected cell, `q`.
    pub interferon_production_rate: f64,
    /// Interferon decay rate, `d`.
    pub interferon_decay_rate: f64,
    /// Time (days) after which the infected-cell death rate escalates, `mu`.
    pub escalation_onset: f64,
    /// Exponent of the death-rate escalation, `s`.
    pub escalation_exponent: f64,
}

/// An immutable bundle of rate constants and initial conditions.
///
/// Built once from configuration and passed by value into the dynamics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    pub rates: Rates,
    pub initial: CellState,
}

impl ParameterSet {
    /// Returns a copy with the rates replaced by `f(rates)`.
    ///
    /// Handy for sensitivity checks that vary a single constant.
    #[must_use]
    pub fn with_rates(self, f: impl FnOnce(Rates) -> Rates) -> Self {
        Self {
            rates: f(self.rates),
            ..self
        }
    }

    /// Returns every value paired with its configuration key.
    ///
    /// The order matches the configuration layout: initial conditions first,
    /// then rates.
    #[must_use]
    pub fn named_values(&self) -> [(&'static str, f64); 16] {
        let Rates {
            infection_rate,
            refractory_rate,
            reversion_rate,
            infected_death_rate,
            interferon_clearance_rate,
            virus_production_rate,
            virus_clearance_rate,
            interferon_production_rate,
            interferon_decay_rate,
            escalation_onset,
            escalation_exponent,
        } = self.rates;
        let CellState {
            susceptible,
            infected,
            refractory,
            virus,
            interferon,
        } = self.initial;

        [
            ("T0", susceptible),
            ("I0", infected),
            ("R0", refractory),
            ("V0", virus),
            ("F0", interferon),
            ("b", infection_rate),
            ("w", refractory_rate),
            ("r", reversion_rate),
            ("dI", infected_death_rate),
            ("k", interferon_clearance_rate),
            ("p", virus_production_rate),
            ("c", virus_clearance_rate),
            ("q", interferon_production_rate),
            ("d", interferon_decay_rate),
            ("mu", escalation_onset),
            ("s", escalation_exponent),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> ParameterSet {
        ParameterSet {
            rates: Rates {
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
            },
            initial: CellState::new(1e11, 0.0, 0.0, 1.0, 0.0),
        }
    }

    #[test]
    fn with_rates_leaves_initial_conditions_alone() {
        let base = parameters();
        let changed = base.with_rates(|rates| Rates {
            interferon_clearance_rate: 5.0,
            ..rates
        });

        assert_eq!(changed.initial, base.initial);
        assert_eq!(changed.rates.interferon_clearance_rate, 5.0);
        assert_eq!(changed.rates.infection_rate, base.rates.infection_rate);
    }

    #[test]
    fn named_values_keep_the_two_d_constants_apart() {
        let values = parameters().named_values();
        let lookup = |key: &str| {
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| *value)
        };

        assert_eq!(lookup("dI"), Some(2.0));
        assert_eq!(lookup("d"), Some(2.0));
        assert_eq!(lookup("T0"), Some(1e11));
        assert_eq!(lookup("s"), Some(1.0));
        assert_eq!(lookup("missing"), None);
    }
}
