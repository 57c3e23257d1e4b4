//! Run configuration loaded from TOML.
//!
//! Parsing goes through private `Raw*` types that mirror the file layout.
//! [`Config::from_toml_str`] then validates them into model types so that
//! every configuration error is raised before any integration starts.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use virodyn_core::{CellState, ParameterSet, Rates, TimeGrid, TimeGridError};
use virodyn_plot::{FigureSize, ImageFormat};
use virodyn_solve::ode::Method;

use crate::compare::Observation;

/// File name looked up in the working directory by [`Config::load_or_builtin`].
pub const CONFIG_FILE: &str = "virodyn.toml";

const PONY: &str = include_str!("../config/pony.toml");

/// A validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub parameters: ParameterSet,
    pub grid: TimeGrid,
    pub method: Method,
    pub observations: Vec<Observation>,
    pub output: OutputConfig,
}

/// Where and how charts are written.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub directory: PathBuf,

    /// Appended to chart file stems, as in `viral_load_comparison_<suffix>`.
    pub suffix: String,

    /// Label for the modeled subject, used in chart titles.
    pub subject: String,

    pub format: ImageFormat,
    pub figure: FigureSize,

    /// Detection limit in copies per mL.
    pub detection_limit: f64,
}

impl OutputConfig {
    /// The detection limit on the log10 scale used for viral loads.
    #[must_use]
    pub fn detection_threshold(&self) -> f64 {
        self.detection_limit.log10()
    }
}

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("`{field}` must be finite")]
    NonFinite { field: &'static str },

    #[error("invalid simulation grid")]
    Grid(#[from] TimeGridError),

    #[error("invalid tolerances: abs_tol = {abs_tol}, rel_tol = {rel_tol}")]
    Tolerance { abs_tol: f64, rel_tol: f64 },

    #[error("observed data has {days} days but {loads} loads")]
    ObservationLength { days: usize, loads: usize },

    #[error("output format `{format}` is not enabled in this build")]
    UnsupportedFormat { format: &'static str },

    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

impl Config {
    /// The built-in Pony 1 scenario.
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded file is invalid for this build.
    pub fn pony() -> Result<Self, ConfigError> {
        Self::from_toml_str(PONY)
    }

    /// Reads `path` if it exists, otherwise falls back to [`Config::pony`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is invalid.
    pub fn load_or_builtin(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("{} not found, using the built-in pony scenario", path.display());
            return Self::pony();
        }

        log::info!("loading configuration from {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error for TOML syntax errors, missing or unknown keys,
    /// non-numeric or non-finite values, and invalid grid, tolerance,
    /// observation, or output settings.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        raw.validate()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    parameters: RawParameters,
    #[serde(default)]
    simulation: RawSimulation,
    #[serde(default)]
    observed: RawObserved,
    #[serde(default)]
    output: RawOutput,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParameters {
    #[serde(rename = "T0")]
    t0: f64,
    #[serde(rename = "I0")]
    i0: f64,
    #[serde(rename = "R0")]
    r0: f64,
    #[serde(rename = "V0")]
    v0: f64,
    #[serde(rename = "F0")]
    f0: f64,
    b: f64,
    w: f64,
    r: f64,
    #[serde(rename = "dI")]
    d_i: f64,
    k: f64,
    p: f64,
    c: f64,
    q: f64,
    d: f64,
    mu: f64,
    s: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawSimulation {
    start_day: f64,
    end_day: f64,
    points: usize,
    method: MethodName,
    abs_tol: f64,
    rel_tol: f64,
}

impl Default for RawSimulation {
    fn default() -> Self {
        let (abs_tol, rel_tol) = Method::default().tolerances();
        Self {
            start_day: 0.0,
            end_day: 10.0,
            points: 1000,
            method: MethodName::Rosenbrock23,
            abs_tol,
            rel_tol,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MethodName {
    Rosenbrock23,
    Dopri5,
    Dop853,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawObserved {
    days: Vec<f64>,
    log10_load: Vec<f64>,
}

impl Default for RawObserved {
    fn default() -> Self {
        Self {
            days: (1..=10).map(f64::from).collect(),
            log10_load: vec![3.0, 6.0, 3.0, 4.0, 3.0, 3.0, 2.0, 0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawOutput {
    directory: PathBuf,
    suffix: String,
    subject: String,
    format: FormatName,
    dpi: u32,
    detection_limit: f64,
}

impl Default for RawOutput {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("results_pony"),
            suffix: "pony".to_string(),
            subject: "Pony 1".to_string(),
            format: FormatName::default(),
            dpi: FigureSize::default().dpi,
            detection_limit: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FormatName {
    Svg,
    Png,
}

impl Default for FormatName {
    fn default() -> Self {
        if cfg!(feature = "png") {
            FormatName::Png
        } else {
            FormatName::Svg
        }
    }
}

impl RawConfig {
    fn validate(self) -> Result<Config, ConfigError> {
        let parameters = self.parameters.validate()?;
        let (grid, method) = self.simulation.validate()?;
        let observations = self.observed.validate()?;
        let output = self.output.validate()?;

        Ok(Config {
            parameters,
            grid,
            method,
            observations,
            output,
        })
    }
}

impl RawParameters {
    fn validate(self) -> Result<ParameterSet, ConfigError> {
        let parameters = ParameterSet {
            rates: Rates {
                infection_rate: self.b,
                refractory_rate: self.w,
                reversion_rate: self.r,
                infected_death_rate: self.d_i,
                interferon_clearance_rate: self.k,
                virus_production_rate: self.p,
                virus_clearance_rate: self.c,
                interferon_production_rate: self.q,
                interferon_decay_rate: self.d,
                escalation_onset: self.mu,
                escalation_exponent: self.s,
            },
            initial: CellState::new(self.t0, self.i0, self.r0, self.v0, self.f0),
        };

        match parameters
            .named_values()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
        {
            Some((field, _)) => Err(ConfigError::NonFinite { field }),
            None => Ok(parameters),
        }
    }
}

impl RawSimulation {
    fn validate(self) -> Result<(TimeGrid, Method), ConfigError> {
        let grid = TimeGrid::in_days(self.start_day, self.end_day, self.points)?;

        let (abs_tol, rel_tol) = (self.abs_tol, self.rel_tol);
        let method = match self.method {
            MethodName::Rosenbrock23 => Method::Rosenbrock23 { abs_tol, rel_tol },
            MethodName::Dopri5 => Method::Dopri5 { abs_tol, rel_tol },
            MethodName::Dop853 => Method::Dop853 { abs_tol, rel_tol },
        };
        method
            .validate()
            .map_err(|_| ConfigError::Tolerance { abs_tol, rel_tol })?;

        Ok((grid, method))
    }
}

impl RawObserved {
    fn validate(self) -> Result<Vec<Observation>, ConfigError> {
        if self.days.len() != self.log10_load.len() {
            return Err(ConfigError::ObservationLength {
                days: self.days.len(),
                loads: self.log10_load.len(),
            });
        }
        if self.days.iter().any(|day| !day.is_finite()) {
            return Err(ConfigError::NonFinite { field: "days" });
        }
        if self.log10_load.iter().any(|load| !load.is_finite()) {
            return Err(ConfigError::NonFinite {
                field: "log10_load",
            });
        }

        Ok(self
            .days
            .into_iter()
            .zip(self.log10_load)
            .map(|(day, log10_load)| Observation { day, log10_load })
            .collect())
    }
}

impl RawOutput {
    fn validate(self) -> Result<OutputConfig, ConfigError> {
        let format = match self.format {
            FormatName::Svg => ImageFormat::Svg,
            #[cfg(feature = "png")]
            FormatName::Png => ImageFormat::Png,
            #[cfg(not(feature = "png"))]
            FormatName::Png => return Err(ConfigError::UnsupportedFormat { format: "png" }),
        };

        if self.dpi == 0 {
            return Err(ConfigError::NotPositive {
                field: "dpi",
                value: 0.0,
            });
        }
        if !self.detection_limit.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "detection_limit",
            });
        }
        if self.detection_limit <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "detection_limit",
                value: self.detection_limit,
            });
        }

        Ok(OutputConfig {
            directory: self.directory,
            suffix: self.suffix,
            subject: self.subject,
            format,
            figure: FigureSize {
                dpi: self.dpi,
                ..FigureSize::default()
            },
            detection_limit: self.detection_limit,
        })
    }
}
