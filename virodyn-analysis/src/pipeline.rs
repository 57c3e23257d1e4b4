//! The end-to-end run: integrate, post-process, compare, render.

use std::{
    fs,
    path::{Path, PathBuf},
};

use uom::si::time::day;
use virodyn_core::{
    CellState, Component, InfectionModel, ModelInput, ModelVariant, ParameterSet, TimeGrid,
};
use virodyn_solve::ode::{Method, Solver, SolverError, SolverInput};

use crate::{
    AnalysisError, Config, Trajectory,
    compare::{self, Summary},
    postprocess::{CellPopulations, DISPLAY_SCALE, log10_viral_load},
    report,
};

/// Trajectories of both model variants on the same grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub full: Trajectory,
    pub reduced: Trajectory,
}

impl Simulation {
    #[must_use]
    pub fn get(&self, variant: ModelVariant) -> &Trajectory {
        match variant {
            ModelVariant::Full => &self.full,
            ModelVariant::Reduced => &self.reduced,
        }
    }
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub simulation: Simulation,
    pub full_summary: Option<Summary>,
    pub reduced_summary: Option<Summary>,

    /// Written chart files, in rendering order.
    pub charts: Vec<PathBuf>,
}

/// Integrates one model variant from the parameter set's initial state.
///
/// # Errors
///
/// Returns the solver's error if integration fails.
pub fn integrate(
    parameters: &ParameterSet,
    variant: ModelVariant,
    grid: &TimeGrid,
    method: Method,
) -> Result<Trajectory, SolverError> {
    let solver: Solver<InfectionModel, { CellState::LEN }> =
        Solver::new(InfectionModel::new(parameters.rates, variant));
    let initial_conditions = ModelInput {
        time: grid.start().get::<day>(),
        state: parameters.initial,
    };

    let output = solver.call(SolverInput::new(initial_conditions, grid.days()).method(method))?;
    log::debug!(
        "{variant} model: {} component calls, {} accepted and {} rejected steps",
        output.stats.component_calls,
        output.stats.accepted_steps,
        output.stats.rejected_steps,
    );

    Ok(Trajectory::from_output(&output))
}

/// Integrates the full and reduced models with the configured settings.
///
/// # Errors
///
/// Returns [`AnalysisError::Integration`] naming the variant that failed.
pub fn simulate(config: &Config) -> Result<Simulation, AnalysisError> {
    let run = |model: ModelVariant| {
        integrate(&config.parameters, model, &config.grid, config.method)
            .map_err(|source| AnalysisError::Integration { model, source })
    };

    Ok(Simulation {
        full: run(ModelVariant::Full)?,
        reduced: run(ModelVariant::Reduced)?,
    })
}

/// Runs the whole analysis and writes both charts.
///
/// `on_saved` is called with the chart number (starting at 1) and path right
/// after each file is written.
///
/// # Errors
///
/// Returns an error if integration fails, the output directory cannot be
/// created, or a chart cannot be rendered.
pub fn run(config: &Config, mut on_saved: impl FnMut(usize, &Path)) -> Result<Outcome, AnalysisError> {
    log::info!(
        "simulating {} over {} points with {}",
        config.output.subject,
        config.grid.points(),
        config.method.name(),
    );
    let simulation = simulate(config)?;

    let full_log10 = log10_viral_load(&simulation.full);
    let reduced_log10 = log10_viral_load(&simulation.reduced);
    let populations = CellPopulations::from_trajectory(&simulation.full, DISPLAY_SCALE);

    let days = simulation.full.days();
    let threshold = config.output.detection_threshold();
    let full_summary = compare::summarize(days, &full_log10, &config.observations, threshold);
    let reduced_summary =
        compare::summarize(simulation.reduced.days(), &reduced_log10, &config.observations, threshold);
    log_summary(ModelVariant::Full, full_summary.as_ref());
    log_summary(ModelVariant::Reduced, reduced_summary.as_ref());

    let directory = &config.output.directory;
    fs::create_dir_all(directory).map_err(|source| AnalysisError::CreateDir {
        path: directory.clone(),
        source,
    })?;

    let subject = &config.output.subject;
    let suffix = &config.output.suffix;
    let charts = [
        (
            report::viral_load_stem(suffix),
            report::viral_load_chart(
                subject,
                days,
                &full_log10,
                &reduced_log10,
                &config.observations,
                config.output.detection_limit,
            ),
        ),
        (
            report::cell_populations_stem(suffix),
            report::cell_populations_chart(subject, days, &populations),
        ),
    ];

    let mut written = Vec::with_capacity(charts.len());
    for (number, (stem, chart)) in (1..).zip(charts) {
        let target = directory.join(stem);
        let path = chart
            .save(&target, config.output.format, config.output.figure)
            .map_err(|source| AnalysisError::Render {
                path: target.with_extension(config.output.format.extension()),
                source,
            })?;

        log::info!("wrote {}", path.display());
        on_saved(number, &path);
        written.push(path);
    }

    Ok(Outcome {
        simulation,
        full_summary,
        reduced_summary,
        charts: written,
    })
}

fn log_summary(variant: ModelVariant, summary: Option<&Summary>) {
    let Some(summary) = summary else {
        log::warn!("{variant} model: nothing to summarize");
        return;
    };

    let cleared = match summary.cleared_day {
        Some(cleared_on) => format!("below detection from day {cleared_on:.2}"),
        None => "never below detection".to_string(),
    };
    let rmse = match summary.rmse {
        Some(rmse) => format!("rmse {rmse:.3} over {} observations", summary.compared),
        None => "no observations inside the grid".to_string(),
    };

    log::info!(
        "{variant} model: peak log10 load {:.2} at day {:.2}, {cleared}, {rmse}",
        summary.peak.log10_load,
        summary.peak.day,
    );
}
