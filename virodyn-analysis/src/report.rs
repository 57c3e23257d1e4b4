//! The two diagnostic charts.

use std::ops::Range;

use virodyn_plot::{Chart, Color, LineStyle};

use crate::{compare::Observation, postprocess::CellPopulations};

const VIRAL_LOAD_RANGE: Range<f64> = 0.0..8.0;
const POPULATION_RANGE: Range<f64> = 0.0..3.5;

/// File stem of the viral load chart.
#[must_use]
pub fn viral_load_stem(suffix: &str) -> String {
    format!("viral_load_comparison_{suffix}")
}

/// File stem of the cell population chart.
#[must_use]
pub fn cell_populations_stem(suffix: &str) -> String {
    format!("cell_populations_{suffix}")
}

/// Viral loads of both models against the observations and detection limit.
///
/// `detection_limit` is in copies per mL; the line is drawn at its log10.
#[must_use]
pub fn viral_load_chart(
    subject: &str,
    days: &[f64],
    full: &[f64],
    reduced: &[f64],
    observations: &[Observation],
    detection_limit: f64,
) -> Chart {
    let observed: Vec<[f64; 2]> = observations
        .iter()
        .map(|obs| [obs.day, obs.log10_load])
        .collect();

    Chart::new(&format!("Model comparison with viral load data for {subject}"))
        .x_axis("Time (days)", day_range(days))
        .y_axis("log10 copies NS per mL", VIRAL_LOAD_RANGE)
        .add_series(
            "Full model",
            &points(days, full),
            Color::Red,
            LineStyle::Solid,
        )
        .add_series(
            "Reduced model",
            &points(days, reduced),
            Color::Green,
            LineStyle::Dashed,
        )
        .add_markers("Viral load data", &observed, Color::Red)
        .add_hline(
            &format!("Detection limit ({detection_limit} RNA copies/mL)"),
            detection_limit.log10(),
            Color::Blue,
            LineStyle::Dashed,
        )
}

/// Cell populations predicted by the full model.
#[must_use]
pub fn cell_populations_chart(subject: &str, days: &[f64], populations: &CellPopulations) -> Chart {
    Chart::new(&format!(
        "Cell populations predicted by the full model for {subject}"
    ))
    .x_axis("Time (days)", day_range(days))
    .y_axis("Cells (x 1e11)", POPULATION_RANGE)
    .add_series(
        "Susceptible cells",
        &points(days, &populations.susceptible),
        Color::Blue,
        LineStyle::Solid,
    )
    .add_series(
        "Infected cells",
        &points(days, &populations.infected),
        Color::Green,
        LineStyle::Solid,
    )
    .add_series(
        "Refractory cells",
        &points(days, &populations.refractory),
        Color::Red,
        LineStyle::Dashed,
    )
    .add_series(
        "Total cells",
        &points(days, &populations.total),
        Color::Black,
        LineStyle::Dotted,
    )
}

fn points(days: &[f64], values: &[f64]) -> Vec<[f64; 2]> {
    days.iter().zip(values).map(|(&x, &y)| [x, y]).collect()
}

fn day_range(days: &[f64]) -> Range<f64> {
    match (days.first(), days.last()) {
        (Some(&start), Some(&end)) if start < end => start..end,
        _ => 0.0..1.0,
    }
}
