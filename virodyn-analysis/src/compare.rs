//! Descriptive comparison of a modeled viral-load series with observations.
//!
//! Nothing here fits parameters. The summary only reports how a fixed
//! trajectory lines up with the data.

/// One observed viral load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub day: f64,
    pub log10_load: f64,
}

/// Highest point of a log10 viral-load series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub day: f64,
    pub log10_load: f64,
}

/// How one modeled series compares with the observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub peak: Peak,

    /// First grid day after the peak with a load below the detection
    /// threshold.
    pub cleared_day: Option<f64>,

    /// Root-mean-square log10 error at the observation days inside the grid.
    pub rmse: Option<f64>,

    /// Number of observations that contributed to `rmse`.
    pub compared: usize,
}

/// Summarizes a series sampled at `days`.
///
/// Returns `None` if the series is empty or its length differs from `days`.
#[must_use]
pub fn summarize(
    days: &[f64],
    log10_load: &[f64],
    observations: &[Observation],
    threshold: f64,
) -> Option<Summary> {
    if days.len() != log10_load.len() {
        return None;
    }
    let peak = peak(days, log10_load)?;
    let residuals = residuals(days, log10_load, observations);

    Some(Summary {
        peak,
        cleared_day: cleared_day(days, log10_load, threshold),
        rmse: rms(&residuals),
        compared: residuals.len(),
    })
}

/// The first maximum of the series.
#[must_use]
pub fn peak(days: &[f64], log10_load: &[f64]) -> Option<Peak> {
    days.iter()
        .zip(log10_load)
        .fold(None, |best: Option<Peak>, (&day, &load)| match best {
            Some(peak) if peak.log10_load >= load => Some(peak),
            _ => Some(Peak {
                day,
                log10_load: load,
            }),
        })
}

/// The first day after the peak at which the load is below `threshold`.
#[must_use]
pub fn cleared_day(days: &[f64], log10_load: &[f64], threshold: f64) -> Option<f64> {
    let peak_index = log10_load
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &load)| match best {
            Some((_, max)) if max >= load => best,
            _ => Some((i, load)),
        })?
        .0;

    days.iter()
        .zip(log10_load)
        .skip(peak_index + 1)
        .find(|&(_, &load)| load < threshold)
        .map(|(&day, _)| day)
}

/// Root-mean-square difference between the interpolated series and each
/// observation inside the grid.
#[must_use]
pub fn rmse(days: &[f64], log10_load: &[f64], observations: &[Observation]) -> Option<f64> {
    rms(&residuals(days, log10_load, observations))
}

fn residuals(days: &[f64], log10_load: &[f64], observations: &[Observation]) -> Vec<f64> {
    observations
        .iter()
        .filter_map(|obs| {
            interpolate(days, log10_load, obs.day).map(|model| model - obs.log10_load)
        })
        .collect()
}

fn rms(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    Some((values.iter().map(|v| v * v).sum::<f64>() / n).sqrt())
}

/// Linear interpolation on an increasing grid; `None` outside it.
fn interpolate(days: &[f64], values: &[f64], x: f64) -> Option<f64> {
    let (&first, &last) = (days.first()?, days.last()?);
    if !(first..=last).contains(&x) {
        return None;
    }

    let i = days.partition_point(|&day| day < x);
    if i == 0 {
        return values.first().copied();
    }
    let (x0, x1) = (days[i - 1], days[i]);
    let (&y0, &y1) = (values.get(i - 1)?, values.get(i)?);
    Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
}
