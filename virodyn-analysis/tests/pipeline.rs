use std::path::Path;

use approx::assert_relative_eq;
use virodyn_analysis::{
    AnalysisError, Config, compare,
    pipeline::{self, Simulation},
    postprocess::{CellPopulations, DISPLAY_SCALE, VIRUS_FLOOR, log10_viral_load},
};
use virodyn_core::{ModelVariant, Rates, TimeGrid};
use virodyn_plot::{FigureSize, ImageFormat};

fn pony() -> Config {
    Config::pony().unwrap()
}

fn with_rates(config: &Config, f: impl FnOnce(Rates) -> Rates) -> Config {
    Config {
        parameters: config.parameters.with_rates(f),
        ..config.clone()
    }
}

fn simulate(config: &Config) -> Simulation {
    pipeline::simulate(config).unwrap()
}

#[test]
fn trajectories_start_at_the_initial_state() {
    let config = pony();
    let simulation = simulate(&config);

    for variant in ModelVariant::ALL {
        let trajectory = simulation.get(variant);
        assert_eq!(trajectory.len(), 1000);
        assert_eq!(trajectory.days()[0], 0.0);
        assert_eq!(trajectory.states()[0], config.parameters.initial);
        assert_relative_eq!(trajectory.days()[999], 10.0);
    }
}

#[test]
fn interferon_clearance_only_affects_the_full_model() {
    let base = pony();
    let boosted = with_rates(&base, |rates| Rates {
        interferon_clearance_rate: 5.0,
        ..rates
    });

    let a = simulate(&base);
    let b = simulate(&boosted);

    assert_eq!(a.reduced, b.reduced);
    assert_ne!(a.full, b.full);
}

#[test]
fn viral_load_rises_then_falls() {
    let simulation = simulate(&pony());

    for variant in ModelVariant::ALL {
        let trajectory = simulation.get(variant);
        let loads = log10_viral_load(trajectory);
        let days = trajectory.days();
        let peak = compare::peak(days, &loads).unwrap();
        let last = loads.len() - 1;

        assert!(
            peak.day > days[0] && peak.day < days[last],
            "{variant}: peak at day {}",
            peak.day
        );
        assert!(peak.log10_load > loads[0] + 1.0, "{variant}: no rise");
        assert!(loads[last] < peak.log10_load - 1.0, "{variant}: no decline");
    }
}

#[test]
fn steeper_escalation_clears_the_virus() {
    let config = with_rates(&pony(), |rates| Rates {
        escalation_exponent: 2.0,
        ..rates
    });
    let threshold = config.output.detection_threshold();
    let simulation = simulate(&config);

    for variant in ModelVariant::ALL {
        let trajectory = simulation.get(variant);
        let loads = log10_viral_load(trajectory);
        let cleared = compare::cleared_day(trajectory.days(), &loads, threshold);
        assert!(cleared.is_some_and(|day| day <= 10.0), "{variant} never cleared");
    }
}

#[test]
fn runs_are_deterministic() {
    let config = pony();
    assert_eq!(simulate(&config), simulate(&config));
}

#[test]
fn viral_loads_are_finite_and_floored() {
    let simulation = simulate(&pony());

    for variant in ModelVariant::ALL {
        let loads = log10_viral_load(simulation.get(variant));
        assert!(loads.iter().all(|load| load.is_finite()));
        assert!(loads.iter().all(|&load| load >= VIRUS_FLOOR.log10()));
    }
}

#[test]
fn populations_are_scaled_from_the_full_model() {
    let simulation = simulate(&pony());
    let populations = CellPopulations::from_trajectory(&simulation.full, DISPLAY_SCALE);

    assert_eq!(populations.total.len(), simulation.full.len());
    assert_relative_eq!(populations.susceptible[0], 1.0);
    for (i, state) in simulation.full.states().iter().enumerate() {
        assert_relative_eq!(populations.infected[i], state.infected / 1e11);
        assert_relative_eq!(
            populations.total[i],
            (state.susceptible + state.infected + state.refractory) / 1e11,
            max_relative = 1e-12
        );
    }
}

#[test]
fn numerical_failure_is_an_error_not_a_trajectory() {
    let config = with_rates(&pony(), |rates| Rates {
        escalation_exponent: 1e3,
        ..rates
    });

    let err = pipeline::simulate(&config).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Integration {
            model: ModelVariant::Full,
            ..
        }
    ));
}

/// The pony scenario on a coarse grid, rendered small into `dir`.
fn quick_config(dir: &Path) -> Config {
    let mut config = pony();
    config.grid = TimeGrid::in_days(0.0, 10.0, 200).unwrap();
    config.output.directory = dir.join("nested/results");
    config.output.figure = FigureSize {
        dpi: 72,
        ..FigureSize::default()
    };
    config
}

#[test]
fn run_writes_both_charts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = quick_config(dir.path());
    config.output.format = ImageFormat::Svg;

    let mut saved = Vec::new();
    let outcome = pipeline::run(&config, |number, path| saved.push((number, path.to_path_buf())))
        .unwrap();

    let expected = [
        config.output.directory.join("viral_load_comparison_pony.svg"),
        config.output.directory.join("cell_populations_pony.svg"),
    ];
    assert_eq!(outcome.charts, expected);
    assert_eq!(
        saved,
        vec![(1, expected[0].clone()), (2, expected[1].clone())]
    );
    for path in &expected {
        assert!(path.is_file(), "{} missing", path.display());
    }

    let summary = outcome.full_summary.unwrap();
    assert_eq!(summary.compared, 10);
    assert!(summary.rmse.is_some());

    // A second run reuses the existing directory.
    pipeline::run(&config, |_, _| {}).unwrap();
}

#[cfg(feature = "png")]
#[test]
fn default_run_writes_png_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path());
    assert_eq!(config.output.format, ImageFormat::Png);

    let outcome = pipeline::run(&config, |_, _| {}).unwrap();

    assert_eq!(
        outcome.charts,
        [
            config.output.directory.join("viral_load_comparison_pony.png"),
            config.output.directory.join("cell_populations_pony.png"),
        ]
    );
    for path in &outcome.charts {
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"), "{} is not a PNG", path.display());
    }
}
