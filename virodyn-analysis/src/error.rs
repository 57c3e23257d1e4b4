use std::{io, path::PathBuf};

use thiserror::Error;
use virodyn_core::ModelVariant;
use virodyn_plot::PlotError;
use virodyn_solve::ode::SolverError;

use crate::config::ConfigError;

/// Errors that end an analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{model} model integration failed")]
    Integration {
        model: ModelVariant,
        #[source]
        source: SolverError,
    },

    #[error("failed to create output directory `{}`", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to render chart `{}`", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: PlotError,
    },
}
