use std::{error::Error, path::Path, process::ExitCode};

use virodyn_analysis::{AnalysisError, Config, config::CONFIG_FILE, pipeline};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            let mut source = err.source();
            while let Some(cause) = source {
                log::error!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AnalysisError> {
    let config = Config::load_or_builtin(Path::new(CONFIG_FILE))?;
    pipeline::run(&config, |number, path| {
        println!("Chart {number} saved: {}", path.display());
    })?;
    Ok(())
}
