#[path = "modules/app.rs"]
mod app;
#[path = "modules/cli.rs"]
mod cli;
#[path = "modules/cube.rs"]
mod cube;
#[path = "modules/error.rs"]
mod error;
#[path = "modules/report.rs"]
mod report;
#[path = "modules/store.rs"]
mod store;

use clap::Parser;
use log::{info, warn};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.run.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    match app::run(&args) {
        Ok(app::RunOutcome::Skipped { key, store }) => {
            warn!(
                "Skipping because '{}' is already present in {}",
                key,
                store.display()
            );
            ExitCode::SUCCESS
        }
        Ok(app::RunOutcome::Stored { key, store }) => {
            info!("Results written to {}:espfit/{}", store.display(), key);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);

            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("Caused by: {}", s);
                source = s.source();
            }

            ExitCode::FAILURE
        }
    }
}
