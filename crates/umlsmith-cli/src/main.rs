//! umlsmith CLI entry point.

use std::{process, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};

use umlsmith_cli::{Args, error_adapter::to_reportables};

fn main() {
    // Panics render through miette like every other failure
    miette::set_panic_hook();

    // The api key is read here, once; nothing below looks at the environment for it
    let args = Args::parse();

    // An unknown --log-level falls back to warn
    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'warn' instead.",
            args.log_level
        );
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    info!(log_level:?; "Starting umlsmith");
    debug!(args:?; "Parsed arguments");

    // A failed envelope has already been written when run returns its error
    if let Err(err) = umlsmith_cli::run(&args) {
        let reporter = miette::GraphicalReportHandler::new();

        // Encoding errors carry their own source snippet
        for reportable in to_reportables(&err) {
            let mut writer = String::new();
            reporter
                .render_report(&mut writer, &reportable)
                .expect("Writing to String buffer is infallible");

            error!("{writer}");
        }

        process::exit(1);
    }

    info!("Completed successfully");
}
