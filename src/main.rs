//! Opto + Fiber packaging command
//!
//! ```bash
//! optofiber --input-directory /data/ --output-directory /results/
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use optofiber::{package_session, ContainerWriter};

/// Settings for Opto + Fiber packaging
#[derive(Parser, Debug)]
#[command(name = "optofiber")]
#[command(version, about = "Package an opto + fiber photometry session", long_about = None)]
struct Settings {
    /// Directory where data is
    #[arg(long, env = "INPUT_DIRECTORY", default_value = "/data/")]
    input_directory: PathBuf,

    /// Output directory
    #[arg(long, env = "OUTPUT_DIRECTORY", default_value = "/results/")]
    output_directory: PathBuf,

    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() {
    let settings = Settings::parse();

    let log_level = match settings.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {}", e);
    }

    if let Err(e) = run(&settings) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(settings: &Settings) -> optofiber::Result<()> {
    let container = package_session(&settings.input_directory)?;

    let path = ContainerWriter::path_for(&settings.output_directory, &container.session_id);
    info!(path = %path.display(), "finished packaging, saving container");

    let mut writer = ContainerWriter::create(&path)?;
    writer.write_container(&container)?;
    writer.finalize()?;

    info!("finished saving container with timeseries and event data");
    Ok(())
}
