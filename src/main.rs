//! meshview - free-fly viewer for OBJ triangle meshes
//!
//! Loads one or more geometry files, draws them shaded with a wireframe
//! overlay and lets the user fly around with WASD and the mouse.
//! Left Shift cycles the movement speed, F1 picks a new set of files.

mod app;
mod assets;
mod config;
mod render;
mod scene;

use app::{RfdSelector, ViewerError};
use assets::ParseMode;
use clap::Parser;
use config::ViewerConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "meshview", version, about = "Free-fly viewer for OBJ triangle meshes")]
struct Cli {
    /// Geometry files to open; a file dialog is shown when none are given
    files: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reject malformed numbers and out-of-range faces instead of repairing them
    #[arg(long)]
    strict: bool,
}

fn load_config(cli: &Cli) -> Result<ViewerConfig, ViewerError> {
    let mut config = match &cli.config {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            ViewerConfig::load_from_file(path)?
        }
        None => ViewerConfig::default(),
    };
    if cli.strict {
        config.parse_mode = ParseMode::Strict;
    }
    Ok(config)
}

fn try_main(cli: Cli) -> Result<(), ViewerError> {
    let config = load_config(&cli)?;
    let mut selector = RfdSelector::new();
    let paths = app::initial_selection(cli.files, &mut selector)?;
    app::run(config, paths, selector)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match try_main(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
