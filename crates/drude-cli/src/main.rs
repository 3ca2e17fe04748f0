mod cli;
mod config;
mod error;
mod logging;
mod script;

use crate::cli::Cli;
use crate::config::{FileConfig, Settings};
use crate::error::Result;
use clap::Parser;
use drudepp::workflows::polarize;
use tracing::{debug, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    info!("DRUDE++ CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&cli, file_config);

    let summary = polarize::run(&settings.request)?;
    info!(
        "added {} Drude particles: {} atoms in, {} atoms out, {} polarizable types",
        summary.ndrude, summary.atoms_in, summary.atoms_out, summary.ntypes
    );

    if let Some(path) = &settings.script {
        script::derive(path, &settings)?;
    }

    Ok(())
}
