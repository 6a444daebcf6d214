//! pagesmith - build-pipeline orchestrator for static single-page sites.

mod actor;
mod cli;
mod config;
mod core;
mod embed;
mod logger;
mod pipeline;
mod reload;
mod stages;
mod utils;

use std::process::ExitCode;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, build::build_site, serve::DevServerController};
use config::SiteConfig;
use core::ModeProfile;
use pipeline::{BuildInputs, PipelineAssembler};
use stages::Toolchain;

fn main() -> Result<ExitCode> {
    // Before anything blocks
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }
    logger::set_verbose(cli.verbose);

    let config = SiteConfig::load(&cli)?;

    match &cli.command {
        Commands::Build { .. } => {
            let ok = build_site(&config)?;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Serve { debug, .. } => {
            serve(&config, *debug)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn serve(config: &SiteConfig, debug: bool) -> Result<()> {
    let assembler = PipelineAssembler::new(
        BuildInputs::from_config(config),
        ModeProfile::development(debug),
    );
    // Surface configuration errors before binding anything
    let pipeline = assembler.assemble()?;
    let mut watch_dirs = config.watch_dirs();
    watch_dirs.extend(pipeline.force_watched());

    DevServerController::new(assembler, config.serve.clone())
        .with_toolchain(Toolchain::from_config(&config.build))
        .with_watch_dirs(watch_dirs)
        .start()
}
