//! scriptfx CLI
//!
//! Command-line front end for the effect script host.

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::info;

use scriptfx::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("scriptfx v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("scriptfx v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Info { script, no_imports } => commands::show_info(&script, no_imports),
        Commands::Bank { path, json } => commands::show_bank(&path, json),
        Commands::Render {
            script,
            input,
            output,
            block_size,
            sliders,
        } => commands::render(&script, &input, &output, block_size, &sliders),
    }
}
