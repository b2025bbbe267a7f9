//! CLI Module
//!
//! Command-line interface for inspecting and running effect scripts.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// scriptfx - effect script host
#[derive(Parser, Debug)]
#[command(name = "scriptfx")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a script's header and sliders as JSON
    #[command(name = "info")]
    Info {
        /// Path to the script
        script: PathBuf,

        /// Do not resolve imports
        #[arg(long)]
        no_imports: bool,
    },

    /// List the presets of a bank file
    #[command(name = "bank")]
    Bank {
        /// Path to the .rpl file
        path: PathBuf,

        /// Print the full bank as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a WAV file through a script
    #[command(name = "render")]
    Render {
        /// Path to the script
        script: PathBuf,

        /// Input WAV file
        input: PathBuf,

        /// Output WAV file (32-bit float)
        output: PathBuf,

        /// Frames per processing block
        #[arg(short, long, default_value_t = 512)]
        block_size: usize,

        /// Slider overrides as INDEX=VALUE (1-based index)
        #[arg(short, long = "slider")]
        sliders: Vec<String>,
    },
}
