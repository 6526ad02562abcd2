//! CLI Module
//!
//! Command-line interface for the masterchain mastering pipeline.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::presets::DEFAULT_PRESET_NAME;

/// Masterchain - offline mastering for spoken word and music
#[derive(Parser, Debug)]
#[command(name = "masterchain")]
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
    /// Master an audio file
    #[command(name = "master")]
    Master {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file (mono, 24-bit)
        output: PathBuf,

        /// Preset name
        #[arg(short, long, default_value = DEFAULT_PRESET_NAME)]
        preset: String,

        /// JSON preset file (built-in presets if omitted or missing)
        #[arg(long)]
        presets: Option<PathBuf>,

        /// Override the preset's loudness target (LUFS)
        #[arg(long, allow_hyphen_values = true)]
        target_lufs: Option<f32>,
    },

    /// List available presets
    #[command(name = "presets")]
    Presets {
        /// JSON preset file (built-in presets if omitted or missing)
        #[arg(long)]
        presets: Option<PathBuf>,
    },

    /// Print level and loudness measurements of an audio file
    #[command(name = "analyze")]
    Analyze {
        /// Input WAV file
        input: PathBuf,
    },
}
