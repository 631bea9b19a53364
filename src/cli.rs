use adforge::Preset;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "adforge")]
#[command(author, version, about = "Chained remote media pipelines for short ad videos")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline on the given inputs and download the result
    Run(RunArgs),

    /// Download an artifact by locator without re-running any stage
    Download {
        /// Locator of the artifact (URL or backend path)
        #[arg(required = true)]
        locator: String,

        /// Directory to write the artifact to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List built-in pipeline presets
    Presets,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Args)]
pub struct RunArgs {
    /// Built-in pipeline to run
    #[arg(short, long, value_enum, conflicts_with = "spec", required_unless_present = "spec")]
    pub preset: Option<Preset>,

    /// Pipeline spec file (TOML or JSON)
    #[arg(short, long)]
    pub spec: Option<PathBuf>,

    /// Input locator; repeat for the clips of a concat pipeline
    #[arg(short, long = "input", value_name = "LOCATOR")]
    pub inputs: Vec<String>,

    /// Stop after the pipeline completes; print the final locator only
    #[arg(long)]
    pub no_download: bool,

    /// Directory to write the final artifact to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}
