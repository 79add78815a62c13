//! Tileflow CLI - Command-line interface
//!
//! Drives the tileflow library outside a renderer: inspect the tiles a view
//! would request, or load a view end to end and report what happened.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tileflow::logging::{
    init_console_logging, init_logging, DEFAULT_LOG_FILE, DEFAULT_LOG_FILTER,
};

use commands::pyramid::PyramidArgs;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tileflow")]
#[command(version = tileflow::VERSION)]
#[command(about = "Tile lifecycle tooling for map layers", long_about = None)]
struct Cli {
    /// JSON config file with `layer`, `source` and loader sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON layer file, replacing the config file's layer section
    #[arg(long, global = true)]
    layer: Option<PathBuf>,

    /// Also write logs to this directory (tileflow.log)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tiles a view would request, in load order
    Pyramid {
        /// Visible rectangle as left,top,right,bottom in layer coordinates
        #[arg(
            long,
            value_delimiter = ',',
            num_args = 4,
            allow_negative_numbers = true,
            required = true
        )]
        bounds: Vec<f64>,

        /// Camera zoom as a scale denominator
        #[arg(long)]
        zoom: f64,

        /// Time step
        #[arg(long, default_value = "0")]
        t: i32,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Load a view through a source and report readiness and metrics
    Simulate {
        /// Visible rectangle as left,top,right,bottom in layer coordinates
        #[arg(
            long,
            value_delimiter = ',',
            num_args = 4,
            allow_negative_numbers = true,
            required = true
        )]
        bounds: Vec<f64>,

        /// Camera zoom as a scale denominator
        #[arg(long)]
        zoom: f64,

        /// Time step
        #[arg(long, default_value = "0")]
        t: i32,

        /// Directory to load tiles from (first in the loader chain)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Base URL to fetch tiles from when the file loader has none
        #[arg(long)]
        http_base_url: Option<String>,

        /// Worker threads for loading and decoding
        #[arg(long, default_value = "4")]
        workers: usize,

        /// Give up if the layer has not settled after this many seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,

        /// Force a reload once the first load settles
        #[arg(long)]
        reload: bool,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { DEFAULT_LOG_FILTER };
    let logging = match &cli.log_dir {
        Some(dir) => init_logging(dir, DEFAULT_LOG_FILE, filter),
        None => init_console_logging(filter),
    };
    let _logging_guard = match logging {
        Ok(guard) => guard,
        Err(e) => CliError::from(e).exit(),
    };

    tracing::debug!(version = tileflow::VERSION, "tileflow CLI starting");

    let result = match cli.command {
        Commands::Pyramid { bounds, zoom, t, json } => commands::pyramid::run(PyramidArgs {
            config: cli.config,
            layer: cli.layer,
            bounds,
            zoom,
            t,
            json,
        }),
        Commands::Simulate {
            bounds,
            zoom,
            t,
            root,
            http_base_url,
            workers,
            timeout_secs,
            reload,
            json,
        } => commands::simulate::run(SimulateArgs {
            config: cli.config,
            layer: cli.layer,
            root,
            http_base_url,
            bounds,
            zoom,
            t,
            workers,
            timeout_secs,
            reload,
            json,
        }),
    };

    if let Err(e) = result {
        e.exit();
    }
}
