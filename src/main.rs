use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use compile_dataset::output::write_dataset;
use compile_dataset::shell::run_shell;
use compile_dataset::{compile_directory, CompileOptions, CoordinateDecl};

#[derive(Debug, Parser)]
#[command(
    name = "compile-dataset",
    about = "Compile timestamped CSV snapshots into a labeled multi-dimensional dataset",
    after_help = "Every <stem>.csv in PATH needs a sibling <stem>.headers carrying a Last-Modified line."
)]
struct Cli {
    /// Directory of <stem>.csv / <stem>.headers pairs
    #[arg(long)]
    path: PathBuf,

    /// Open an interactive shell on the compiled dataset
    #[arg(long)]
    interact: bool,

    /// Write the dataset here (.parquet or .json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Field whose distinct values form an axis (repeatable, axis order)
    #[arg(long = "dim", value_name = "FIELD")]
    dims: Vec<String>,

    /// Field constant per value of a dimension (repeatable)
    #[arg(long = "coord-to-dim", value_name = "COORD:DIM")]
    coord_to_dim: Vec<CoordinateDecl>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let options = CompileOptions::new(cli.dims, cli.coord_to_dim);
    let dataset = compile_directory(&cli.path, &options)
        .with_context(|| format!("compiling {}", cli.path.display()))?;
    info!("compiled dataset with shape {:?}", dataset.shape());

    if cli.interact {
        run_shell(&dataset)?;
    }

    if let Some(output) = &cli.output {
        write_dataset(output, &dataset)?;
    }

    Ok(())
}
