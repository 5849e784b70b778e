//! colorizer CLI - Colorize grayscale photographs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use colorizer::pipeline::default_output_path;
use colorizer::{Config, ModelFiles, Pipeline};

/// Colorize a grayscale image with a pretrained Lab chrominance network.
#[derive(Parser, Debug)]
#[command(name = "colorizer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input image path.
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output image path. Defaults to `<input stem>_colorized.<ext>` next to the input.
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Directory holding colorization.json, colorization.onnx and pts_in_hull.npy.
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Topology document, overriding the one in the model directory.
    #[arg(long, value_name = "FILE")]
    topology: Option<PathBuf>,

    /// ONNX weights, overriding the ones in the model directory.
    #[arg(long, value_name = "FILE")]
    weights: Option<PathBuf>,

    /// Cluster-point table, overriding the one in the model directory.
    #[arg(long, value_name = "FILE")]
    points: Option<PathBuf>,

    /// Also write the original and colorized images side by side here.
    #[arg(long, value_name = "FILE")]
    comparison: Option<PathBuf>,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// ONNX Runtime intra-op threads.
    #[arg(long, value_name = "INT")]
    threads: Option<usize>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn model_files(&self) -> ModelFiles {
        let mut files = self
            .model_dir
            .as_ref()
            .map_or_else(ModelFiles::default, ModelFiles::in_dir);
        if let Some(path) = &self.topology {
            files.topology.clone_from(path);
        }
        if let Some(path) = &self.weights {
            files.weights.clone_from(path);
        }
        if let Some(path) = &self.points {
            files.cluster_points.clone_from(path);
        }
        files
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("colorizer={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    // Validate input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));

    let config = Config {
        model: args.model_files(),
        intra_threads: args.threads,
        output_quality: args.quality,
    };

    let pipeline = Pipeline::new(config).context("Failed to load colorization model")?;

    match &args.comparison {
        Some(comparison) => pipeline.process_with_comparison(&args.input, &output, comparison),
        None => pipeline.process(&args.input, &output),
    }
    .context("Failed to colorize image")?;

    println!(
        "Successfully colorized {} -> {}",
        args.input.display(),
        output.display()
    );

    Ok(())
}
