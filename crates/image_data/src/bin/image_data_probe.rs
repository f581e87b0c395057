//! image_data_probe - sets up an image data layer from a JSON config and
//! prints a summary of the first few batches it produces.

use anyhow::{Context, Result};
use clap::Parser;
use image_data::{ImageDataConfig, ImageDataLayer};
use std::path::PathBuf;
use std::time::Instant;
use tch::{Device, Kind};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "image_data_probe")]
#[command(version, about = "Load a few batches through an image data layer", long_about = None)]
struct CliArgs {
    /// Layer configuration (JSON)
    config: PathBuf,

    /// Override the manifest path from the config
    #[arg(short = 's', long = "source")]
    source: Option<PathBuf>,

    /// Override the batch size from the config
    #[arg(short = 'b', long = "batch-size")]
    batch_size: Option<usize>,

    /// Number of batches to pull
    #[arg(short = 'n', long = "batches", default_value_t = 3)]
    batches: usize,

    /// Copy each batch to the first CUDA device when one is available
    #[arg(long = "cuda")]
    cuda: bool,

    /// Debug-level logging (per-batch timings, wraparounds)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Errors only
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_names(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")
}

fn run(args: CliArgs) -> Result<()> {
    let mut config = ImageDataConfig::from_json_file(&args.config)?;
    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }

    let setup_timer = Instant::now();
    let layer = ImageDataLayer::setup(config)?;
    info!(
        "Layer ready in {} ms: {} entries, data {:?}, labels {:?}",
        setup_timer.elapsed().as_millis(),
        layer.len(),
        layer.data_shape(),
        layer.label_shape()
    );

    let device = if args.cuda {
        Device::cuda_if_available()
    } else {
        Device::Cpu
    };

    for index in 0..args.batches {
        let timer = Instant::now();
        let prefetched = layer.next_batch()?;
        let batch = prefetched.to_device(device);
        let wait_ms = timer.elapsed().as_millis();

        let mean = batch.data.mean(Kind::Float).double_value(&[]);
        let label_mode = layer.label_mode();
        let labels = if label_mode.is_multi_label() {
            let set = batch.label.ne(0.0).sum(Kind::Int64).int64_value(&[]);
            let slots = batch.batch_size() * label_mode.width() as i64;
            format!("{set} of {slots} label slots set")
        } else {
            let values: Vec<f32> = Vec::try_from(batch.label.view(&[-1]).to_device(Device::Cpu))?;
            format!("{values:?}")
        };
        println!(
            "batch {index}: data {:?} on {:?} mean {mean:.3}, labels {labels} (waited {wait_ms} ms)",
            batch.data.size(),
            batch.data.device()
        );
    }
    Ok(())
}

fn main() {
    let args = CliArgs::parse();
    if let Err(err) = setup_logging(args.verbose, args.quiet) {
        eprintln!("{err:#}");
    }

    if let Err(err) = run(args) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
