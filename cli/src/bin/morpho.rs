use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use morpho_cli::{config_schema, MeasureConfig, StdinPrompt};
use morphometry::{
    write_results_csv, BackgroundPolarity, BatchRunner, BatchSpec, MaskParams, ScanAxis,
    Segmentation, ThresholdPrompt, DEFAULT_THRESHOLD,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Measure object widths along their length", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure a batch described by a configuration file
    Run {
        /// Path to the TOML or JSON configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Measure a batch described on the command line
    Measure {
        /// Directory holding the images named in the batch file
        #[arg(short, long)]
        images: PathBuf,
        /// CSV with ID, LENGTH, MIN_WIDTH and MAX_WIDTH columns
        #[arg(short, long)]
        batch: PathBuf,
        /// Results CSV to write
        #[arg(short, long)]
        output: PathBuf,
        /// Background polarity for automatic segmentation (black or light)
        #[arg(short, long, conflicts_with = "threshold")]
        polarity: Option<BackgroundPolarity>,
        /// Confirm a manual threshold interactively, starting at this value
        #[arg(short, long, num_args = 0..=1, default_missing_value = "15")]
        threshold: Option<u8>,
        /// Give up on an image after this many rejected previews
        #[arg(long, conflicts_with = "polarity")]
        max_attempts: Option<usize>,
        /// Directory for interactive preview images (a temp directory when omitted)
        #[arg(long, conflicts_with = "polarity")]
        preview_dir: Option<PathBuf>,
        /// Axis the object's length runs along after alignment
        #[arg(long, default_value = "horizontal")]
        axis: ScanAxis,
        /// Worker threads (defaults to all cores)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Print the JSON Schema of the configuration file
    Schema,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = MeasureConfig::from_file(&config)?;
            run_measurement(config)?;
        }
        Commands::Measure {
            images,
            batch,
            output,
            polarity,
            threshold,
            max_attempts,
            preview_dir,
            axis,
            workers,
        } => {
            let segmentation = match (polarity, threshold) {
                (_, Some(initial_threshold)) => Segmentation::Interactive { initial_threshold, max_attempts },
                (Some(polarity), None) => Segmentation::Automatic { polarity, params: MaskParams::default() },
                (None, None) => {
                    warn!(
                        "No --polarity or --threshold given; confirming thresholds interactively from {}",
                        DEFAULT_THRESHOLD
                    );
                    Segmentation::Interactive { initial_threshold: DEFAULT_THRESHOLD, max_attempts }
                }
            };
            run_measurement(MeasureConfig {
                image_dir: images,
                batch,
                output,
                segmentation,
                axis,
                workers,
                preview_dir,
            })?;
        }
        Commands::Schema => {
            println!("{}", config_schema()?);
        }
    }

    Ok(())
}

fn run_measurement(config: MeasureConfig) -> Result<()> {
    config.validate()?;
    info!("Batch file: {}", config.batch.display());
    info!("Image directory: {}", config.image_dir.display());

    let spec = BatchSpec::from_csv_path(&config.batch)?;

    let prompt = match &config.segmentation {
        Segmentation::Interactive { .. } => Some(interactive_prompt(&config.image_dir, &config.preview_dir())?),
        Segmentation::Automatic { polarity, .. } => {
            info!("Automatic segmentation, {} background", polarity);
            None
        }
    };
    let source = config.segmentation.clone().into_source(prompt);

    let report = BatchRunner::new(source, &config.image_dir)
        .with_axis(config.axis)
        .with_workers(config.workers)
        .run(&spec)?;

    for skipped in &report.skipped {
        warn!("Skipped row {} ({}): {}", skipped.row, skipped.image_id, skipped.reason);
    }

    write_results_csv(&config.output, &report.results)?;
    info!(
        "✅ Measured {} of {} images, results saved to {}",
        report.results.len(),
        spec.len(),
        config.output.display()
    );
    Ok(())
}

fn interactive_prompt(image_dir: &Path, preview_dir: &Path) -> Result<Box<dyn ThresholdPrompt>> {
    std::fs::create_dir_all(preview_dir)?;
    info!("Previews will be saved to {}", preview_dir.display());
    Ok(Box::new(StdinPrompt::new(image_dir, preview_dir)))
}
