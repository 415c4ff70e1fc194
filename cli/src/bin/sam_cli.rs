use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cli::{load_config, parse_bbox, parse_point, write_mask_overlay, ImageSource};
use color_eyre::eyre::{eyre, Result};
use schemars::schema_for;
use segment::{BoxPrompt, PredictionRequest, SegmentConfig, SegmentationService};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Interactive SAM segmentation from the command line", long_about = None)]
struct Cli {
    /// TOML or JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Model to load instead of the configured default
    #[arg(short, long, global = true)]
    model: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List models whose checkpoints are installed
    Models {
        /// Include models whose checkpoints are missing
        #[arg(long)]
        all: bool,
    },
    /// Show which model is loaded and on which device
    Status,
    /// Segment the object inside a box
    Predict {
        /// Path to the input image
        #[arg(short, long)]
        image: PathBuf,
        /// Bounding box as x_min,y_min,x_max,y_max
        #[arg(short, long, value_parser = parse_bbox)]
        bbox: [f32; 4],
        /// Point inside the object as x,y (repeatable)
        #[arg(long = "pos", value_parser = parse_point)]
        positive: Vec<[f32; 2]>,
        /// Point outside the object as x,y (repeatable)
        #[arg(long = "neg", value_parser = parse_point)]
        negative: Vec<[f32; 2]>,
        /// Simplification factor, in thousandths of the contour perimeter
        #[arg(short, long)]
        epsilon: Option<f64>,
        /// Write the mask overlay to this PNG file
        #[arg(long)]
        mask_out: Option<PathBuf>,
        /// Embed the base64 mask overlay in the JSON output
        #[arg(long)]
        return_mask: bool,
    },
    /// Segment every object matching a text prompt
    Text {
        /// Path to the input image
        #[arg(short, long)]
        image: PathBuf,
        /// What to look for, e.g. "dog"
        #[arg(short, long)]
        prompt: String,
        #[arg(short, long)]
        epsilon: Option<f64>,
    },
    /// Print the JSON schema of a prediction request
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Schema = cli.command {
        return print_json(&schema_for!(PredictionRequest));
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.default_model = model.clone();
    }
    let service = SegmentationService::from_config(&config).await?;

    match &cli.command {
        Commands::Models { all } => print_json(&service.list_models(*all)),
        Commands::Status => print_json(&service.status()),
        Commands::Predict {
            image,
            bbox,
            positive,
            negative,
            epsilon,
            mask_out,
            return_mask,
        } => {
            let prompt = BoxPrompt {
                bbox: *bbox,
                positive: positive.clone(),
                negative: negative.clone(),
            };
            predict(
                &service,
                &config,
                image,
                prompt,
                epsilon.unwrap_or(config.default_epsilon),
                mask_out.as_deref(),
                *return_mask,
            )
            .await
        }
        Commands::Text { image, prompt, epsilon } => {
            let loaded = ImageSource::from_config(&config).load(image)?;
            let results = service
                .predict_text(
                    Arc::new(loaded.image),
                    loaded.id,
                    prompt.clone(),
                    epsilon.unwrap_or(config.default_epsilon),
                )
                .await?;
            let found = results.iter().filter(|r| !r.has_error()).count();
            info!(prompt = %prompt, found, "text prediction complete");
            print_json(&results)
        }
        Commands::Schema => Err(eyre!("schema is handled before the service starts")),
    }
}

async fn predict(
    service: &SegmentationService,
    config: &SegmentConfig,
    image_path: &Path,
    prompt: BoxPrompt,
    epsilon: f64,
    mask_out: Option<&Path>,
    return_mask: bool,
) -> Result<()> {
    let loaded = ImageSource::from_config(config).load(image_path)?;
    if loaded.image.dimensions() != loaded.original_size {
        warn!(
            original = ?loaded.original_size,
            resized = ?loaded.image.dimensions(),
            "image was downscaled, prompt coordinates are used as given"
        );
    }

    let status = service.status();
    if !status.loaded {
        warn!("no model loaded, using placeholder masks");
    }

    let result = service
        .predict(Arc::new(loaded.image), loaded.id, prompt, epsilon, return_mask)
        .await?;

    if let Some(path) = mask_out {
        write_mask_overlay(&result.mask, config.mask_color, path)?;
        info!(path = %path.display(), "mask overlay written");
    }

    info!(
        vertices = result.polygon.len(),
        area = result.area,
        score = result.score,
        elapsed_ms = result.inference_time_ms,
        "prediction complete"
    );
    print_json(&result)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

