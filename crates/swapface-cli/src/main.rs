use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use swapface_engine::layout::{ensure_layout, list_images};
use swapface_engine::{Config, LogSink, Pipeline, PipelineRequest, QualityLevel, Worker};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swapface", about = "Swap the face from a source image onto a target image")]
struct Cli {
    /// Image providing the face
    #[arg(short, long, required_unless_present = "list")]
    source: Option<PathBuf>,

    /// Image receiving the face
    #[arg(short, long, required_unless_present = "list")]
    target: Option<PathBuf>,

    /// Also write the result here (format chosen by extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enhancement level: 1 = basic, 2 = HD, 3 = ultra HD
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=3))]
    quality: u8,

    /// Log pipeline steps
    #[arg(short, long)]
    verbose: bool,

    /// Print the result summary as JSON
    #[arg(long)]
    json: bool,

    /// List images in the data directory and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "swapface failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env();
    ensure_layout(&config).context("failed to create working directories")?;

    if cli.list {
        for name in list_images(&config.data_dir)? {
            println!("{name}");
        }
        return Ok(());
    }

    let (Some(source), Some(target)) = (cli.source, cli.target) else {
        bail!("--source and --target are required");
    };
    for (role, path) in [("source", &source), ("target", &target)] {
        if !path.is_file() {
            bail!("{role} image not found: {}", path.display());
        }
    }
    let quality = QualityLevel::try_from(cli.quality)?;

    provision(&config).await?;

    let pipeline = Pipeline::load(&config).context("failed to load models")?;
    let worker = Worker::spawn(pipeline)?;

    let request = PipelineRequest { source, target, quality };
    let result = worker.submit(request, Box::new(LogSink))?.wait().await?;

    if let Some(output) = &cli.output {
        copy_result(&result.image, output, config.jpeg_quality)?;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Result saved to {}", result.path.display());
        if let Some(output) = &cli.output {
            println!("Copied to {}", output.display());
        }
        println!(
            "Quality: {} | faces: {} source, {} target | {}x{} | {} ms",
            result.quality, result.source_faces, result.target_faces, result.width, result.height, result.elapsed_ms
        );
    }

    Ok(())
}

/// Fetch any missing pipeline model. Required models abort the run; the
/// cascade model is optional and only logs.
async fn provision(config: &Config) -> Result<()> {
    let options = config.provision_options();
    for spec in config.pipeline_models() {
        if swapface_models::ensure_model(spec, &config.model_dir, &options).await {
            continue;
        }
        if spec.required {
            bail!("model {} is unavailable", spec.name);
        }
        tracing::warn!(model = %spec.name, "optional model unavailable; face-guided enhancement disabled");
    }
    Ok(())
}

fn copy_result(image: &image::RgbImage, output: &Path, quality: u8) -> Result<()> {
    swapface_imaging::save_image(image, output, quality)
        .with_context(|| format!("failed to write {}", output.display()))
}
