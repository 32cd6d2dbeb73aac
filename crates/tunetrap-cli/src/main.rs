mod annotate;
mod config;
mod engine;
mod history;
mod render;
mod ring;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tunetrap_core::{DetectorConfig, EmotionDetector};
use tunetrap_hw::Camera;
use tunetrap_music::{FallbackTable, Resolver};

use annotate::Annotator;
use config::Config;
use engine::{FrameLoop, LoopStats, RunFlag, THREADED_PAUSE};
use render::Renderer;
use ring::SharedRing;

/// Results waiting for the renderer in threaded mode.
const RING_CAPACITY: usize = 2;
const CONSUMER_POLL: Duration = Duration::from_millis(50);

type LiveLoop = FrameLoop<Camera, EmotionDetector>;
type LiveRenderer = Renderer<std::io::Stdout>;

#[derive(Parser)]
#[command(name = "tunetrap", about = "Detect your mood from the camera and get music to match")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run live emotion detection on a camera
    Run(RunArgs),
    /// Classify a single image and print the result as JSON
    Classify {
        /// Image file to classify
        image: PathBuf,
        /// Write the annotated image here
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        detector: DetectorArgs,
    },
    /// Print music recommendations for an emotion label
    Recommend {
        /// Emotion label (e.g., "happy", "sad")
        label: String,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// List V4L2 capture devices
    Devices,
}

#[derive(Args)]
struct DetectorArgs {
    /// Detector mode: "heuristic" or "model"
    #[arg(long)]
    mode: Option<String>,
    /// Trained emotion model (ONNX)
    #[arg(long)]
    model: Option<PathBuf>,
}

#[derive(Args)]
struct SearchArgs {
    /// YouTube Data API key; without one the built-in list is used
    #[arg(long)]
    api_key: Option<String>,
    /// Number of live results to request
    #[arg(long)]
    max_results: Option<usize>,
}

#[derive(Args)]
struct RunArgs {
    /// V4L2 device path
    #[arg(short, long)]
    device: Option<String>,
    #[command(flatten)]
    detector: DetectorArgs,
    /// Classify every Nth frame
    #[arg(long)]
    skip: Option<u64>,
    /// Render on the capture thread instead of a separate one
    #[arg(long)]
    inline: bool,
    #[command(flatten)]
    search: SearchArgs,
    /// Write the latest annotated frame to this image file
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Run(args) => run_live(&config, args).await?,
        Commands::Classify {
            image,
            output,
            detector,
        } => classify_image(&config, &image, output, &detector)?,
        Commands::Recommend { label, search } => {
            let resolver = build_resolver(&config, &search)?;
            let recs = resolver.resolve(&label).await;
            let mut out = std::io::stdout().lock();
            writeln!(out, "Songs for {label}:")?;
            render::print_recommendations(&mut out, &recs)?;
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}

fn detector_config(config: &Config, args: &DetectorArgs) -> Result<DetectorConfig> {
    let mode = args.mode.as_deref().unwrap_or(&config.detector_mode);
    let emotion_model = args
        .model
        .clone()
        .unwrap_or_else(|| config.emotion_model_path().to_path_buf());
    DetectorConfig::new(
        mode,
        config.locator_model_path(),
        config.mesh_model_path(),
        Some(emotion_model),
    )
    .context("invalid detector configuration")
}

fn build_resolver(config: &Config, args: &SearchArgs) -> Result<Resolver> {
    let api_key = args.api_key.as_deref().or(config.youtube_api_key.as_deref());
    let max_results = args.max_results.unwrap_or(config.max_results);
    let mut resolver = Resolver::new(api_key, max_results);

    if let Some(path) = &config.fallback_table {
        let table = FallbackTable::load(path)
            .with_context(|| format!("failed to load fallback table {}", path.display()))?;
        resolver = resolver.with_table(table);
    }
    Ok(resolver)
}

fn classify_image(
    config: &Config,
    path: &Path,
    output: Option<PathBuf>,
    args: &DetectorArgs,
) -> Result<()> {
    let image = image::open(path)
        .with_context(|| format!("failed to read image {}", path.display()))?
        .to_rgb8();

    let mut detector = EmotionDetector::new(&detector_config(config, args)?)
        .context("failed to initialise emotion detector")?;
    let result = detector.detect(&image).context("classification failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(output) = output {
        let mut annotated = image;
        Annotator::new(config.font_path.as_deref()).annotate(&mut annotated, &result);
        annotated
            .save(&output)
            .with_context(|| format!("failed to write {}", output.display()))?;
        tracing::info!(path = %output.display(), "annotated image written");
    }
    Ok(())
}

async fn run_live(config: &Config, args: RunArgs) -> Result<()> {
    let detector = EmotionDetector::new(&detector_config(config, &args.detector)?)
        .context("failed to initialise emotion detector")?;

    let device = args.device.as_deref().unwrap_or(&config.camera_device);
    let camera = Camera::open(device).with_context(|| format!("failed to open camera {device}"))?;
    tracing::info!(
        device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera opened"
    );

    let resolver = build_resolver(config, &args.search)?;
    let renderer = Renderer::new(std::io::stdout(), resolver).with_snapshot(args.snapshot);

    let flag = RunFlag::new();
    let stop = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            stop.stop();
        }
    });

    let annotator = Annotator::new(config.font_path.as_deref());
    let skip = args.skip.unwrap_or(config.frame_skip);
    let frame_loop = FrameLoop::new(camera, detector, annotator, flag.clone(), skip);

    let stats = if args.inline {
        run_inline(frame_loop, renderer, &flag)
    } else {
        run_threaded(frame_loop, renderer, &flag).await?
    };

    println!(
        "Stopped after {} frames ({} classified, {} read failures)",
        stats.frames_read, stats.classified, stats.read_failures
    );
    Ok(())
}

/// Render each result on the loop thread as soon as it is published.
fn run_inline(frame_loop: LiveLoop, mut renderer: LiveRenderer, flag: &RunFlag) -> LoopStats {
    let handle = tokio::runtime::Handle::current();
    tokio::task::block_in_place(|| {
        frame_loop.run(|result| {
            if let Err(e) = handle.block_on(renderer.render(&result)) {
                tracing::warn!(error = %e, "render failed, stopping");
                flag.stop();
            }
        })
    })
}

/// Capture on its own thread; poll the ring and render what is there.
async fn run_threaded(
    frame_loop: LiveLoop,
    mut renderer: LiveRenderer,
    flag: &RunFlag,
) -> Result<LoopStats> {
    let ring = SharedRing::new(RING_CAPACITY);
    let capture = frame_loop
        .with_pause(THREADED_PAUSE)
        .spawn(ring.clone())
        .context("failed to spawn capture thread")?;

    loop {
        let finished = capture.is_finished();
        while let Some(result) = ring.pop() {
            if let Err(e) = renderer.render(&result).await {
                tracing::warn!(error = %e, "render failed, stopping");
                flag.stop();
            }
        }
        if finished {
            break;
        }
        tokio::time::sleep(CONSUMER_POLL).await;
    }

    capture.join().map_err(|_| anyhow!("capture thread panicked"))
}
