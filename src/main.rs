use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use story_compositor::{
    composition::{ExportOptions, RenderPipeline},
    config::Config,
    encode::{EncoderBackend, FfmpegBackend, RecordingBackend},
    scene::Manifest,
};

#[derive(Parser)]
#[command(
    name = "story-compositor",
    version,
    about = "Assemble narrated story scenes into a vertical video",
    long_about = "Story-Compositor turns a manifest of scenes (one image and one narration track each) into a single video with karaoke subtitles and an entrance transition per scene."
)]
struct Cli {
    /// Project manifest (TOML)
    #[arg(short, long)]
    manifest: PathBuf,

    /// Output video file path (defaults to a timestamped name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render without the subtitle overlay
    #[arg(long)]
    no_subtitles: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Render through the in-memory backend and print what would be encoded
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Story-Compositor v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli).await {
        error!("{}", e.user_message());
        return Err(e.into());
    }
    Ok(())
}

async fn run(cli: Cli) -> story_compositor::Result<()> {
    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    info!("Manifest: {:?}", cli.manifest);
    let manifest = Manifest::from_file(&cli.manifest)?;
    let timeout = Duration::from_secs(config.pipeline.alignment_timeout_secs);
    let scenes = manifest.load_scenes(None, timeout).await?;

    let options = ExportOptions {
        subtitles_enabled: !cli.no_subtitles,
        ..ExportOptions::default()
    };

    let mut next_mark = 10.0;
    let mut log_progress = move |percent: f64| {
        if percent >= next_mark {
            info!("   Progress: {:.0}%", percent);
            next_mark = (percent / 10.0).floor() * 10.0 + 10.0;
        }
    };

    if cli.dry_run {
        let backend = RecordingBackend::new();
        let pipeline = RenderPipeline::new(config, Arc::new(backend.clone()));
        let video = pipeline.export(&scenes, options, &mut log_progress).await?;

        info!("Dry run complete: {:.2}s of video", video.duration);
        print!("{}", backend.snapshot().summary());
        return Ok(());
    }

    let output = cli.output.unwrap_or_else(default_output_path);
    info!("Output: {:?}", output);

    let backend: Arc<dyn EncoderBackend> = Arc::new(FfmpegBackend::new());
    let pipeline = RenderPipeline::new(config, backend);
    let video = pipeline.export(&scenes, options, &mut log_progress).await?;

    video.save(&output)?;
    info!(
        "Export complete! {} scene(s), {:.2}s, saved to: {:?}",
        video.scenes_rendered, video.duration, output
    );
    Ok(())
}

fn default_output_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("story_{stamp}.mp4"))
}
