// Render a single frame of one scene to PNG, for checking layout and
// transitions without running an encoder

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;

use story_compositor::{
    composition::{frame_count, SceneFrameComposer},
    config::Config,
    scene::Manifest,
    subtitle::{FontRasterizer, SubtitleRenderer},
    transition::TransitionRenderer,
    video::{Frame, ImageLoader},
};

#[derive(Parser)]
#[command(name = "preview_frame", about = "Render one frame of one scene to PNG")]
struct Args {
    /// Project manifest (TOML)
    #[arg(short, long)]
    manifest: PathBuf,

    /// Zero-based scene index
    #[arg(short, long, default_value_t = 0)]
    scene: usize,

    /// Time within the scene, in seconds
    #[arg(short, long, default_value_t = 0.0)]
    time: f64,

    /// PNG file to write
    #[arg(short, long, default_value = "preview.png")]
    output: PathBuf,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    println!("🖼️  Previewing scene {} at {:.2}s", args.scene, args.time);

    let manifest = Manifest::from_file(&args.manifest)?;
    let timeout = Duration::from_secs(config.pipeline.alignment_timeout_secs);
    let scenes = manifest.load_scenes(None, timeout).await?;
    let scene = scenes
        .get(args.scene)
        .ok_or_else(|| anyhow!("manifest has {} scene(s), no scene {}", scenes.len(), args.scene))?;

    let image = ImageLoader::load(scene.index, scene.image.clone()).await?;

    let subtitles = if config.subtitles.enabled {
        let rasterizer = FontRasterizer::load(config.subtitles.font_path.as_deref())?;
        Some(SubtitleRenderer::new(Arc::new(rasterizer), config.subtitles.clone()))
    } else {
        None
    };
    let composer = SceneFrameComposer::new(TransitionRenderer::new(config.video.render_threads)?, subtitles);
    let context = composer.prepare(scene, image, &scene.word_timings, config.video.width);

    let fps = config.video.fps;
    let total_frames = frame_count(scene.duration(), fps).max(1);
    let frame_index = ((args.time.max(0.0) * f64::from(fps)) as usize).min(total_frames - 1);
    let scene_time = frame_index as f64 / f64::from(fps);

    let mut frame = Frame::new_black(config.video.width, config.video.height);
    composer.render_frame(&mut frame, &context, frame_index, total_frames, scene_time, true);
    frame.save_png(&args.output)?;

    info!(
        "Frame {}/{} ({} transition, {} subtitle line(s)) written to {:?}",
        frame_index + 1,
        total_frames,
        context.transition,
        context.lines.len(),
        args.output
    );
    Ok(())
}
