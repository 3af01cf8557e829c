use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::GrayImage;
use tracing_subscriber::EnvFilter;

use pyrflow_core::img::frame::Frame;
use pyrflow_core::img::pyramid::build_pyramid;
use pyrflow_core::track::dense::FlowField;
use pyrflow_core::track::lk::{LkTracker, TrackerConfig};
use pyrflow_core::track::seed::{GfttConfig, GfttDetector};

mod output;
mod render;

#[derive(Parser)]
#[command(
    name = "pyrflow",
    about = "Pyramidal Lucas-Kanade optical flow toolkit",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect good-features-to-track corners in one image.
    Corners(CornersArgs),
    /// Detect corners in the first image and track them into the second.
    Track(TrackArgs),
    /// Dense optical flow between two images, rendered as a needle map.
    Flow(FlowArgs),
}

#[derive(Args)]
struct CornerOpts {
    /// Upper bound on detected corners.
    #[arg(long, default_value_t = 500)]
    max_corners: usize,
    /// Quality threshold relative to the best corner, in (0, 1].
    #[arg(long, default_value_t = 0.01)]
    quality: f32,
    /// Minimum spacing between corners, in pixels.
    #[arg(long, default_value_t = 8.0)]
    min_distance: f32,
}

impl CornerOpts {
    fn to_config(&self) -> GfttConfig {
        GfttConfig {
            max_corners: self.max_corners,
            quality_level: self.quality,
            min_distance: self.min_distance,
        }
    }
}

#[derive(Args)]
struct TrackerOpts {
    /// Side of the square tracking window, odd.
    #[arg(long, default_value_t = 21)]
    win_size: u32,
    /// Number of pyramid levels above the base image.
    #[arg(long, default_value_t = 3)]
    max_level: u32,
    /// Iteration cap per pyramid level.
    #[arg(long, default_value_t = 30)]
    iters: u32,
    /// Convergence threshold on the per-iteration update, in pixels.
    #[arg(long, default_value_t = 0.01)]
    epsilon: f32,
}

impl TrackerOpts {
    fn to_config(&self) -> TrackerConfig {
        TrackerConfig {
            win_size: self.win_size,
            max_level: self.max_level,
            iters: self.iters,
            epsilon: self.epsilon,
            ..TrackerConfig::default()
        }
    }
}

#[derive(Args)]
struct CornersArgs {
    /// Input image.
    #[arg(long)]
    input: PathBuf,
    #[command(flatten)]
    corners: CornerOpts,
    /// Write detections as JSON.
    #[arg(long)]
    json: Option<PathBuf>,
    /// Write a PNG with detections circled.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

#[derive(Args)]
struct TrackArgs {
    /// Previous frame.
    #[arg(long)]
    prev: PathBuf,
    /// Current frame.
    #[arg(long)]
    curr: PathBuf,
    #[command(flatten)]
    corners: CornerOpts,
    #[command(flatten)]
    tracker: TrackerOpts,
    /// Write per-track results as JSON.
    #[arg(long)]
    json: Option<PathBuf>,
    /// Write a PNG with track segments drawn over the current frame.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

#[derive(Args)]
struct FlowArgs {
    /// Previous frame.
    #[arg(long)]
    prev: PathBuf,
    /// Current frame.
    #[arg(long)]
    curr: PathBuf,
    #[command(flatten)]
    tracker: TrackerOpts,
    /// Output needle-map PNG.
    #[arg(long)]
    needle: PathBuf,
    /// Grid spacing between needles, in pixels.
    #[arg(long, default_value_t = 8)]
    step: u32,
    /// Length multiplier applied to each needle.
    #[arg(long, default_value_t = 2.0)]
    scale: f32,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();

    match Cli::parse().command {
        Command::Corners(args) => run_corners(args),
        Command::Track(args) => run_track(args),
        Command::Flow(args) => run_flow(args),
    }
}

fn load_image(path: &Path) -> Result<(Frame, GrayImage)> {
    let gray = image::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .to_luma8();
    let frame = Frame::from_luma8(&gray)?;
    Ok((frame, gray))
}

fn save_canvas(canvas: &image::RgbImage, path: &Path) -> Result<()> {
    canvas
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn run_corners(args: CornersArgs) -> Result<()> {
    let (frame, gray) = load_image(&args.input)?;
    let detector = GfttDetector::new(args.corners.to_config())?;
    let corners = detector.detect(&frame);
    println!("{} corners in {}", corners.len(), args.input.display());

    if let Some(path) = &args.json {
        let records: Vec<output::CornerRecord> =
            corners.iter().map(output::CornerRecord::from).collect();
        output::write_json(path, &records)?;
    }
    if let Some(path) = &args.overlay {
        let mut canvas = render::grayscale_canvas(&gray);
        render::draw_corners(&mut canvas, &corners);
        save_canvas(&canvas, path)?;
    }
    Ok(())
}

fn run_track(args: TrackArgs) -> Result<()> {
    let (prev_frame, _) = load_image(&args.prev)?;
    let (curr_frame, curr_gray) = load_image(&args.curr)?;

    let detector = GfttDetector::new(args.corners.to_config())?;
    let corners = detector.detect(&prev_frame);
    let seeds: Vec<_> = corners.iter().map(|c| c.position).collect();

    let config = args.tracker.to_config();
    let tracker = LkTracker::new(config)?;
    let prev_pyramid = build_pyramid(&prev_frame, config.max_level);
    let curr_pyramid = build_pyramid(&curr_frame, config.max_level);
    let results = tracker.track(&prev_pyramid, &curr_pyramid, &seeds)?;

    let found = results.iter().filter(|r| r.found()).count();
    println!(
        "tracked {found}/{} corners from {} into {}",
        results.len(),
        args.prev.display(),
        args.curr.display()
    );

    if let Some(path) = &args.json {
        let records: Vec<output::TrackRecord> = corners
            .iter()
            .zip(&results)
            .map(|(corner, result)| output::TrackRecord::new(corner, result))
            .collect();
        output::write_json(path, &records)?;
    }
    if let Some(path) = &args.overlay {
        let mut canvas = render::grayscale_canvas(&curr_gray);
        render::draw_tracks(&mut canvas, &corners, &results);
        save_canvas(&canvas, path)?;
    }
    Ok(())
}

fn run_flow(args: FlowArgs) -> Result<()> {
    let (prev_frame, _) = load_image(&args.prev)?;
    let (curr_frame, curr_gray) = load_image(&args.curr)?;

    let tracker = LkTracker::new(args.tracker.to_config())?;
    let flow = tracker.dense_from_frames(&prev_frame, &curr_frame)?;

    let (mean, max) = flow_stats(&flow);
    println!(
        "dense flow {}x{}: mean |d| {:.2}px, max |d| {:.2}px",
        flow.width(),
        flow.height(),
        mean,
        max
    );

    let mut canvas = render::grayscale_canvas(&curr_gray);
    render::draw_needles(&mut canvas, &flow, args.step, args.scale);
    save_canvas(&canvas, &args.needle)
}

fn flow_stats(flow: &FlowField) -> (f32, f32) {
    let mut sum = 0.0f64;
    let mut max = 0.0f32;
    for (u, v) in flow.u().iter().zip(flow.v()) {
        let magnitude = (u * u + v * v).sqrt();
        sum += f64::from(magnitude);
        max = max.max(magnitude);
    }
    let count = flow.u().len().max(1);
    ((sum / count as f64) as f32, max)
}
