use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contour_core::surgery::validate_proportions;
use contour_core::{
    analyze_face_structure, regions, FeatureType, Point3D, SurgeryConfig, SurgeryEngine, FACE_MESH_LANDMARKS,
};
use contour_track::{ImageDirSource, ReplayDetector, TrackerConfig, TrackingScheduler};
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "contour", version, about = "Landmark-driven face warping and tracking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a surgery config to an image
    Warp {
        #[arg(long)]
        image: PathBuf,
        /// JSON array of {x, y, z} landmarks
        #[arg(long)]
        landmarks: PathBuf,
        /// TOML surgery config
        #[arg(long)]
        config: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Adjust a single feature and warp the image
    Feature {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        landmarks: PathBuf,
        /// nose, eyes, jawline or cheekbones
        #[arg(long, value_parser = parse_feature)]
        feature: FeatureType,
        /// Adjustment in [-1, 1]
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Replay recorded detections over a frame directory
    Track {
        /// Directory of frame images, read in name order
        #[arg(long)]
        frames: PathBuf,
        /// JSON array of {frame, detection} records
        #[arg(long)]
        detections: PathBuf,
        /// TOML tracker config (CONTOUR_* env vars override)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print face region centers and areas
    Regions {
        #[arg(long)]
        landmarks: PathBuf,
    },
    /// Classify face, eye and lip shape and score symmetry
    Analyze {
        #[arg(long)]
        landmarks: PathBuf,
    },
}

fn parse_feature(s: &str) -> Result<FeatureType, String> {
    FeatureType::parse(s).ok_or_else(|| format!("unknown feature '{s}' (expected nose, eyes, jawline or cheekbones)"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Warp {
            image,
            landmarks,
            config,
            output,
        } => run_warp(&image, &landmarks, &config, &output),
        Commands::Feature {
            image,
            landmarks,
            feature,
            amount,
            output,
        } => run_feature(&image, &landmarks, feature, amount, &output),
        Commands::Track {
            frames,
            detections,
            config,
        } => run_track(&frames, &detections, config.as_deref()),
        Commands::Regions { landmarks } => run_regions(&landmarks),
        Commands::Analyze { landmarks } => run_analyze(&landmarks),
    }
}

fn load_landmarks(path: &Path) -> Result<Vec<Point3D>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading landmarks {}", path.display()))?;
    let landmarks: Vec<Point3D> =
        serde_json::from_str(&text).with_context(|| format!("parsing landmarks {}", path.display()))?;
    if landmarks.len() != FACE_MESH_LANDMARKS {
        tracing::warn!(
            got = landmarks.len(),
            expected = FACE_MESH_LANDMARKS,
            "incomplete face mesh; output will match input"
        );
    }
    Ok(landmarks)
}

fn load_image(path: &Path) -> Result<image::RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("opening image {}", path.display()))?
        .to_rgb8())
}

fn run_warp(image: &Path, landmarks: &Path, config: &Path, output: &Path) -> Result<()> {
    let img = load_image(image)?;
    let landmarks = load_landmarks(landmarks)?;
    let text = std::fs::read_to_string(config).with_context(|| format!("reading config {}", config.display()))?;
    let config: SurgeryConfig = toml::from_str(&text).with_context(|| format!("parsing config {}", config.display()))?;

    let result = SurgeryEngine::new().apply_config(&img, &landmarks, &config);
    result
        .image
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;

    let summary = json!({
        "output": output.display().to_string(),
        "applied_features": result.applied_features,
        "natural_score": result.natural_score,
        "natural": result.is_natural(contour_core::surgery::DEFAULT_NATURAL_THRESHOLD),
        "proportions_valid": validate_proportions(&result.modified_landmarks),
        "processing_ms": result.processing_time.as_secs_f64() * 1000.0,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_feature(image: &Path, landmarks: &Path, feature: FeatureType, amount: f64, output: &Path) -> Result<()> {
    let img = load_image(image)?;
    let landmarks = load_landmarks(landmarks)?;
    let warped = contour_core::warp_feature(&img, &landmarks, feature, amount);
    warped
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(%feature, amount, output = %output.display(), "feature warp written");
    Ok(())
}

fn run_track(frames: &Path, detections: &Path, config: Option<&Path>) -> Result<()> {
    let config = match config {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("loading tracker config {}", path.display()))?
            .with_env_overrides(),
        None => TrackerConfig::from_env(),
    };

    let source = ImageDirSource::open(frames).context("opening frame directory")?;
    let detector = ReplayDetector::load(detections, source.cursor()).context("loading detections")?;
    let mut scheduler = TrackingScheduler::new(source, detector, config);

    let mut faces = 0usize;
    let mut total = 0usize;
    for tracked in scheduler.by_ref() {
        total += 1;
        if tracked.has_face() {
            faces += 1;
        }
        let line = json!({
            "frame": tracked.frame_number,
            "timestamp_ms": tracked.timestamp.as_secs_f64() * 1000.0,
            "strategy": tracked.strategy,
            "has_face": tracked.has_face(),
            "bbox": tracked.detection.as_ref().map(|d| d.bbox),
            "quality": tracked.tracking_quality,
            "stable": tracked.is_stable,
            "tracking": tracked.is_tracking,
            "confidence": tracked.tracking_confidence,
            "lost_frames": tracked.lost_frames,
            "skip": tracked.skip_frames_used,
        });
        println!("{line}");
    }

    tracing::info!(
        frames = total,
        faces,
        avg_ms = scheduler.stats().avg_processing_time().as_secs_f64() * 1000.0,
        fps = scheduler.stats().fps(),
        final_skip = scheduler.schedule().current_skip,
        "tracking finished"
    );
    Ok(())
}

fn run_regions(landmarks: &Path) -> Result<()> {
    let landmarks = load_landmarks(landmarks)?;
    let regions = regions::face_regions(&landmarks);
    if regions.is_empty() {
        anyhow::bail!(
            "need {FACE_MESH_LANDMARKS} landmarks to derive regions, got {}",
            landmarks.len()
        );
    }

    let mut names: Vec<&String> = regions.keys().collect();
    names.sort();
    let out: serde_json::Map<String, serde_json::Value> = names
        .into_iter()
        .map(|name| {
            let r = &regions[name];
            (
                name.clone(),
                json!({
                    "center": { "x": r.center.x, "y": r.center.y },
                    "area": r.area,
                    "points": r.points.len(),
                    "bbox": r.bounding_box(),
                }),
            )
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn run_analyze(landmarks: &Path) -> Result<()> {
    let landmarks = load_landmarks(landmarks)?;
    let analysis = analyze_face_structure(&landmarks);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
