//! labelfuse CLI: reconcile precomputed predictor rasters into instance labels.

mod precomputed;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use labelfuse::fusion::{expand_labels, locate_roi};
use labelfuse::raster::{image_to_field, image_to_labels, labels_to_luma16, mask_to_gray};
use labelfuse::{Layout, Predictors, ReconcileConfig, Reconciler};

use precomputed::{FlowRaster, InstanceRaster, Precomputed, RoiRaster, SemanticRaster};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "labelfuse")]
#[command(about = "Fuse semantic, instance and flow predictions into one instance labelling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile precomputed predictor outputs for a 2D image.
    Reconcile(CliReconcileArgs),

    /// Grow labels of a 16-bit label image into the background.
    Expand {
        /// Input label raster (8- or 16-bit grayscale).
        #[arg(long)]
        labels: PathBuf,

        /// Maximum growth distance in pixels.
        #[arg(long)]
        distance: f64,

        /// Output 16-bit label raster.
        #[arg(long)]
        out: PathBuf,
    },

    /// Print the default configuration as JSON.
    PrintConfig,
}

#[derive(Debug, Clone, Args)]
struct CliReconcileArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Semantic foreground probability raster.
    #[arg(long)]
    semantic: Option<PathBuf>,

    /// Instance label raster (8- or 16-bit).
    #[arg(long)]
    instances: Option<PathBuf>,

    /// Instance probability raster; defaults to the instance foreground.
    #[arg(long, requires = "instances")]
    instance_prob: Option<PathBuf>,

    /// Flow-based instance label raster (8- or 16-bit).
    #[arg(long)]
    flow_labels: Option<PathBuf>,

    /// Flow probability/magnitude raster; defaults to the flow foreground.
    #[arg(long, requires = "flow_labels")]
    flow_field: Option<PathBuf>,

    /// Region-of-interest probability raster.
    #[arg(long)]
    roi: Option<PathBuf>,

    /// JSON configuration file (partial files are accepted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum object size in pixels.
    #[arg(long)]
    min_size: Option<usize>,

    /// Maximum object size in pixels.
    #[arg(long)]
    max_size: Option<usize>,

    /// Duplicate-suppression overlap threshold.
    #[arg(long)]
    nms_thresh: Option<f32>,

    /// Disable label expansion.
    #[arg(long)]
    no_expand: bool,

    /// Directory for labels.png, mask.png, skeleton.png, markers.png and summary.json.
    #[arg(long)]
    out_dir: PathBuf,
}

impl CliReconcileArgs {
    fn to_config(&self) -> CliResult<ReconcileConfig> {
        let mut config = match &self.config {
            Some(path) => ReconcileConfig::from_json_file(path)?,
            None => ReconcileConfig::default(),
        };
        if let Some(min_size) = self.min_size {
            config.clean.min_size = min_size;
            config.semantic.min_size = min_size;
        }
        if let Some(max_size) = self.max_size {
            config.clean.max_size = max_size;
            config.semantic.max_size = max_size;
        }
        if let Some(nms_thresh) = self.nms_thresh {
            config.nms.nms_thresh = nms_thresh;
        }
        if self.no_expand {
            config.expand.enable = false;
        }
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile(args) => run_reconcile(&args),
        Commands::Expand {
            labels,
            distance,
            out,
        } => run_expand(&labels, distance, &out),
        Commands::PrintConfig => run_print_config(),
    }
}

fn open_image(path: &Path) -> CliResult<image::DynamicImage> {
    image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })
}

fn load_labels(path: &Path) -> CliResult<labelfuse::LabelImage> {
    Ok(image_to_labels(&open_image(path)?)?)
}

fn load_field(path: &Path) -> CliResult<labelfuse::ProbabilityField> {
    Ok(image_to_field(&open_image(path)?))
}

// ── reconcile ──────────────────────────────────────────────────────────

fn run_reconcile(args: &CliReconcileArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());
    let image = load_field(&args.image)?;
    tracing::info!("Image size: {}x{}", image.shape()[1], image.shape()[0]);
    let config = args.to_config()?;

    let roi = args.roi.as_deref().map(load_field).transpose()?;
    // the pipeline crops to the same window, so precomputed rasters follow it
    let window = match &roi {
        Some(field) => locate_roi(field, image.shape())?.map(|loc| loc.bbox),
        None => None,
    };
    let raster = |path: &Path| -> CliResult<Precomputed<f32>> {
        Ok(Precomputed::new(load_field(path)?, window.clone()))
    };
    let label_raster = |path: &Path| -> CliResult<Precomputed<u32>> {
        Ok(Precomputed::new(load_labels(path)?, window.clone()))
    };

    let semantic = args.semantic.as_deref().map(raster).transpose()?.map(SemanticRaster);
    let instances = match &args.instances {
        Some(path) => Some(InstanceRaster {
            labels: label_raster(path)?,
            probability: args.instance_prob.as_deref().map(raster).transpose()?,
        }),
        None => None,
    };
    let flow = match &args.flow_labels {
        Some(path) => Some(FlowRaster {
            labels: label_raster(path)?,
            field: args.flow_field.as_deref().map(raster).transpose()?,
        }),
        None => None,
    };
    let roi = roi.map(RoiRaster);

    let mut predictors = Predictors::default();
    if let Some(p) = &semantic {
        predictors = predictors.with_semantic(p);
    }
    if let Some(p) = &instances {
        predictors = predictors.with_instance(p);
    }
    if let Some(p) = &flow {
        predictors = predictors.with_flow(p);
    }
    if let Some(p) = &roi {
        predictors = predictors.with_roi(p);
    }

    let reconciler = Reconciler::new(config);
    let result = reconciler.reconcile(&image, Layout::Yx, &predictors)?;
    let summary = result.summary();
    tracing::info!(
        "Reconciled {} instances (semantic={}, instance={}, flow={})",
        summary.instance_count,
        summary.stages.semantic,
        summary.stages.instance,
        summary.stages.flow,
    );

    std::fs::create_dir_all(&args.out_dir)?;
    if let Some(labels) = &result.instance_labels {
        labels_to_luma16(labels)?.save(args.out_dir.join("labels.png"))?;
    }
    if let Some(mask) = &result.semantic_mask {
        mask_to_gray(mask)?.save(args.out_dir.join("mask.png"))?;
    }
    if let Some(skeleton) = &result.skeleton {
        mask_to_gray(skeleton)?.save(args.out_dir.join("skeleton.png"))?;
    }
    if let Some(markers) = &result.markers {
        labels_to_luma16(markers)?.save(args.out_dir.join("markers.png"))?;
    }
    let json = serde_json::to_string_pretty(&summary)?;
    let summary_path = args.out_dir.join("summary.json");
    std::fs::write(&summary_path, &json)?;
    tracing::info!("Results written to {}", args.out_dir.display());

    Ok(())
}

// ── expand ─────────────────────────────────────────────────────────────

fn run_expand(labels_path: &Path, distance: f64, out: &Path) -> CliResult<()> {
    if distance.is_nan() || distance < 0.0 {
        return Err(format!("distance must be non-negative, got {}", distance).into());
    }
    let labels = load_labels(labels_path)?;
    let expanded = expand_labels(&labels, distance);
    labels_to_luma16(&expanded)?.save(out)?;
    tracing::info!("Expanded labels written to {}", out.display());
    Ok(())
}

// ── print-config ───────────────────────────────────────────────────────

fn run_print_config() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&ReconcileConfig::default())?);
    Ok(())
}
