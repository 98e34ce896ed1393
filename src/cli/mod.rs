//! Command-line interface for the burn event pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::processors::pipeline::{self, TileStatus};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "burn-events")]
#[command(about = "Group burn-date rasters into wildfire events", version = crate::VERSION)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides shared by every classifying subcommand.
#[derive(clap::Args, Debug)]
struct Thresholds {
    /// Spatial search radius, in cells
    #[arg(long)]
    spatial_param: Option<usize>,
    /// Temporal search radius, in days
    #[arg(long)]
    temporal_param: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single tile and write its event table
    Classify {
        /// Tile id, e.g. h08v05
        tile: String,
        #[command(flatten)]
        thresholds: Thresholds,
        /// Recompute even if the tile already has a table
        #[arg(long)]
        force: bool,
    },

    /// Classify all tiles, then stitch them into one event table
    Build {
        /// Only process these tiles (repeatable)
        #[arg(short, long = "tile")]
        tiles: Vec<String>,
        #[command(flatten)]
        thresholds: Thresholds,
        /// Tiles classified concurrently
        #[arg(short, long)]
        workers: Option<usize>,
        /// Output CSV (defaults to paths.output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stitch existing per-tile tables without classifying
    Stitch {
        /// Only stitch these tiles (repeatable)
        #[arg(short, long = "tile")]
        tiles: Vec<String>,
        #[command(flatten)]
        thresholds: Thresholds,
        /// Output CSV (defaults to paths.output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the default configuration to a YAML file
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn apply_thresholds(config: &mut PipelineConfig, spatial: Option<usize>, temporal: Option<u32>) {
    if let Some(sp) = spatial {
        config.classification.spatial_param = sp;
    }
    if let Some(tp) = temporal {
        config.classification.temporal_param = tp;
    }
}

/// Stop with an error if the effective configuration is unusable.
fn validate_or_exit(config: &PipelineConfig) {
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Classify { tile, thresholds, force } => {
            cmd_classify(&tile, thresholds, force, config);
        }
        Commands::Build { tiles, thresholds, workers, output } => {
            cmd_build(tiles, thresholds, workers, output, config);
        }
        Commands::Stitch { tiles, thresholds, output } => {
            cmd_stitch(tiles, thresholds, output, config);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&path);
        }
    }
}

fn cmd_classify(tile: &str, thresholds: Thresholds, force: bool, mut config: PipelineConfig) {
    let start = Instant::now();
    apply_thresholds(&mut config, thresholds.spatial_param, thresholds.temporal_param);
    validate_or_exit(&config);

    let paths = &config.paths;
    if !force && pipeline::table_is_current(&paths.tables_dir, tile, &config.classification) {
        println!("{}: event table already exists (use --force to recompute)", tile);
        return;
    }

    println!("Classifying tile {}...", tile);
    println!("Burn directory: {}", paths.burn_dir.display());
    println!(
        "Thresholds: {} cells, {} days",
        config.classification.spatial_param, config.classification.temporal_param
    );

    let spinner = create_spinner("Assigning detections to events...");

    match pipeline::classify_tile(&paths.burn_dir, &paths.tables_dir, tile, &config.classification) {
        Ok(table) => {
            spinner.finish_and_clear();
            let edge_rows = table.rows.iter().filter(|r| r.edge).count();

            print_summary(
                "Tile Classification Complete",
                &[
                    ("Tile", tile.to_string()),
                    ("Events", table.event_count().to_string()),
                    ("Detections", table.rows.len().to_string()),
                    ("Edge detections", edge_rows.to_string()),
                    ("Output directory", paths.tables_dir.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Classification of {} failed: {}", tile, e);
            std::process::exit(1);
        }
    }
}

fn cmd_build(
    tiles: Vec<String>,
    thresholds: Thresholds,
    workers: Option<usize>,
    output: Option<PathBuf>,
    mut config: PipelineConfig,
) {
    let start = Instant::now();
    apply_thresholds(&mut config, thresholds.spatial_param, thresholds.temporal_param);
    if !tiles.is_empty() {
        config.run.tiles = tiles;
    }
    if workers.is_some() {
        config.run.workers = workers;
    }
    if let Some(path) = output {
        config.paths.output = path;
    }
    validate_or_exit(&config);

    println!("Building fire events...");
    println!("Burn directory: {}", config.paths.burn_dir.display());
    println!("Tables directory: {}", config.paths.tables_dir.display());

    let spinner = create_spinner("Classifying tiles and stitching seams...");

    match pipeline::build_events(&config) {
        Ok(report) => {
            spinner.finish_and_clear();

            for (tile, message) in report.failed() {
                warn!("{}: {}", tile, message);
            }
            let computed_events: usize = report
                .outcomes
                .iter()
                .map(|o| match o.status {
                    TileStatus::Computed { events, .. } => events,
                    _ => 0,
                })
                .sum();

            print_summary(
                "Event Build Complete",
                &[
                    ("Tiles", report.outcomes.len().to_string()),
                    ("Classified", report.computed().to_string()),
                    ("Reused", report.cached().to_string()),
                    ("Missing input", report.missing().to_string()),
                    ("Failed", report.failed().len().to_string()),
                    ("New tile events", computed_events.to_string()),
                    ("Seam merges", report.stitch.merges.to_string()),
                    ("Final events", report.stitch.events.to_string()),
                    ("Detections", report.rows.to_string()),
                    ("Output file", report.output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );

            if !report.failed().is_empty() {
                warn!("Re-run to retry {} failed tiles", report.failed().len());
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Event build failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_stitch(
    tiles: Vec<String>,
    thresholds: Thresholds,
    output: Option<PathBuf>,
    mut config: PipelineConfig,
) {
    use crate::core::loaders::tile_table_exists;
    use crate::core::writers::write_event_table;

    let start = Instant::now();
    apply_thresholds(&mut config, thresholds.spatial_param, thresholds.temporal_param);
    if !tiles.is_empty() {
        config.run.tiles = tiles;
    }
    let output = output.unwrap_or_else(|| config.paths.output.clone());
    validate_or_exit(&config);

    // Existing tables are what gets stitched, so discover them there
    let selected = if config.run.tiles.is_empty() {
        match config.run.tile_regex() {
            Ok(pattern) => {
                let mut found = pipeline::discover_tiles(&config.paths.tables_dir, &pattern);
                found.retain(|t| tile_table_exists(&config.paths.tables_dir, t));
                found
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    } else {
        config.run.tiles.clone()
    };

    let spinner = create_spinner("Stitching tile event tables...");

    let result = pipeline::stitch_tables(&config, &selected).and_then(|stitched| {
        write_event_table(&output, &stitched.rows)?;
        Ok(stitched)
    });

    spinner.finish_and_clear();
    match result {
        Ok(stitched) => {
            print_summary(
                "Stitch Complete",
                &[
                    ("Tiles", stitched.summary.tiles.to_string()),
                    ("Tile events", stitched.summary.input_events.to_string()),
                    ("Edge events", stitched.summary.edge_events.to_string()),
                    ("Adjacent pairs", stitched.summary.adjacent_pairs.to_string()),
                    ("Seam merges", stitched.summary.merges.to_string()),
                    ("Final events", stitched.summary.events.to_string()),
                    ("Output file", output.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Stitching failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_init_config(path: &Path) {
    if path.exists() {
        error!("{} already exists, not overwriting", path.display());
        std::process::exit(1);
    }
    match PipelineConfig::default().to_yaml(path) {
        Ok(()) => println!("Wrote default configuration to {}", path.display()),
        Err(e) => {
            error!("Failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
