//! MAT Engine CLI - Temporal SVD crop stress detection

mod report;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use matengine_algorithms::imagery::{observation_from_scene, SceneOptions};
use matengine_algorithms::temporal::{analyze_field, assess_field_dates, group_by_field};
use matengine_core::io::{
    read_analysis, read_band_scenes, read_config, read_observations, write_json, write_sidecar,
};
use matengine_core::{
    EngineConfig, FieldAnalysis, IndexSelection, MatrixLayout, RankMode, TemporalObservation,
    VegetationIndex,
};
use matengine_parallel::{num_cpus, BatchRunner, BatchSummary, ProcessingMode};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "matengine")]
#[command(author, version, about = "Temporal SVD crop stress detection", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one field and write its analysis sidecar
    Analyze {
        /// Observation file (JSON)
        input: PathBuf,
        /// Field to analyze (required when the file holds several fields)
        #[arg(short, long)]
        field: Option<String>,
        /// Output directory for sidecars
        #[arg(short, long, default_value = "data/processed")]
        out_dir: PathBuf,
        /// Also print the assessment of every date
        #[arg(long)]
        all_dates: bool,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Analyze every field of an observation file in parallel
    Batch {
        /// Observation file (JSON)
        input: PathBuf,
        /// Output directory for sidecars
        #[arg(short, long, default_value = "data/processed")]
        out_dir: PathBuf,
        /// Worker threads (default: all cores, 1 = sequential)
        #[arg(short, long)]
        threads: Option<usize>,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Print a farmer-facing report for an analysis sidecar
    Report {
        /// Analysis sidecar (JSON)
        input: PathBuf,
        /// Also write the report as markdown
        #[arg(short, long)]
        markdown: Option<PathBuf>,
    },
    /// Compute vegetation indices from band scenes
    Index {
        /// Band scene file (JSON)
        input: PathBuf,
        /// Output observation file (JSON)
        output: PathBuf,
        /// Indices to compute, comma separated
        #[arg(short, long, default_value = "ndvi,ndre", value_delimiter = ',')]
        indices: Vec<VegetationIndex>,
        /// Keep per-pixel values for the pixel layout
        #[arg(long)]
        keep_pixels: bool,
    },
}

/// Engine configuration: a JSON file plus flag overrides.
#[derive(Args)]
struct EngineArgs {
    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Index or indices to analyze, comma separated
    #[arg(long, value_delimiter = ',')]
    index: Vec<VegetationIndex>,
    /// Matrix layout: indices, pixels
    #[arg(long)]
    layout: Option<String>,
    /// Reconstruction rank: auto or an integer
    #[arg(short, long)]
    rank: Option<RankMode>,
    /// Cumulative explained variance for the auto rank
    #[arg(long)]
    variance_threshold: Option<f64>,
    /// Ceiling for the auto rank
    #[arg(long)]
    max_rank: Option<usize>,
    /// z-score breakpoints for emerging, moderate, severe
    #[arg(long, value_delimiter = ',')]
    breakpoints: Option<Vec<f64>>,
    /// Residual treated as one standard deviation when there is no baseline
    #[arg(long)]
    fixed_threshold: Option<f64>,
    /// Residual history per field (JSON object: field id -> residuals)
    #[arg(long)]
    history: Option<PathBuf>,
}

impl EngineArgs {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if !self.index.is_empty() {
            config.matrix.index = IndexSelection::Many(self.index.clone());
        }
        if let Some(layout) = &self.layout {
            config.matrix.layout = parse_layout(layout)?;
        }
        if let Some(rank) = self.rank {
            config.rank.rank_mode = rank;
        }
        if let Some(v) = self.variance_threshold {
            config.rank.variance_threshold = v;
        }
        if let Some(k) = self.max_rank {
            config.rank.max_rank = k;
        }
        if let Some(b) = &self.breakpoints {
            match b.as_slice() {
                &[b1, b2, b3] => config.classifier.z_breakpoints = [b1, b2, b3],
                _ => anyhow::bail!("--breakpoints takes exactly three values, got {}", b.len()),
            }
        }
        if let Some(t) = self.fixed_threshold {
            config.classifier.fixed_threshold = Some(t);
        }

        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }

    fn history(&self) -> Result<BTreeMap<String, Vec<f64>>> {
        match &self.history {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open history {}", path.display()))?;
                serde_json::from_reader(BufReader::new(file)).context("Failed to parse history")
            }
            None => Ok(BTreeMap::new()),
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_input(path: &Path) -> Result<Vec<TemporalObservation>> {
    let pb = spinner("Reading observations...");
    let observations = read_observations(path)
        .with_context(|| format!("Failed to read observations {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} observation(s)", observations.len());
    Ok(observations)
}

fn parse_layout(s: &str) -> Result<MatrixLayout> {
    match s.to_lowercase().as_str() {
        "indices" | "index" => Ok(MatrixLayout::Indices),
        "pixels" | "pixel" => Ok(MatrixLayout::Pixels),
        _ => anyhow::bail!("Unknown layout: {}. Use indices or pixels.", s),
    }
}

fn print_analysis(a: &FieldAnalysis) {
    println!("Field: {} ({})", a.field_id, a.date);
    println!("  Stress: {} (confidence {:.2}, z = {:.2})", a.stress_label, a.confidence, a.z_score);
    println!("  Health score: {:.2}", a.health_score);
    println!(
        "  Rank: {} of {} (cumulative variance {:.1}%)",
        a.chosen_rank,
        a.singular_values.len(),
        a.cumulative_variance * 100.0
    );
    println!("  Latest residual: {:.5}", a.residual_profile.last().copied().unwrap_or(f64::NAN));
    println!("  Trend: {}", report::trend_line(a));
    for w in &a.warnings {
        println!("  Warning: {:?}", w);
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Analyze ──────────────────────────────────────────────────
        Commands::Analyze {
            input,
            field,
            out_dir,
            all_dates,
            engine,
        } => {
            let config = engine.engine_config()?;
            let history = engine.history()?;
            let mut fields = group_by_field(read_input(&input)?);

            let field_id = match field {
                Some(id) => id,
                None if fields.len() == 1 => fields.keys().next().cloned().unwrap_or_default(),
                None => anyhow::bail!(
                    "{} fields in {}; pick one with --field ({})",
                    fields.len(),
                    input.display(),
                    fields.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            };
            let observations = fields
                .remove(&field_id)
                .with_context(|| format!("No observations for field '{}'", field_id))?;
            let past = history.get(&field_id).map(Vec::as_slice).unwrap_or(&[]);

            let start = Instant::now();
            let analysis = match analyze_field(&field_id, &observations, past, &config) {
                Ok(a) => a,
                Err(e) if e.is_recoverable() => {
                    warn!("{}", e);
                    println!("{}: {}", field_id, e.user_message().unwrap_or("not enough data"));
                    return Ok(());
                }
                Err(e) => return Err(e).context("Analysis failed"),
            };
            let elapsed = start.elapsed();

            print_analysis(&analysis);
            if all_dates {
                for a in assess_field_dates(&field_id, &observations, past, &config)? {
                    println!("  {}  {:<8}  z = {:>6.2}  r = {:.5}", a.date, a.label, a.z_score, a.residual);
                }
            }

            let path = write_sidecar(&out_dir, &analysis).context("Failed to write sidecar")?;
            done("Analysis", &path, elapsed);
        }

        // ── Batch ────────────────────────────────────────────────────
        Commands::Batch {
            input,
            out_dir,
            threads,
            engine,
        } => {
            let config = engine.engine_config()?;
            let history = engine.history()?;
            let observations = read_input(&input)?;
            let mode = ProcessingMode::from_threads(threads);
            info!("Mode: {:?} ({} cores available)", mode, num_cpus());

            let start = Instant::now();
            let pb = spinner("Analyzing fields...");
            let outcomes = BatchRunner::new(config)
                .with_mode(mode)
                .run_observations(observations, &history)?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            for outcome in &outcomes {
                match &outcome.result {
                    Ok(analysis) => {
                        let path = write_sidecar(&out_dir, analysis)
                            .with_context(|| format!("Failed to write sidecar for {}", outcome.field_id))?;
                        println!(
                            "{:<20} {:<9} {:.2}  -> {}",
                            outcome.field_id,
                            analysis.stress_label,
                            analysis.confidence,
                            path.display()
                        );
                    }
                    Err(e) => match e.user_message() {
                        Some(msg) => println!("{:<20} skipped: {}", outcome.field_id, msg),
                        None => println!("{:<20} failed: {}", outcome.field_id, e),
                    },
                }
            }

            let summary = BatchSummary::from_outcomes(&outcomes);
            println!(
                "\n{} field(s): {} analyzed, {} waiting for data, {} failed",
                summary.fields, summary.analyzed, summary.insufficient, summary.failed
            );
            for (label, count) in &summary.by_label {
                println!("  {:<9} {}", label, count);
            }
            println!("  Processing time: {:.2?}", elapsed);
        }

        // ── Report ───────────────────────────────────────────────────
        Commands::Report { input, markdown } => {
            let analysis = read_analysis(&input)
                .with_context(|| format!("Failed to read analysis {}", input.display()))?;

            print_analysis(&analysis);
            println!("\nAction: {}", report::recommendation(&analysis));

            if let Some(path) = markdown {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, report::markdown(&analysis))
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Report saved to: {}", path.display());
            }
        }

        // ── Index ────────────────────────────────────────────────────
        Commands::Index {
            input,
            output,
            indices,
            keep_pixels,
        } => {
            let pb = spinner("Reading band scenes...");
            let scenes = read_band_scenes(&input)
                .with_context(|| format!("Failed to read scenes {}", input.display()))?;
            pb.finish_and_clear();
            info!("Input: {} scene(s), indices {:?}", scenes.len(), indices);

            let options = SceneOptions {
                keep_pixels,
                ..Default::default()
            };
            let start = Instant::now();
            let observations = scenes
                .iter()
                .map(|scene| observation_from_scene(scene, &indices, &options))
                .collect::<matengine_core::Result<Vec<_>>>()
                .context("Index computation failed")?;
            let elapsed = start.elapsed();

            write_json(&observations, &output).context("Failed to write observations")?;
            done("Observations", &output, elapsed);
        }
    }

    Ok(())
}
