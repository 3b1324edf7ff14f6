//! eigenfaces CLI — open-set face identification over directory galleries.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use eigenfaces::{
    load_directory, run_evaluation, run_sweep, stratified_split, Dataset, DatasetConfig, Metric,
    RunParams, Split, SplitConfig, SweepGrid,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "eigenfaces")]
#[command(
    about = "Identify faces against a directory gallery via an eigenface subspace (open-set)"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one evaluation over a directory gallery.
    Evaluate(CliEvaluateArgs),

    /// Sweep a parameter grid over a directory gallery.
    Sweep(CliSweepArgs),

    /// Print class and sample statistics for a directory gallery.
    DatasetInfo(CliDataArgs),
}

#[derive(Debug, Clone, Args)]
struct CliDataArgs {
    /// Gallery root: one subdirectory per person.
    #[arg(long)]
    data: PathBuf,

    /// Target image size as WxH (e.g. 64x64).
    #[arg(long, default_value = "64x64")]
    image_size: String,

    /// Drop classes with fewer usable images than this.
    #[arg(long, default_value = "10")]
    min_images_per_class: usize,
}

impl CliDataArgs {
    fn load(&self) -> CliResult<Dataset> {
        let config = DatasetConfig {
            image_size: parse_image_size(&self.image_size)?,
            min_images_per_class: self.min_images_per_class,
        };
        Ok(load_directory(&self.data, &config)?)
    }
}

#[derive(Debug, Clone, Args)]
struct CliSplitArgs {
    /// Per-class fraction of samples held out for testing.
    #[arg(long, default_value = "0.25")]
    test_fraction: f64,

    /// Split shuffle seed.
    #[arg(long, default_value = "0")]
    seed: u64,
}

impl CliSplitArgs {
    fn to_config(&self) -> SplitConfig {
        SplitConfig {
            test_fraction: self.test_fraction,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliEvaluateArgs {
    #[command(flatten)]
    data: CliDataArgs,

    #[command(flatten)]
    split: CliSplitArgs,

    /// Spectrum energy retained by the subspace, in (0, 1].
    #[arg(long, default_value = "0.9")]
    energy: f64,

    /// Neighbor metric over subspace coordinates.
    #[arg(long, value_enum, default_value_t = MetricArg::L2)]
    metric: MetricArg,

    /// Reconstruction-error ceiling (eps_f); omit to disable the gate.
    #[arg(long)]
    eps_f: Option<f64>,

    /// Confidence gate (eps_i): distance ceiling for l2/l1, similarity floor
    /// for cosine; omit to disable the gate.
    #[arg(long)]
    eps_i: Option<f64>,

    /// Path to write the JSON report.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct CliSweepArgs {
    #[command(flatten)]
    data: CliDataArgs,

    #[command(flatten)]
    split: CliSplitArgs,

    /// Comma-separated energies (e.g. 0.8,0.9,0.95).
    #[arg(long, default_value = "0.8,0.9,0.95")]
    energies: String,

    /// Comma-separated metrics out of l2, cosine, l1.
    #[arg(long, default_value = "l2,cosine")]
    metrics: String,

    /// Comma-separated eps_f values; omit to keep the gate disabled.
    #[arg(long)]
    eps_f: Option<String>,

    /// Comma-separated eps_i values; omit to keep the gate disabled.
    #[arg(long)]
    eps_i: Option<String>,

    /// Path to write the JSON sweep report.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetricArg {
    L2,
    Cosine,
    L1,
}

impl MetricArg {
    fn to_core(self) -> Metric {
        match self {
            Self::L2 => Metric::L2,
            Self::Cosine => Metric::Cosine,
            Self::L1 => Metric::L1,
        }
    }
}

fn parse_image_size(s: &str) -> CliResult<[u32; 2]> {
    let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(|| -> CliError {
        format!("invalid image size {:?}: expected WxH", s).into()
    })?;
    let width: u32 = w.trim().parse().map_err(|e| -> CliError {
        format!("invalid image width {:?}: {}", w, e).into()
    })?;
    let height: u32 = h.trim().parse().map_err(|e| -> CliError {
        format!("invalid image height {:?}: {}", h, e).into()
    })?;
    if width == 0 || height == 0 {
        return Err("image size must be positive in both dimensions".into());
    }
    Ok([width, height])
}

fn parse_f64_list(s: &str, what: &str) -> CliResult<Vec<f64>> {
    let mut values = Vec::new();
    for token in s.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let value: f64 = token.parse().map_err(|e| -> CliError {
            format!("invalid {} {:?}: {}", what, token, e).into()
        })?;
        values.push(value);
    }
    if values.is_empty() {
        return Err(format!("empty {} list", what).into());
    }
    Ok(values)
}

fn parse_metric_list(s: &str) -> CliResult<Vec<Metric>> {
    let mut metrics = Vec::new();
    for token in s.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        metrics.push(token.parse::<Metric>()?);
    }
    if metrics.is_empty() {
        return Err("empty metric list".into());
    }
    Ok(metrics)
}

fn parse_threshold_list(arg: Option<&str>, what: &str) -> CliResult<Vec<Option<f64>>> {
    match arg {
        Some(s) => Ok(parse_f64_list(s, what)?.into_iter().map(Some).collect()),
        None => Ok(vec![None]),
    }
}

fn load_and_split(data: &CliDataArgs, split: &CliSplitArgs) -> CliResult<(Dataset, Split)> {
    let dataset = data.load()?;
    tracing::info!(
        "{} classes, {} samples, dimension {}",
        dataset.classes.len(),
        dataset.samples.len(),
        dataset.dim
    );
    let split = stratified_split(&dataset, &split.to_config())?;
    tracing::info!("{} train / {} test", split.train.len(), split.test.len());
    Ok((dataset, split))
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
        Commands::Evaluate(args) => run_evaluate(&args),
        Commands::Sweep(args) => run_sweep_grid(&args),
        Commands::DatasetInfo(args) => run_dataset_info(&args),
    }
}

// ── evaluate ───────────────────────────────────────────────────────────

fn run_evaluate(args: &CliEvaluateArgs) -> CliResult<()> {
    let (dataset, split) = load_and_split(&args.data, &args.split)?;

    let params = RunParams {
        energy: args.energy,
        metric: args.metric.to_core(),
        reconstruction_threshold: args.eps_f,
        confidence_threshold: args.eps_i,
    };
    let report = run_evaluation(&dataset, &split, &params)?;

    tracing::info!(
        "rank {} captures {:.1}% of the spectrum",
        report.rank,
        100.0 * report.explained_energy
    );
    tracing::info!(
        "accuracy {:.3}, macro-F1 {:.3}, {}/{} unknown",
        report.accuracy,
        report.macro_f1,
        report.n_unknown,
        report.n_test
    );

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Report written to {}", args.out.display());

    Ok(())
}

// ── sweep ──────────────────────────────────────────────────────────────

fn run_sweep_grid(args: &CliSweepArgs) -> CliResult<()> {
    let (dataset, split) = load_and_split(&args.data, &args.split)?;

    let grid = SweepGrid {
        energies: parse_f64_list(&args.energies, "energy")?,
        metrics: parse_metric_list(&args.metrics)?,
        reconstruction_thresholds: parse_threshold_list(args.eps_f.as_deref(), "eps_f")?,
        confidence_thresholds: parse_threshold_list(args.eps_i.as_deref(), "eps_i")?,
    };
    let report = run_sweep(&dataset, &split, &grid)?;

    if let Some(best) = report.best() {
        tracing::info!(
            "best cell: energy {:.2}, metric {}, accuracy {:.3}, macro-F1 {:.3}",
            best.energy,
            best.metric,
            best.accuracy,
            best.macro_f1
        );
    }

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!(
        "{} sweep records written to {}",
        report.records.len(),
        args.out.display()
    );

    Ok(())
}

// ── dataset-info ───────────────────────────────────────────────────────

fn run_dataset_info(args: &CliDataArgs) -> CliResult<()> {
    let dataset = args.load()?;
    let counts = dataset.class_counts();

    println!("gallery at {}", args.data.display());
    println!("  dimension:  {}", dataset.dim);
    println!("  classes:    {}", dataset.classes.len());
    println!("  samples:    {}", dataset.samples.len());
    for (name, count) in dataset.classes.iter().zip(&counts) {
        println!("    {:<24} {}", name, count);
    }

    Ok(())
}
