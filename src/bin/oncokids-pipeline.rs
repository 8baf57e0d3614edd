use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use oncokids_pipeline::pipeline::{self, ScanReport};
use oncokids_pipeline::{Issue, PipelineConfig, RunContext};
use report_tables::{Flavor, QualityMode};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "oncokids-pipeline",
    version,
    about = "Split OncoKids pathology PDFs and consolidate their findings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print specimen ID matches and detected report boundaries.
    Scan(ScanArgs),
    /// Write one PDF per specimen report.
    Segment(SegmentArgs),
    /// Extract raw tables from a directory of specimen PDFs.
    Extract(ExtractArgs),
    /// Consolidate previously extracted raw-table CSVs.
    Integrate(IntegrateArgs),
    /// Run every stage on a combined PDF or a directory of specimen PDFs.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print every recorded issue.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Combined input PDF.
    #[arg(short, long)]
    input: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct SegmentArgs {
    /// Combined input PDF.
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for the specimen PDFs.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct ExtractionOverrides {
    /// Table detection flavor: bordered (lattice) or whitespace (stream).
    #[arg(long)]
    flavor: Option<Flavor>,

    /// Minimum ruling-line length as a fraction 1/N of the page size.
    #[arg(long)]
    line_scale: Option<u32>,

    /// Flavor to retry with when the first pass finds no tables.
    #[arg(long)]
    fallback: Option<Flavor>,

    /// Page selection like 1-3,5.
    #[arg(long)]
    pages: Option<String>,

    /// Low-confidence tables: best-effort, strict or skip-ambiguous.
    #[arg(long)]
    quality: Option<QualityMode>,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Directory of specimen PDFs.
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    extraction: ExtractionOverrides,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct IntegrateArgs {
    /// Directory of raw-table CSVs.
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Combined PDF or directory of specimen PDFs.
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    extraction: ExtractionOverrides,

    #[command(flatten)]
    common: CommonArgs,
}

fn load_config(common: &CommonArgs) -> Result<PipelineConfig> {
    let config = match &common.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => PipelineConfig::default(),
    };
    Ok(config.normalized())
}

fn apply_overrides(config: &mut PipelineConfig, overrides: &ExtractionOverrides) -> Result<()> {
    let extraction = &mut config.extraction;
    if let Some(flavor) = overrides.flavor {
        extraction.flavor = flavor;
    }
    if let Some(line_scale) = overrides.line_scale {
        extraction.line_scale = line_scale;
    }
    if overrides.fallback.is_some() {
        extraction.fallback_flavor = overrides.fallback;
    }
    if overrides.pages.is_some() {
        extraction.pages.clone_from(&overrides.pages);
    }
    if let Some(quality_mode) = overrides.quality {
        extraction.quality_mode = quality_mode;
    }
    config.validate().context("invalid extraction options")
}

fn log_issues(issues: &[Issue], verbose: bool) {
    if issues.is_empty() {
        return;
    }

    eprintln!("warning: {} issue(s) recorded", issues.len());
    if verbose {
        for issue in issues {
            eprintln!("  - {issue}");
        }
    }
}

fn exit_code(produced: bool) -> ExitCode {
    if produced {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn print_scan(input: &Path, report: &ScanReport) {
    println!("{}: {} page(s)", input.display(), report.page_count);
    for marker in &report.markers {
        println!("page {}\t{}", marker.page, marker.specimen_id);
    }
    println!("unique specimen IDs: {}", report.unique_specimens().len());
    for boundary in &report.detection.boundaries {
        println!(
            "{}\tpages {}-{}",
            boundary.specimen_id, boundary.start_page, boundary.end_page
        );
    }
}

fn run_scan(args: &ScanArgs) -> Result<ExitCode> {
    let config = load_config(&args.common)?;
    let report = pipeline::scan(&args.input, &config)
        .with_context(|| format!("failed to scan '{}'", args.input.display()))?;
    print_scan(&args.input, &report);
    log_issues(&report.detection.conflicts, args.common.verbose);
    Ok(exit_code(!report.detection.boundaries.is_empty()))
}

fn run_segment(args: &SegmentArgs) -> Result<ExitCode> {
    let config = load_config(&args.common)?;
    let mut context = RunContext::default();
    let written = pipeline::segment(&args.input, &args.output, &config, &mut context)
        .with_context(|| format!("failed to segment '{}'", args.input.display()))?;
    for specimen in &written {
        println!(
            "{}\t{}\tpages {}-{}",
            specimen.specimen_id, specimen.file_name, specimen.start_page, specimen.end_page
        );
    }
    log_issues(&context.issues, args.common.verbose);
    Ok(exit_code(!written.is_empty()))
}

fn run_extract(args: &ExtractArgs) -> Result<ExitCode> {
    let mut config = load_config(&args.common)?;
    apply_overrides(&mut config, &args.extraction)?;
    let mut context = RunContext::default();
    pipeline::extract(&args.input, &args.output, &config, &mut context)
        .with_context(|| format!("failed to extract tables from '{}'", args.input.display()))?;
    let report_path = args.output.join(&config.output.no_tables_file);
    context
        .no_tables
        .write_csv(&report_path)
        .with_context(|| format!("failed to write '{}'", report_path.display()))?;
    pipeline::finish(&args.input, &args.output, &config, &context)
        .context("failed to write run summary")?;
    log_issues(&context.issues, args.common.verbose);
    Ok(exit_code(context.counts.raw_tables > 0))
}

fn run_integrate(args: &IntegrateArgs) -> Result<ExitCode> {
    let config = load_config(&args.common)?;
    let mut context = RunContext::default();
    pipeline::integrate_from_csv(&args.input, &config, &mut context)
        .with_context(|| format!("failed to integrate tables from '{}'", args.input.display()))?;
    pipeline::write_outputs(&args.output, &config, &context)
        .with_context(|| format!("failed to write outputs to '{}'", args.output.display()))?;
    let summary = pipeline::finish(&args.input, &args.output, &config, &context)
        .context("failed to write run summary")?;
    log_issues(&context.issues, args.common.verbose);
    Ok(exit_code(summary.integrated_rows() > 0))
}

fn run_all(args: &RunArgs) -> Result<ExitCode> {
    let mut config = load_config(&args.common)?;
    apply_overrides(&mut config, &args.extraction)?;
    let (context, summary) = pipeline::run(&args.input, &args.output, &config)
        .with_context(|| format!("failed to process '{}'", args.input.display()))?;
    println!(
        "{} DNA variant(s), {} RNA fusion(s), {} CMA region(s); {} document(s) without tables",
        context.dna.len(),
        context.rna.len(),
        context.cma.len(),
        context.no_tables.len()
    );
    log_issues(&context.issues, args.common.verbose);
    Ok(exit_code(summary.integrated_rows() > 0))
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oncokids_pipeline=info,report_tables=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    let outcome = match &cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Segment(args) => run_segment(args),
        Commands::Extract(args) => run_extract(args),
        Commands::Integrate(args) => run_integrate(args),
        Commands::Run(args) => run_all(args),
    };
    match outcome {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
