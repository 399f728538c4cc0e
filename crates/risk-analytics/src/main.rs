//! CLI entry point for the insurance risk analytics pipeline.

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use polars::prelude::*;
use risk_analytics::reporting::{MODEL_REPORT_FILE, PREMIUMS_FILE};
use risk_analytics::{
    HypothesisConfig, HypothesisSuite, HypothesisTestResult, ModelingConfig, ModelingOutcome,
    ModelingRun, Pipeline, PipelineConfig, PipelineResult, ReportGenerator, RunReport,
    load_cleaned_table,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Insurance risk analytics: clean policy data, test risk hypotheses,
/// train claim models and derive risk-based premiums.
#[derive(Parser, Debug)]
#[command(name = "risk-analytics")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print the results as JSON to stdout instead of a summary
    ///
    /// Disables all logging so stdout only carries the JSON document.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean a raw pipe-delimited extract and write the cleaned table and summary
    Clean(CleanArgs),
    /// Run the hypothesis tests on a cleaned table
    Test(TestArgs),
    /// Train claim models on a cleaned table and price the held-out policies
    Model(ModelArgs),
    /// Clean, test and model in one go
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Path to the raw input file
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Field separator of the raw file
    #[arg(long, default_value_t = '|')]
    separator: char,
}

#[derive(Args, Debug)]
struct TestArgs {
    /// Path to the cleaned CSV
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Significance level
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Path to the cleaned CSV
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    #[command(flatten)]
    modeling: ModelingOptions,
}

#[derive(Args, Debug)]
struct ModelingOptions {
    /// Multiplier over expected loss
    #[arg(long, default_value_t = 1.2)]
    loading_factor: f64,

    /// Fraction of policies held out for testing
    #[arg(long, default_value_t = 0.3)]
    test_size: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Trees per random forest
    #[arg(long)]
    trees: Option<usize>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the raw input file
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    #[arg(long, default_value_t = '|')]
    separator: char,

    #[arg(long, default_value_t = 0.05)]
    alpha: f64,

    #[command(flatten)]
    modeling: ModelingOptions,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // Load environment variables from .env file (RUST_LOG among them)
    dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet, cli.json);

    let result = match &cli.command {
        Command::Clean(args) => run_clean(&cli, args),
        Command::Test(args) => run_test(&cli, args),
        Command::Model(args) => run_model(&cli, args),
        Command::Run(args) => run_all(&cli, args),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn require_input(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }
    Ok(())
}

fn separator_byte(separator: char) -> Result<u8> {
    u8::try_from(separator).map_err(|_| {
        anyhow!(
            "Separator must be a single-byte character, got '{}'",
            separator
        )
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn modeling_config(options: &ModelingOptions, output: &Path) -> Result<ModelingConfig> {
    let mut builder = ModelingConfig::builder()
        .loading_factor(options.loading_factor)
        .test_size(options.test_size)
        .seed(options.seed)
        .output_dir(output);

    if let Some(trees) = options.trees {
        builder = builder.n_trees(trees);
    }

    Ok(builder.build()?)
}

// ============================================================================
// Subcommands
// ============================================================================

fn clean(
    cli: &Cli,
    input: &Path,
    output: &Path,
    separator: char,
) -> Result<(DataFrame, PipelineResult)> {
    require_input(input)?;

    let config = PipelineConfig::builder()
        .separator(separator_byte(separator)?)
        .output_dir(output)
        .build()?;

    let mut builder = Pipeline::builder().config(config);
    if !cli.quiet && !cli.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    info!("{}", "=".repeat(80));
    info!("Cleaning {}", input.display());
    info!("{}", "=".repeat(80));

    Ok(builder.build()?.run_file(input)?)
}

fn hypothesis_tests(
    df: &mut DataFrame,
    output: &Path,
    alpha: f64,
) -> Result<(Vec<HypothesisTestResult>, PathBuf)> {
    let config = HypothesisConfig::new(alpha, output)?;
    let results = HypothesisSuite::new(config.clone()).run(df)?;
    let path = ReportGenerator::new(output)
        .write_hypothesis_results(&results, &config.results_file_name)?;
    Ok((results, path))
}

fn modeling(
    df: &DataFrame,
    output: &Path,
    options: &ModelingOptions,
) -> Result<(ModelingOutcome, Vec<PathBuf>)> {
    let run = ModelingRun::new(modeling_config(options, output)?)?;
    let outcome = run.execute(df)?;

    let generator = ReportGenerator::new(output);
    let paths = vec![
        generator.write_modeling_report(&outcome.report, MODEL_REPORT_FILE)?,
        generator.write_premiums(&outcome.premiums, PREMIUMS_FILE)?,
    ];
    Ok((outcome, paths))
}

fn run_clean(cli: &Cli, args: &CleanArgs) -> Result<()> {
    let (_, result) = clean(cli, &args.input, &args.output, args.separator)?;

    if cli.json {
        return print_json(&result);
    }
    if !cli.quiet {
        print_cleaning_summary(&result);
    }
    Ok(())
}

fn run_test(cli: &Cli, args: &TestArgs) -> Result<()> {
    require_input(&args.input)?;
    let mut df = load_cleaned_table(&args.input)?;
    let (results, path) = hypothesis_tests(&mut df, &args.output, args.alpha)?;

    if cli.json {
        return print_json(&results);
    }
    if !cli.quiet {
        print_hypothesis_summary(&results, args.alpha);
        println!("Results: {}", path.display());
    }
    Ok(())
}

fn run_model(cli: &Cli, args: &ModelArgs) -> Result<()> {
    require_input(&args.input)?;
    let df = load_cleaned_table(&args.input)?;
    let (outcome, paths) = modeling(&df, &args.output, &args.modeling)?;

    if cli.json {
        return print_json(&outcome.report);
    }
    if !cli.quiet {
        print_modeling_summary(&outcome);
        for path in paths {
            println!("Saved: {}", path.display());
        }
    }
    Ok(())
}

fn run_all(cli: &Cli, args: &RunArgs) -> Result<()> {
    let mut report = RunReport::new(args.input.display().to_string());

    info!("Stage 1/3: cleaning");
    let (mut df, result) = clean(cli, &args.input, &args.output, args.separator)?;
    report.cleaning = result.summary.clone();
    report.metrics = result.metrics.clone();
    report.processing_steps.extend(result.processing_steps.iter().cloned());
    report.output_files.extend(result.cleaned_data.iter().cloned());
    report.output_files.extend(result.metrics_file.iter().cloned());

    info!("Stage 2/3: hypothesis tests");
    let (results, path) = hypothesis_tests(&mut df, &args.output, args.alpha)?;
    report.add_output(&path);
    report.hypothesis_tests = results;

    info!("Stage 3/3: modeling");
    let (outcome, paths) = modeling(&df, &args.output, &args.modeling)?;
    for path in &paths {
        report.add_output(path);
    }
    report.processing_steps.extend(outcome.report.processing_steps.iter().cloned());
    report.modeling = Some(outcome.report.clone());

    let stem = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "run".to_string());
    let report_path = ReportGenerator::new(&args.output).write_report_to_file(&report, &stem)?;
    report.add_output(&report_path);

    if cli.json {
        return print_json(&report);
    }
    if !cli.quiet {
        print_cleaning_summary(&result);
        print_hypothesis_summary(&report.hypothesis_tests, args.alpha);
        print_modeling_summary(&outcome);
        println!("Report: {}", report_path.display());
    }
    Ok(())
}

// ============================================================================
// Human-readable output
// ============================================================================

fn print_cleaning_summary(result: &PipelineResult) {
    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));

    if let Some(summary) = &result.summary {
        println!(
            "Rows: {} -> {}   Columns: {} -> {}   Missing: {} -> {}",
            summary.rows_before,
            summary.rows_after,
            summary.columns_before,
            summary.columns_after,
            summary.missing_before,
            summary.missing_after
        );
        if !summary.dropped_columns.is_empty() {
            println!("Dropped columns: {}", summary.dropped_columns.join(", "));
        }
        for (column, count) in &summary.imputed_counts {
            println!("  Imputed {:>8} values in {}", count, column);
        }
        for warning in &summary.warnings {
            println!("  Warning: {}", warning);
        }
    }

    if let Some(metrics) = &result.metrics {
        println!(
            "Mean loss ratio: {:.4}   Written-off ratio: {:.4}",
            metrics.mean_loss_ratio, metrics.writtenoff_ratio
        );
    }
    if let Some(path) = &result.cleaned_data {
        println!("Cleaned data: {}", path);
    }
    if let Some(path) = &result.metrics_file {
        println!("Summary: {}", path);
    }
    println!();
}

fn print_hypothesis_summary(results: &[HypothesisTestResult], alpha: f64) {
    println!("HYPOTHESIS TESTS (alpha = {})", alpha);
    println!("{}", "-".repeat(80));
    for result in results {
        let verdict = if result.is_significant() { "reject H0" } else { "fail to reject H0" };
        println!("{:<72} {}", result.describe(), verdict);
    }
    println!();
}

fn print_modeling_summary(outcome: &ModelingOutcome) {
    let report = &outcome.report;

    println!("MODEL EVALUATION");
    println!("{}", "-".repeat(80));
    for (name, metrics) in &report.regression_metrics {
        println!("{:<20} RMSE: {:>12.3}   R2: {:>7.3}", name, metrics.rmse, metrics.r2);
    }
    for (name, metrics) in &report.classification_metrics {
        println!("{:<20} Accuracy: {:>6.3}   F1: {:>6.3}", name, metrics.accuracy, metrics.f1);
    }

    if let Some(summary) = &report.premium_summary {
        println!();
        println!(
            "Premiums ({} policies, loading {}): mean {:.2}, median {:.2}, min {:.2}, max {:.2}",
            summary.count,
            summary.loading_factor,
            summary.mean,
            summary.median,
            summary.min,
            summary.max
        );
    }
    println!();
}
