//! chartprep - chart-ready data shaping
//!
//! A CLI tool that loads a delimited dataset, runs a chart study's
//! aggregation pipelines and hands each shaped table to a renderer.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, config, pipeline failure, etc.)
//!   2 - A chart table was empty and --fail-on-empty was set

mod cli;
mod config;
mod error;
mod loader;
mod pipeline;
mod render;
mod study;
mod table;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use loader::LoadOptions;
use render::report::{generate_json_report, generate_markdown_report, ReportMetadata, RunReport};
use render::JsonSpecWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use study::StudyPlan;
use table::Table;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("chartprep v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .chartprep.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to change study parameters, render settings, or add [[charts]].");
    Ok(())
}

/// Initialize logging. `RUST_LOG` overrides the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete study. Returns exit code (0 or 2).
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let input_path = args.input.clone().context("No input file given")?;

    // Step 1: Load the dataset
    println!("📥 Loading input: {}", input_path.display());
    let table = loader::load_table(&input_path, &LoadOptions::from(&config.general))?;
    info!(
        "Loaded {} records with {} columns",
        table.len(),
        table.width()
    );

    // Step 2: Plan the study
    let plan = study::build_plan(config.general.study, &config, table.columns());
    info!(
        "Study '{}': {} derived tables, {} charts",
        plan.name,
        plan.subsets.len(),
        plan.charts.len()
    );

    if args.dry_run {
        return handle_dry_run(&plan, &table, &config, args.fail_on_empty);
    }

    // Step 3: Shape and render every chart
    let output_dir = PathBuf::from(&config.general.output_dir);
    let mut writer = JsonSpecWriter::new(&output_dir)?;

    println!(
        "\n📊 Running {} study ({} charts)...",
        plan.name,
        plan.charts.len()
    );
    let outcome = study::execute(
        &plan,
        &table,
        Some(&mut writer),
        &config.render,
        !args.quiet,
    )?;

    // Step 4: Build and save the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let empty: Vec<String> = outcome
        .empty_charts()
        .iter()
        .map(|c| c.name.clone())
        .collect();

    let metadata = ReportMetadata {
        input: input_path.display().to_string(),
        study: plan.name.clone(),
        run_date: Utc::now(),
        input_rows: table.len(),
        input_columns: table.width(),
        charts_rendered: outcome
            .charts
            .iter()
            .filter(|c| c.artifact.is_some())
            .count(),
        duration_seconds: duration,
    };
    let report = RunReport::new(metadata, table.describe(), outcome);

    let output = match args.format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Markdown => generate_markdown_report(&report),
    };

    let report_path = output_dir.join(report_file_name(&config.general.report, args.format));
    std::fs::write(&report_path, &output)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;

    // Print summary
    println!("\n📊 Run Summary:");
    println!("   Records: {}", table.len());
    for subset in &report.subsets {
        println!("   {} records: {}", subset.name, subset.rows);
    }
    println!("   Charts written: {}", report.metadata.charts_rendered);
    if !empty.is_empty() {
        println!("   ⚠️  Empty charts: {}", empty.join(", "));
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Done! Charts in {}, report saved to: {}",
        output_dir.display(),
        report_path.display()
    );

    if args.fail_on_empty && !empty.is_empty() {
        eprintln!(
            "\n⛔ {} chart table(s) had no records. Failing (exit code 2).",
            empty.len()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: shape every chart table and print its size, writing nothing.
fn handle_dry_run(
    plan: &StudyPlan,
    table: &Table,
    config: &Config,
    fail_on_empty: bool,
) -> Result<i32> {
    println!("\n🔍 Dry run: shaping chart tables (nothing is written)...\n");

    let outcome = study::execute(plan, table, None, &config.render, false)?;

    for subset in &outcome.subsets {
        println!(
            "     🗂  {} <- {} ({} records)",
            subset.name, subset.source, subset.rows
        );
    }
    if outcome.charts.is_empty() {
        println!("   No charts planned.");
    } else {
        println!("\n   {} charts would be rendered:\n", outcome.charts.len());
        for chart in &outcome.charts {
            println!(
                "     📈 {} [{}] {} records x {} columns",
                chart.name,
                chart.kind,
                chart.rows,
                chart.columns.len()
            );
        }
    }

    println!("\n✅ Dry run complete. No files were written.");

    if fail_on_empty && !outcome.empty_charts().is_empty() {
        return Ok(2);
    }
    Ok(0)
}

/// Report file name with the extension matching `format`.
fn report_file_name(configured: &str, format: OutputFormat) -> PathBuf {
    Path::new(configured).with_extension(format.extension())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
