//! Extraction Accuracy CLI
//!
//! Scores extracted records against expected ones, field by field.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use extraction_accuracy::{
    DocumentEvaluation, EvaluationConfig, Evaluator, FieldResultCollection, RunReport,
    cases::{discover_cases, load_case, load_record},
    telemetry,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Extraction Accuracy - weighted field-level scoring of extracted records
#[derive(Parser)]
#[command(name = "accuracy-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an actual record against an expected record
    Evaluate {
        /// Path to the expected record (JSON object)
        expected: PathBuf,

        /// Path to the actual record (JSON object)
        actual: PathBuf,

        /// Path to a YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output the field results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a single case file
    Case {
        /// Path to the case file
        file: PathBuf,

        /// Path to a YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output the field results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate every case file in a directory
    Batch {
        /// Directory containing case files
        dir: PathBuf,

        /// Path to a YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run name shown in the report
        #[arg(short, long, default_value = "batch")]
        name: String,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Path to a YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(&cli.log_level).context("Failed to initialise logging")?;

    match cli.command {
        Commands::Evaluate {
            expected,
            actual,
            config,
            json,
        } => cmd_evaluate(&expected, &actual, config.as_deref(), json),
        Commands::Case { file, config, json } => cmd_case(&file, config.as_deref(), json),
        Commands::Batch {
            dir,
            config,
            name,
            json,
        } => cmd_batch(&dir, config.as_deref(), &name, json),
        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<EvaluationConfig> {
    match path {
        Some(path) => {
            let mut config = EvaluationConfig::load_from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate().context("Invalid configuration")?;
            Ok(config)
        }
        None => EvaluationConfig::load().context("Failed to load configuration"),
    }
}

fn build_evaluator(path: Option<&Path>) -> Result<Evaluator> {
    let config = load_config(path)?;
    Evaluator::from_config(&config).context("Failed to build evaluator")
}

fn cmd_evaluate(expected: &Path, actual: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    let evaluator = build_evaluator(config)?;
    let expected = load_record(expected).context("Failed to load expected record")?;
    let actual = load_record(actual).context("Failed to load actual record")?;

    let results = evaluator
        .evaluate(&expected, &actual)
        .context("Evaluation failed")?;
    print_results(&results, json)
}

fn cmd_case(file: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    let evaluator = build_evaluator(config)?;
    let case = load_case(file).context("Failed to load case file")?;

    let results = evaluator
        .evaluate(&case.expected, &case.actual)
        .with_context(|| format!("Evaluation of '{}' failed", case.document_id))?;

    if !json {
        println!("Document: {}", case.document_id);
    }
    print_results(&results, json)
}

fn cmd_batch(dir: &Path, config: Option<&Path>, name: &str, json: bool) -> Result<()> {
    let evaluator = build_evaluator(config)?;
    let paths = discover_cases(dir).context("Failed to list case files")?;

    if paths.is_empty() {
        anyhow::bail!("No case files found in '{}'", dir.display());
    }

    info!(count = paths.len(), dir = %dir.display(), "evaluating case files");

    let documents: Vec<DocumentEvaluation> = paths
        .iter()
        .map(|path| {
            let evaluation = load_case(path).and_then(|case| {
                let results = evaluator.evaluate(&case.expected, &case.actual)?;
                Ok(DocumentEvaluation::success(case.document_id, results))
            });
            evaluation.unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "case failed");
                let id = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                DocumentEvaluation::failure(id, e)
            })
        })
        .collect();

    let report = RunReport::from_documents(name, &documents);

    if json {
        let json_str = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json_str);
    } else {
        report.print_summary();
    }

    Ok(())
}

fn cmd_config(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;

    if let Some(path) = EvaluationConfig::config_file_path() {
        println!("# Default config file: {}", path.display());
    }
    print!("{}", config.to_yaml().context("Failed to render configuration")?);

    Ok(())
}

fn print_results(results: &FieldResultCollection, json: bool) -> Result<()> {
    if json {
        println!("{}", results.to_json().context("Failed to serialize results")?);
        return Ok(());
    }

    let analysis = results.analysis();

    println!("Accuracy");
    println!("{}", "─".repeat(60));
    println!("  Overall:   {:.1}%", analysis.overall_accuracy() * 100.0);
    if !analysis.items_results().is_empty() {
        println!("  Items:     {:.1}%", analysis.items_accuracy() * 100.0);
    }
    println!(
        "  Correct:   {}/{} fields (score {:.2}/{:.2})",
        analysis.correct_count(),
        results.len(),
        analysis.total_score(),
        analysis.total_weight()
    );

    let items = analysis.item_summary();
    if !items.is_empty() {
        println!("\nLine items");
        println!("{}", "─".repeat(60));
        for (index, item) in &items {
            println!(
                "  [{:>2}] {:>6.1}%  ({}/{} fields)",
                index,
                item.accuracy * 100.0,
                item.correct_count,
                item.field_count
            );
        }
    }

    println!("\nFields");
    println!("{}", "─".repeat(60));
    for (field, accuracy) in analysis.field_accuracy_summary() {
        println!(
            "  {:<30} {:>6.1}%  ({}/{})",
            field,
            accuracy.weighted_accuracy * 100.0,
            accuracy.correct_count,
            accuracy.total_count
        );
    }

    let mismatches = analysis.incorrect_results();
    if !mismatches.is_empty() {
        println!("\nMismatches");
        println!("{}", "─".repeat(60));
        for result in mismatches {
            println!(
                "  {:<30} expected {} got {}",
                result.display_name(),
                result.expected_value(),
                result.actual_value()
            );
        }
    }

    Ok(())
}
