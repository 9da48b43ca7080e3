//! Batch command - inspect many saved pages.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use paylens_core::{AnalysisResult, CheckoutAnalyzer, HtmlPage};

use super::inspect::{format_result, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Base URL; each page is analyzed as `<base>/<file stem>`
    #[arg(short, long)]
    url_base: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of inspecting a single file.
struct InspectResult {
    path: PathBuf,
    analysis: Option<AnalysisResult>,
    error: Option<String>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "html" | "htm")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} pages to inspect",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages")?
            .progress_chars("=>-"),
    );

    let analyzer = CheckoutAnalyzer::new(&config);
    let mut results = Vec::with_capacity(files.len());

    for path in files {
        match inspect_file(&path, &args.url_base, &analyzer) {
            Ok(analysis) => results.push(InspectResult {
                path,
                analysis: Some(analysis),
                error: None,
            }),
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to inspect {}: {}", path.display(), error_msg);
                    results.push(InspectResult {
                        path,
                        analysis: None,
                        error: Some(error_msg),
                    });
                } else {
                    error!("Failed to inspect {}: {}", path.display(), error_msg);
                    anyhow::bail!("Inspection failed: {}", error_msg);
                }
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    if let Some(output_dir) = &args.output_dir {
        for result in &results {
            if let Some(analysis) = &result.analysis {
                let output_path =
                    output_dir.join(format!("{}.{}", file_stem(&result.path), args.format.extension()));
                fs::write(&output_path, format_result(analysis, None, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let checkouts = results
        .iter()
        .filter(|r| r.analysis.as_ref().is_some_and(|a| a.report.is_checkout))
        .count();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    println!();
    println!(
        "{} Inspected {} pages in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} checkout pages, {} failed",
        style(checkouts).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn inspect_file(
    path: &Path,
    url_base: &str,
    analyzer: &CheckoutAnalyzer,
) -> anyhow::Result<AnalysisResult> {
    let url = format!("{}/{}", url_base.trim_end_matches('/'), file_stem(path));
    let page = HtmlPage::from_file(path, url)?;
    Ok(analyzer.analyze(&page))
}

fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("page")
}

fn write_summary(path: &Path, results: &[InspectResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "is_checkout",
        "amount",
        "currency",
        "merchant",
        "domain",
        "product_name",
        "warnings",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();

        let record = match &result.analysis {
            Some(analysis) => {
                let report = &analysis.report;
                [
                    filename,
                    "success".to_string(),
                    report.is_checkout.to_string(),
                    report.amount.as_ref().map(|a| a.amount.to_string()).unwrap_or_default(),
                    report.amount.as_ref().map(|a| a.currency_code.to_string()).unwrap_or_default(),
                    report.merchant.name.clone(),
                    report.merchant.domain.clone(),
                    report
                        .product
                        .as_ref()
                        .and_then(|p| p.product_name.clone())
                        .unwrap_or_default(),
                    analysis.warnings.len().to_string(),
                    analysis.processing_time_ms.to_string(),
                    String::new(),
                ]
            }
            None => [
                filename,
                "error".to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                result.error.clone().unwrap_or_default(),
            ],
        };
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
