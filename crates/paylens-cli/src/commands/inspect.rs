//! Inspect command - analyze a single saved checkout page.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use rust_decimal::Decimal;
use tracing::{debug, info};

use paylens_core::{AnalysisResult, CheckoutAnalyzer, CurrencyConverter, HtmlPage, HttpRateSource};

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Saved HTML page
    #[arg(required = true)]
    input: PathBuf,

    /// URL the page was saved from
    #[arg(short, long)]
    url: String,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Convert the total to US Dollars with the configured rate service
    #[arg(long)]
    convert: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "txt",
        }
    }
}

pub async fn run(args: InspectArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Inspecting {} as {}", args.input.display(), args.url);
    let page = HtmlPage::from_file(&args.input, args.url.clone())?;
    let result = CheckoutAnalyzer::new(&config).analyze(&page);

    let usd_amount = match (&result.report.amount, args.convert) {
        (Some(amount), true) => {
            let source = HttpRateSource::new(&config.rates)?;
            let converter =
                CurrencyConverter::with_reference(source, config.extraction.reference_currency);
            Some(converter.convert_to_usd(amount.amount, amount.currency_code).await)
        }
        _ => None,
    };

    let output = format_result(&result, usd_amount, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    for warning in &result.warnings {
        eprintln!("{} {}", style("⚠").yellow(), warning);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_result(
    result: &AnalysisResult,
    usd_amount: Option<Decimal>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(result)?;
            if let (Some(usd), Some(obj)) = (usd_amount, value.as_object_mut()) {
                obj.insert("usdAmount".to_string(), serde_json::to_value(usd)?);
            }
            Ok(serde_json::to_string_pretty(&value)?)
        }
        OutputFormat::Csv => format_csv(result, usd_amount),
        OutputFormat::Text => Ok(format_text(result, usd_amount)),
    }
}

fn format_csv(result: &AnalysisResult, usd_amount: Option<Decimal>) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "url",
        "is_checkout",
        "amount",
        "currency",
        "usd_amount",
        "merchant",
        "domain",
        "product_name",
        "check_in",
        "check_out",
    ])?;

    let report = &result.report;
    let product = report.product.as_ref();
    let field = |value: Option<&String>| value.cloned().unwrap_or_default();
    wtr.write_record([
        report.url.clone(),
        report.is_checkout.to_string(),
        report.amount.as_ref().map(|a| a.amount.to_string()).unwrap_or_default(),
        report.amount.as_ref().map(|a| a.currency_code.to_string()).unwrap_or_default(),
        usd_amount.map(|a| a.to_string()).unwrap_or_default(),
        report.merchant.name.clone(),
        report.merchant.domain.clone(),
        field(product.and_then(|p| p.product_name.as_ref())),
        field(product.and_then(|p| p.check_in.as_ref())),
        field(product.and_then(|p| p.check_out.as_ref())),
    ])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &AnalysisResult, usd_amount: Option<Decimal>) -> String {
    let report = &result.report;
    let mut output = String::new();

    output.push_str(&format!("Page: {}\n", report.url));
    output.push_str(&format!(
        "Checkout: {}\n",
        if report.is_checkout { "yes" } else { "no" }
    ));
    output.push('\n');

    output.push_str("Merchant:\n");
    output.push_str(&format!("  {}\n", report.merchant.name));
    output.push_str(&format!("  {}\n", report.merchant.domain));
    output.push('\n');

    output.push_str("Total:\n");
    match &report.amount {
        Some(amount) => {
            output.push_str(&format!("  {} {}\n", amount.amount, amount.currency_code));
            output.push_str(&format!("  (from \"{}\")\n", amount.original_text));
            if let Some(usd) = usd_amount {
                output.push_str(&format!("  USD: {}\n", usd));
            }
        }
        None => output.push_str("  not found\n"),
    }

    if let Some(product) = &report.product {
        output.push('\n');
        output.push_str("Product:\n");
        let fields = [
            ("Name", &product.product_name),
            ("Location", &product.location),
            ("Rating", &product.rating),
            ("Check-in", &product.check_in),
            ("Check-out", &product.check_out),
            ("Duration", &product.duration),
            ("Image", &product.image),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                output.push_str(&format!("  {}: {}\n", label, value));
            }
        }
        for info in &product.additional_info {
            output.push_str(&format!("  - {}\n", info));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> AnalysisResult {
        let page = HtmlPage::parse(
            "https://shop.example/checkout",
            "<title>Shop | Cart</title><p>Total: $44.50</p>",
        );
        CheckoutAnalyzer::default().analyze(&page)
    }

    #[test]
    fn test_json_carries_usd_amount() {
        let json = format_result(&result(), Some(Decimal::new(4450, 2)), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["usdAmount"], "44.50");
        assert_eq!(value["report"]["merchant"]["name"], "Shop");
    }

    #[test]
    fn test_csv_has_header_and_row() {
        let csv = format_result(&result(), None, OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("url,is_checkout,amount,currency"));
        assert!(lines[1].contains(",44.50,USD,"));
    }

    #[test]
    fn test_text_summary() {
        let text = format_result(&result(), None, OutputFormat::Text).unwrap();
        assert!(text.contains("Checkout: yes"));
        assert!(text.contains("44.50 USD"));
    }
}
