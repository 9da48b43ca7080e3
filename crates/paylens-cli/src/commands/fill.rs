//! Fill command - dry-run card autofill against a saved page.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use paylens_core::fill::FILLED_NOTICE;
use paylens_core::session::RecordingSurface;
use paylens_core::{autofill, CardCredential, FieldRole, FillReport, HtmlPage};

/// Arguments for the fill command.
#[derive(Args)]
pub struct FillArgs {
    /// Saved HTML page
    #[arg(required = true)]
    input: PathBuf,

    /// URL the page was saved from
    #[arg(short, long)]
    url: String,

    /// Card credential JSON (`pan`, `cvv`, `expMonth`, `expYear`, `cardholderName`)
    #[arg(long)]
    card: PathBuf,

    /// Print the fill report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: FillArgs, _config_path: Option<&str>) -> anyhow::Result<()> {
    let card: CardCredential = serde_json::from_str(&fs::read_to_string(&args.card)?)?;
    let issues = card.validate();
    if !issues.is_empty() {
        anyhow::bail!("Invalid card: {}", issues.join("; "));
    }

    let mut page = HtmlPage::from_file(&args.input, args.url.clone())?;
    let mut surface = RecordingSurface::new();

    info!("Dry-run autofill on {}", args.input.display());
    let report = autofill(&mut page, &mut surface, &card);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print!("{}", format_report(&report, &page, &card));
    if surface
        .notices()
        .iter()
        .any(|(message, _)| *message == FILLED_NOTICE)
    {
        println!("{} {}", style("✓").green(), FILLED_NOTICE);
    }

    Ok(())
}

/// One line per role: the bound element and the masked value it received.
fn format_report(report: &FillReport, page: &HtmlPage, card: &CardCredential) -> String {
    let mut output = String::new();

    for binding in &report.bindings {
        let written = page.value(binding.element.handle).unwrap_or("");
        let shown = mask(binding.role, written, card);
        let status = if report.filled.contains(&binding.role) {
            style("filled").green().to_string()
        } else {
            style("failed").red().to_string()
        };
        output.push_str(&format!(
            "{:<12} {:<32} {:<20} {}\n",
            binding.role.as_str(),
            binding.element.describe(),
            shown,
            status
        ));
    }

    for role in &report.missing {
        output.push_str(&format!(
            "{:<12} {}\n",
            role.as_str(),
            style("not found").yellow()
        ));
    }

    for (role, reason) in &report.failed {
        output.push_str(&format!("{:<12} {}\n", role.as_str(), style(reason).red()));
    }

    output.push_str(&format!("Expiry: {:?}\n", report.expiry_mode));
    output
}

fn mask(role: FieldRole, value: &str, card: &CardCredential) -> String {
    if value.is_empty() {
        return String::new();
    }
    match role {
        FieldRole::CardNumber => format!("**** {}", card.last4()),
        FieldRole::Cvv => "***".to_string(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> CardCredential {
        CardCredential {
            pan: "4111111111111111".to_string(),
            cvv: "737".to_string(),
            exp_month: 9,
            exp_year: 2030,
            cardholder_name: None,
        }
    }

    #[test]
    fn test_report_masks_secrets() {
        let mut page = HtmlPage::parse(
            "https://shop.example/checkout",
            r#"<input name="cardnumber"><input name="cc-exp"><input name="cvv">"#,
        );
        let mut surface = RecordingSurface::new();
        let report = autofill(&mut page, &mut surface, &card());

        let text = format_report(&report, &page, &card());
        assert!(!text.contains("4111111111111111"));
        assert!(!text.contains("737"));
        assert!(text.contains("**** 1111"));
        assert!(text.contains("09/30"));
    }
}
