//! Convert command - normalize an amount to US Dollars.

use std::str::FromStr;

use clap::Args;
use console::style;
use rust_decimal::Decimal;

use paylens_core::extract::parse_amount;
use paylens_core::rates::apply_rate;
use paylens_core::{Currency, CurrencyConverter, HttpRateSource};

/// Arguments for the convert command.
#[derive(Args)]
pub struct ConvertArgs {
    /// Amount, e.g. `1,250.00`
    amount: String,

    /// Source currency code, e.g. `INR`
    currency: String,
}

pub async fn run(args: ConvertArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    let amount: Decimal = parse_amount(&args.amount)
        .ok_or_else(|| anyhow::anyhow!("Not a positive amount: {}", args.amount))?;
    let currency = Currency::from_str(&args.currency).map_err(anyhow::Error::msg)?;

    let source = HttpRateSource::new(&config.rates)?;
    let converter = CurrencyConverter::with_reference(source, config.extraction.reference_currency);

    if currency == converter.reference() {
        println!("{} {}", amount, currency);
        return Ok(());
    }

    match converter.rate(currency).await {
        Ok(rate) => {
            let converted = apply_rate(amount, rate).ok_or_else(|| {
                anyhow::anyhow!("{} {} is too large to convert at {}", amount, currency, rate)
            })?;
            println!("{} {}", converted, converter.reference());
            eprintln!(
                "{} 1 {} = {} {}",
                style("ℹ").blue(),
                currency,
                rate,
                converter.reference()
            );
        }
        Err(e) => {
            eprintln!("{} Rate lookup failed: {}", style("⚠").yellow(), e);
            println!("{} {}", amount, currency);
        }
    }

    Ok(())
}
