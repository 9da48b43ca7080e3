use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CHECKOUT: &str = r#"<html>
<head><title>Harbor Inn | Secure checkout</title></head>
<body>
  <h1>Harbor Inn Waterfront</h1>
  <p>Subtotal: $200.00</p>
  <p>Taxes: $24.00</p>
  <p>Total: $224.00</p>
  <form>
    <input name="cardnumber" placeholder="Card number">
    <select name="exp_month"><option>01</option></select>
    <select name="exp_year"><option>30</option></select>
    <input name="cvc">
    <input name="cardholder-name">
  </form>
</body>
</html>"#;

fn paylens() -> Command {
    Command::cargo_bin("paylens").unwrap()
}

/// Temp dir holding a default config and a saved checkout page.
fn workspace() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");
    let page = dir.path().join("checkout.html");
    fs::write(&page, CHECKOUT).unwrap();

    paylens()
        .args(["config", "init", "--output"])
        .arg(&config)
        .assert()
        .success();

    (dir, config, page)
}

fn config_arg(config: &Path) -> [String; 2] {
    ["-c".to_string(), config.display().to_string()]
}

#[test]
fn inspect_prints_last_total_and_merchant() {
    let (_dir, config, page) = workspace();

    paylens()
        .args(config_arg(&config))
        .arg("inspect")
        .arg(&page)
        .args(["--url", "https://www.harborinn.example/checkout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"amount\": \"224.00\""))
        .stdout(predicate::str::contains("\"currencyCode\": \"USD\""))
        .stdout(predicate::str::contains("\"name\": \"Harbor Inn\""))
        .stdout(predicate::str::contains("\"domain\": \"harborinn.example\""))
        .stdout(predicate::str::contains("Harbor Inn Waterfront"));
}

#[test]
fn inspect_text_format() {
    let (_dir, config, page) = workspace();

    paylens()
        .args(config_arg(&config))
        .arg("inspect")
        .arg(&page)
        .args(["--url", "https://harborinn.example/checkout", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checkout: yes"))
        .stdout(predicate::str::contains("224.00 USD"));
}

#[test]
fn inspect_missing_file_fails() {
    let (dir, config, _page) = workspace();

    paylens()
        .args(config_arg(&config))
        .arg("inspect")
        .arg(dir.path().join("nope.html"))
        .args(["--url", "https://harborinn.example/checkout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn fill_dry_run_masks_card() {
    let (dir, config, page) = workspace();
    let card = dir.path().join("card.json");
    fs::write(
        &card,
        r#"{"pan":"4000056655665556","cvv":"321","expMonth":7,"expYear":2031,"cardholderName":"Sam Doe"}"#,
    )
    .unwrap();

    paylens()
        .args(config_arg(&config))
        .arg("fill")
        .arg(&page)
        .args(["--url", "https://harborinn.example/checkout", "--card"])
        .arg(&card)
        .assert()
        .success()
        .stdout(predicate::str::contains("**** 5556"))
        .stdout(predicate::str::contains("Separate"))
        .stdout(predicate::str::contains("4000056655665556").not())
        .stdout(predicate::str::contains("321").not());
}

#[test]
fn fill_rejects_invalid_card() {
    let (dir, config, page) = workspace();
    let card = dir.path().join("card.json");
    fs::write(&card, r#"{"pan":"4000","cvv":"321","expMonth":13,"expYear":2031}"#).unwrap();

    paylens()
        .args(config_arg(&config))
        .arg("fill")
        .arg(&page)
        .args(["--url", "https://harborinn.example/checkout", "--card"])
        .arg(&card)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid card"));
}

#[test]
fn batch_writes_summary() {
    let (dir, config, _page) = workspace();
    let out = dir.path().join("out");

    paylens()
        .args(config_arg(&config))
        .arg("batch")
        .arg(format!("{}/*.html", dir.path().display()))
        .args(["--url-base", "https://harborinn.example", "--summary", "--output-dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Inspected 1 pages"));

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.starts_with("filename,status,is_checkout,amount"));
    assert!(summary.contains("checkout.html,success,true,224.00,USD"));
    assert!(out.join("checkout.json").exists());
}

#[test]
fn convert_reference_currency_is_identity() {
    let (_dir, config, _page) = workspace();

    paylens()
        .args(config_arg(&config))
        .args(["convert", "1,250.50", "usd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1250.50 USD"));
}

#[test]
fn config_get_reads_written_file() {
    let (_dir, config, _page) = workspace();

    paylens()
        .args(config_arg(&config))
        .args(["config", "get", "session.fill_delay_ms"])
        .assert()
        .success()
        .stdout(predicate::str::contains("500"));
}
