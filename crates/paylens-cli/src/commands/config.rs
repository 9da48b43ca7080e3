//! Config command - manage the configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use paylens_core::PaylensConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a configuration value
    Get {
        /// Dotted key (e.g., "session.fill_delay_ms")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Dotted key
        key: String,
        /// New value, JSON or a bare string
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

/// Every subcommand works on the `-c` file when given, else the default.
pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_path.map_or_else(default_config_path, PathBuf::from);

    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(init_args, &path),
        ConfigCommand::Get { key } => get_config(&path, &key),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
        ConfigCommand::Path => show_path(&path),
    }
}

/// `<config_dir>/paylens/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paylens")
        .join("config.json")
}

fn load_or_default(path: &Path) -> anyhow::Result<PaylensConfig> {
    if path.exists() {
        Ok(PaylensConfig::from_file(path)?)
    } else {
        Ok(PaylensConfig::default())
    }
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        eprintln!(
            "{} No config file at {}, showing defaults.",
            style("ℹ").blue(),
            path.display()
        );
    }
    let config = load_or_default(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn init_config(args: InitArgs, default_path: &Path) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(|| default_path.to_path_buf());

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    PaylensConfig::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

fn get_config(path: &Path, key: &str) -> anyhow::Result<()> {
    let json = serde_json::to_value(load_or_default(path)?)?;
    let value = lookup(&json, key)
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn set_config(path: &Path, key: &str, raw: &str) -> anyhow::Result<()> {
    let value: Value =
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let mut json = serde_json::to_value(load_or_default(path)?)?;
    assign(&mut json, key, value.clone())?;

    // Round-trip through the typed config so bad values are rejected.
    let config: PaylensConfig = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&value)?
    );

    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", path.display());

    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'paylens config init' to create a configuration file.");
    }

    Ok(())
}

fn lookup<'a>(json: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(json, |current, part| current.get(part))
}

/// Set an existing dotted key. Only leaf keys of existing sections can be set.
fn assign(json: &mut Value, key: &str, value: Value) -> anyhow::Result<()> {
    let (section, leaf) = match key.rsplit_once('.') {
        Some((section, leaf)) => (Some(section), leaf),
        None => (None, key),
    };

    let mut current = json;
    if let Some(section) = section {
        for part in section.split('.') {
            current = current
                .get_mut(part)
                .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", key))?;
        }
    }

    let obj = current
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Cannot set value at non-object path: {}", key))?;
    if !obj.contains_key(leaf) {
        anyhow::bail!("Configuration key not found: {}", key);
    }
    obj.insert(leaf.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_dotted_key() {
        let json = serde_json::to_value(PaylensConfig::default()).unwrap();
        assert_eq!(lookup(&json, "session.fill_delay_ms"), Some(&json!(500)));
        assert_eq!(lookup(&json, "extraction.default_currency"), Some(&json!("USD")));
        assert!(lookup(&json, "session.nope").is_none());
    }

    #[test]
    fn test_assign_rejects_unknown_keys() {
        let mut json = serde_json::to_value(PaylensConfig::default()).unwrap();
        assign(&mut json, "rates.timeout_secs", json!(3)).unwrap();
        assert_eq!(json["rates"]["timeout_secs"], 3);

        assert!(assign(&mut json, "rates.timeout", json!(3)).is_err());
        assert!(assign(&mut json, "missing.key", json!(3)).is_err());
    }

    #[test]
    fn test_set_and_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        set_config(&path, "session.opener_url", "https://dash.example").unwrap();
        let config = PaylensConfig::from_file(&path).unwrap();
        assert_eq!(config.session.opener_url, "https://dash.example");

        assert!(set_config(&path, "extraction.default_currency", "XYZ").is_err());
    }
}
