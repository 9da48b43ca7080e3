//! Subcommands.

pub mod batch;
pub mod config;
pub mod convert;
pub mod fill;
pub mod inspect;

use std::path::Path;

use paylens_core::PaylensConfig;

/// Load the configuration named on the command line, or the saved one, or
/// the defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<PaylensConfig> {
    if let Some(path) = config_path {
        return Ok(PaylensConfig::from_file(Path::new(path))?);
    }

    let saved = config::default_config_path();
    if saved.exists() {
        Ok(PaylensConfig::from_file(&saved)?)
    } else {
        Ok(PaylensConfig::default())
    }
}
