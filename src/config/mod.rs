pub use adforge_core::config::*;

use adforge_core::Error;
use anyhow::{Context, Result};
use std::path::Path;

/// Default config locations, searched in order.
const DEFAULT_PATHS: [&str; 3] = [
    "./adforge.toml",
    "./config.toml",
    "~/.config/adforge/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

    let config = Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    tracing::debug!(path = %path.display(), backend = %config.backend.url, "Loaded config");
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    tracing::debug!("No config file found, using defaults");
    Ok(Config::default())
}
