use std::path::Path;

use anyhow::{Context, Result};
use rfx_ast::Options;

/// Config file picked up from the working directory when `--config` is
/// not given.
pub const DEFAULT_CONFIG: &str = "rfx.config.json";

/// Load options from `path`, or from `rfx.config.json` if present, or the
/// defaults.
pub fn load(path: Option<&Path>) -> Result<Options> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).is_file() => Path::new(DEFAULT_CONFIG),
        None => return Ok(Options::default()),
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let options = serde_json::from_str(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(config = %path.display(), "loaded options");
    Ok(options)
}
