//! Optional config file loading. Search order: ./ficbind.toml, then
//! $XDG_CONFIG_HOME/ficbind/config.toml (or ~/.config/ficbind/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct Config {
    /// Directory for written books when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Simultaneous chapter downloads (1 to 20).
    pub max_concurrent_fetches: Option<usize>,
    /// CSS file replacing the bundled stylesheet.
    pub stylesheet: Option<PathBuf>,
}

/// Search order: (1) ./ficbind.toml, (2) $XDG_CONFIG_HOME/ficbind/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("ficbind.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("ficbind").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let config = read_config(path)?;
            tracing::debug!(path = %path.display(), "Loaded config");
            return Ok(Some(config));
        }
    }
    Ok(None)
}

/// Read and parse one config file.
pub fn read_config(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}
