//! Config file loading for the `pairank` CLI.
//!
//! Config lives at `~/.config/pairank/config.toml`. Every field is optional
//! and command-line flags override file values.

use pairank_core::{LoggingConfig, RatingConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::bail;

const DEFAULT_DATABASE_FILE: &str = "pairank.db";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PairankConfig {
    /// SQLite database file.
    pub database: Option<PathBuf>,
    pub log_level: Option<String>,
    /// Absolute log directory; file logging is off when unset.
    pub log_dir: Option<PathBuf>,
    /// Defaults for new collections and selection tunables.
    pub rating: RatingConfig,
}

impl PairankConfig {
    /// Database path: flag, then config file, then `./pairank.db`.
    pub fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.database.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE))
    }

    /// Logging settings: environment variables win over the config file.
    pub fn logging(&self) -> Option<LoggingConfig> {
        LoggingConfig::from_env().or_else(|| {
            let log_dir = self.log_dir.clone()?;
            let level = self
                .log_level
                .clone()
                .unwrap_or_else(|| pairank_core::default_log_level().to_string());
            Some(LoggingConfig::new(level, log_dir))
        })
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# pairank configuration
# All values here can be overridden by CLI flags.

# SQLite database file
# database = \"/home/me/.local/share/pairank/pairank.db\"

# File logging (absolute directory). PAIRANK_LOG_DIR / PAIRANK_LOG_LEVEL win.
# log_dir = \"/home/me/.local/state/pairank/logs\"
# log_level = \"info\"

[rating]
# Model for new collections: \"elo\" or \"glicko2\"
model = \"elo\"
# ELO k-factor for new collections
k_factor = 16

# Glicko-2 constants for new collections; change existing ones with
# `pairank collection set-model`
[rating.glicko2]
tau = 1.0
epsilon = 0.000001

[rating.selection]
# Reliability (%) from which opponents are drawn near the first item's rating
reliability_threshold = 85.0
rating_window = 100.0
";

/// Returns the default config path: `~/.config/pairank/config.toml`.
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| bail("HOME environment variable not set"));
    PathBuf::from(home)
        .join(".config")
        .join("pairank")
        .join("config.toml")
}

/// Loads config from `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> PairankConfig {
    let config: PairankConfig = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .unwrap_or_else(|e| bail(format!("Failed to parse config at {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => PairankConfig::default(),
        Err(e) => bail(format!("Failed to read config at {}: {e}", path.display())),
    };
    if let Err(e) = config.rating.validate() {
        bail(format!("Invalid rating settings in {}: {e}", path.display()));
    }
    config
}

/// Writes the default config file. Fails if it already exists.
pub fn create_default_config() -> PathBuf {
    let path = config_path();

    if path.exists() {
        bail(format!("Config file already exists at {}", path.display()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| bail(format!("Failed to create directory {}: {e}", parent.display())));
    }
    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .unwrap_or_else(|e| bail(format!("Failed to write config to {}: {e}", path.display())));

    path
}
