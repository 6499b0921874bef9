//! Configuration management for netdiff

mod io;
mod types;

pub use types::*;

use anyhow::Result;
use std::path::PathBuf;

impl Config {
    /// Get the config file path (~/.config/netdiff/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        io::config_path()
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> Result<Self> {
        io::load()
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        io::save(self)
    }

    /// Declared category names in configuration order.
    pub fn category_names(&self) -> Vec<&str> {
        self.masking
            .categories
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }
}
