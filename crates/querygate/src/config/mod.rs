//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > CLI > defaults.
//! Callers seed a [`ConfigBuilder`] with CLI values; the file and then the
//! environment are layered on top of it.

mod builder;
mod env;
mod file;

use std::path::Path;

pub use builder::{Config, ConfigBuilder, ErrorsConfig, HttpConfig, TelemetryConfig};

use crate::Result;

/// Layer the discovered config file (if any) and the environment over `base`
pub fn load_config(base: ConfigBuilder) -> Result<ConfigBuilder> {
    let mut builder = base;

    if let Some(path) = file::find_config_file() {
        tracing::info!("Loading configuration from {}", path.display());
        builder = file::load_from_file(&path, builder)?;
    }

    env::load_from_env(builder)
}

/// Layer a specific config file and the environment over `base`
pub fn load_config_from_path(base: ConfigBuilder, path: &Path) -> Result<ConfigBuilder> {
    tracing::info!("Loading configuration from {}", path.display());
    let builder = file::load_from_file(path, base)?;
    env::load_from_env(builder)
}
