//! Deck configuration types used by deckd.
//!
//! A [`Deck`] is an ordered list of pages; each page is an ordered list of
//! [`KeyConfig`] values indexed by physical tile position.

use std::{
    env,
    path::{Path, PathBuf},
};

mod deck;
mod error;
mod loader;

pub use deck::{Deck, KeyConfig, Page};
pub use error::Error;
pub use loader::load_from_path;

/// File name of the per-user deck configuration in `$HOME`.
pub const DEFAULT_CONFIG_NAME: &str = ".streamdeck-config.json";

/// Determine the preferred user config path (`~/.streamdeck-config.json`).
pub fn default_config_path() -> PathBuf {
    let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
    p.push(DEFAULT_CONFIG_NAME);
    p
}

/// Resolve the effective config path.
///
/// Uses `explicit` when provided, otherwise the default path if it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let preferred = default_config_path();
    if preferred.exists() {
        return Ok(preferred);
    }

    Err(Error::Read {
        path: Some(preferred),
        message: format!("No config found. Create ~/{DEFAULT_CONFIG_NAME} or pass --config"),
    })
}
