//! `memarena` configuration.
//!
//! Provides configuration via an optional `arena.toml` and `ARENA_*`
//! environment variables layered over a caller-supplied base.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`ARENA_*`)
//! 2. Configuration file (`arena.toml`)
//! 3. The [`ArenaConfig`] passed in (its fields act as the base layer, not
//!    an override — there is no way to distinguish "caller set this
//!    explicitly" from "caller left it at its `Default`" on a plain struct,
//!    so file and environment values always win when present)

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::layout::DEFAULT_FILE_SIZE;

/// Default location `Arena::open_with_config` looks for an `arena.toml`.
pub const DEFAULT_CONFIG_PATH: &str = "arena.toml";

/// Sizing and lifecycle knobs for an [`crate::Arena`].
///
/// The defaults reproduce the growth arithmetic described by the on-disk
/// format itself: double the mapped size, or `allocated + needed + 4096`,
/// whichever is larger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Minimum size for a freshly created file. Requests smaller than
    /// `header size + 64 bytes` are substituted with [`DEFAULT_FILE_SIZE`]
    /// regardless of this setting, matching the format's own open contract.
    pub initial_size: u64,
    /// Minimum number of bytes added on top of `allocated + needed` when
    /// growing the file.
    pub min_growth: u64,
    /// Multiplier applied to the current mapped size when growing.
    pub growth_factor: u64,
    /// Whether `open` may create a new file if the path does not exist.
    /// If `false` and the file is absent, `open` fails with `Error::Io`.
    pub create_if_missing: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_FILE_SIZE,
            min_growth: DEFAULT_FILE_SIZE,
            growth_factor: 2,
            create_if_missing: true,
        }
    }
}

impl ArenaConfig {
    /// Builds a config by layering `arena.toml` (if present at `config_path`)
    /// and `ARENA_*` environment variables over this config's fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the TOML file or environment variables
    /// cannot be parsed into an [`ArenaConfig`].
    pub fn resolve(&self, config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let mut figment = Figment::new().merge(Serialized::defaults(self));

        if config_path.exists() {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(Env::prefixed("ARENA_"));

        figment
            .extract()
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))
    }
}
