//! Layered configuration for novelsync.
//!
//! Values are merged in increasing order of precedence:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. `config.toml` in the platform configuration directory, if present,
//! 3. an explicitly supplied file (TOML, YAML or JSON, chosen by extension),
//! 4. `NOVELSYNC_*` environment variables.
//!
//! Command-line flags are applied on top by the binary.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use novelsync_compress::Compression;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "NOVELSYNC_";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory that novel folders are created in.
    pub output_dir: PathBuf,
    /// Format of the per-novel episode cache (`none` or `gzip`).
    pub cache_compression: Compression,
    /// Remove stale, index-prefixed files that no chapter owns after syncing.
    pub check_fs: bool,
    /// Pause between chapter fetches, for providers that talk to a network.
    pub request_delay_ms: u64,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            cache_compression: Compression::Gzip,
            check_fs: false,
            request_delay_ms: 0,
        }
    }
}

impl Config {
    /// Load configuration from every layer, optionally including an explicit file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = Self::figment(explicit)?.extract::<Self>().map_err(|e| ErrorKind::Invalid(e.to_string()))?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// The merged provider stack, before extraction.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = Self::default_path().filter(|p| p.is_file()) {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            figment = match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Location of the per-user configuration file.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "novelsync").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}
