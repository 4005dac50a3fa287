use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hard ceiling for neighborhood expansion depth.
pub const MAX_TRAVERSAL_DEPTH: usize = 10;

const CONFIG_FILE_NAME: &str = "twbgraph.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwbgraphConfig {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Inputs above this size are rejected before parsing.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Inputs above this size are flagged but still processed.
    #[serde(default = "default_warn_file_bytes")]
    pub warn_file_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            warn_file_bytes: default_warn_file_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Closed-neighborhood evaluations allowed per expansion.
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_expansions: default_max_expansions(),
        }
    }
}

impl TraversalConfig {
    /// Clamp a requested depth into `[1, max_depth]`, never above
    /// [`MAX_TRAVERSAL_DEPTH`].
    #[must_use]
    pub fn clamp_depth(&self, requested: usize) -> usize {
        let ceiling = self.max_depth.clamp(1, MAX_TRAVERSAL_DEPTH);
        requested.clamp(1, ceiling)
    }
}

const fn default_max_file_bytes() -> u64 {
    100 * 1024 * 1024
}

const fn default_warn_file_bytes() -> u64 {
    25 * 1024 * 1024
}

const fn default_max_depth() -> usize {
    MAX_TRAVERSAL_DEPTH
}

const fn default_max_expansions() -> usize {
    100_000
}

/// Parse a config file. A missing file yields the defaults.
pub fn load_config_file(path: &Path) -> Result<TwbgraphConfig> {
    if !path.exists() {
        return Ok(TwbgraphConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<TwbgraphConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Candidate config locations, highest precedence first.
#[must_use]
pub fn config_search_paths(working_dir: &Path) -> Vec<PathBuf> {
    let mut paths = vec![working_dir.join(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("twbgraph/config.toml"));
    }
    paths
}

/// Resolve the effective config.
///
/// An explicit path must exist. Otherwise the first existing file from
/// [`config_search_paths`] wins, falling back to defaults.
pub fn resolve_config(explicit: Option<&Path>, working_dir: &Path) -> Result<TwbgraphConfig> {
    if let Some(path) = explicit {
        anyhow::ensure!(path.exists(), "config file {} does not exist", path.display());
        return load_config_file(path);
    }

    for candidate in config_search_paths(working_dir) {
        if candidate.exists() {
            return load_config_file(&candidate);
        }
    }

    Ok(TwbgraphConfig::default())
}
