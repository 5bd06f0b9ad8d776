//! Settings loading for docmap.
//!
//! Layered config: defaults -> ~/.config/docmap/config -> explicit file ->
//! environment (`DOCMAP_*`, nested keys separated by `__`).

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use docmap_mapper::CacheConfig;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Smallest writer memory budget the engine accepts per thread.
pub const MIN_WRITER_MEMORY_MB: usize = 15;

fn default_index_root() -> String {
    ProjectDirs::from("", "", "docmap")
        .map(|p| p.data_local_dir().join("indexes"))
        .unwrap_or_else(|| PathBuf::from("./indexes"))
        .to_string_lossy()
        .to_string()
}

fn default_writer_memory_mb() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding one sub-directory per collection
    #[serde(default = "default_index_root")]
    pub index_root: String,

    /// Memory budget of each collection writer in MB
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,

    /// Fallback log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Conversion cache eviction
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_root: default_index_root(),
            writer_memory_mb: default_writer_memory_mb(),
            log_level: default_log_level(),
            cache: CacheConfig::default(),
        }
    }
}

impl Settings {
    /// Settings rooted at an explicit index directory, defaults elsewhere.
    pub fn with_index_root(root: impl Into<PathBuf>) -> Self {
        Self {
            index_root: root.into().to_string_lossy().to_string(),
            ..Self::default()
        }
    }

    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/docmap/config.{toml,json,...})
    /// 3. Explicit config file (optional, must exist when given)
    /// 4. Environment variables (DOCMAP_*)
    pub fn load(config_path: Option<&str>) -> Result<Self, SearchError> {
        let config_dir = ProjectDirs::from("", "", "docmap")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let default_config_path = config_dir.join("config");

        let defaults = CacheConfig::default();
        let mut builder = Config::builder()
            .set_default("index_root", default_index_root())
            .map_err(settings_error)?
            .set_default("writer_memory_mb", default_writer_memory_mb() as i64)
            .map_err(settings_error)?
            .set_default("log_level", default_log_level())
            .map_err(settings_error)?
            .set_default("cache.collect_per_items", defaults.collect_per_items as i64)
            .map_err(settings_error)?
            .set_default(
                "cache.collect_hit_count_min",
                defaults.collect_hit_count_min as i64,
            )
            .map_err(settings_error)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // DOCMAP_INDEX_ROOT, DOCMAP_CACHE__COLLECT_PER_ITEMS, ...
        builder = builder.add_source(
            Environment::with_prefix("DOCMAP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(settings_error)?
            .try_deserialize()
            .map_err(settings_error)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.index_root.trim().is_empty() {
            return Err(SearchError::Settings("index_root must not be empty".into()));
        }
        if self.writer_memory_mb < MIN_WRITER_MEMORY_MB {
            return Err(SearchError::Settings(format!(
                "writer_memory_mb must be at least {MIN_WRITER_MEMORY_MB}, got {}",
                self.writer_memory_mb
            )));
        }
        if self.cache.collect_per_items == 0 {
            return Err(SearchError::Settings(
                "cache.collect_per_items must be at least 1".into(),
            ));
        }
        if self.log_level.trim().is_empty() {
            return Err(SearchError::Settings("log_level must not be empty".into()));
        }
        Ok(())
    }

    /// Expand ~ in index_root to the home directory.
    pub fn expanded_index_root(&self) -> PathBuf {
        if let Some(rest) = self.index_root.strip_prefix("~/") {
            if let Some(dirs) = BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.index_root)
    }
}

fn settings_error(e: config::ConfigError) -> SearchError {
    SearchError::Settings(e.to_string())
}
