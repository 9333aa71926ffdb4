//! Config and cache directory discovery with environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "TOYSAVER_CONFIG_DIR";
pub const ENV_CACHE_DIR: &str = "TOYSAVER_CACHE_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "toysaver";
const APPLICATION: &str = "toysaver";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    cache_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_override = env_override(ENV_CONFIG_DIR);
        let cache_override = env_override(ENV_CACHE_DIR);
        if let (Some(config_dir), Some(cache_dir)) = (&config_override, &cache_override) {
            return Ok(Self::new(config_dir.clone(), cache_dir.clone()));
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        let config_dir = match config_override {
            Some(dir) => dir,
            None => ensure_dir(project_dirs.config_dir(), "config")?,
        };
        let cache_dir = match cache_override {
            Some(dir) => dir,
            None => ensure_dir(project_dirs.cache_dir(), "cache")?,
        };
        Ok(Self::new(config_dir, cache_dir))
    }

    pub fn new(config_dir: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            config_dir,
            cache_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.toml")
    }

    /// Wrapped sources of shaders that failed validation, for inspection.
    pub fn rejected_dir(&self) -> PathBuf {
        self.cache_dir.join("rejected")
    }
}

fn ensure_dir(path: &Path, label: &str) -> Result<PathBuf> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            format!(
                "failed to create toysaver {label} directory at {}",
                path.display()
            )
        })?;
    }
    Ok(path.to_path_buf())
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
