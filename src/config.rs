use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub legacy: Option<LegacyConfig>,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub root: PathBuf,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "v2025-01-15".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LegacyConfig {
    pub root: PathBuf,
    #[serde(default = "default_image_globs")]
    pub image_globs: Vec<String>,
}

fn default_image_globs() -> Vec<String> {
    ["*.png", "*.jpg", "*.jpeg", "*.gif", "*.bmp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl LegacyConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            image_globs: default_image_globs(),
        }
    }

    /// Compiles `image_globs` into a case-insensitive matcher over file names.
    pub fn image_matcher(&self) -> Result<GlobSet> {
        build_globset(&self.image_globs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_verify_hash")]
    pub verify_content_hash: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            verify_content_hash: true,
        }
    }
}

fn default_verify_hash() -> bool {
    true
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid glob pattern: '{}'", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.dataset.version.trim().is_empty() {
        anyhow::bail!("dataset.version must not be empty");
    }

    if let Some(legacy) = &config.legacy {
        if legacy.image_globs.is_empty() {
            anyhow::bail!("legacy.image_globs must list at least one pattern");
        }
        legacy.image_matcher()?;
    }

    Ok(config)
}
