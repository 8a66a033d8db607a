use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Engine configuration. Every field has a default, so an absent config file
/// yields a fully working setup; a present but malformed file is an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Accepted image extensions, matched case-insensitively without the dot.
    pub extensions: Vec<String>,
    /// A directory whose own name contains any of these tokens
    /// (case-insensitively) is pruned together with its whole subtree.
    pub excluded_folders: Vec<String>,
    /// Minimum accepted file size in KB (inclusive).
    pub min_file_size_kb: u64,
    /// Maximum accepted file size in MB (inclusive).
    pub max_file_size_mb: u64,
    /// Images wider or taller than this are downscaled before embedding.
    pub max_image_dim: u32,
    /// Directory holding the persisted snapshot artifacts.
    pub data_dir: PathBuf,
    /// ONNX vision model consumed by the bundled embedder.
    pub model_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_folders: [
                "System32",
                "Windows",
                "Program Files",
                "AppData",
                ".git",
                "__pycache__",
                "temp",
                "tmp",
                "cache",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_file_size_kb: 1,
            max_file_size_mb: 50,
            max_image_dim: 1024,
            data_dir: PathBuf::from("data"),
            model_path: PathBuf::from("models/clip-vit-b-32.onnx"),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file. A missing file is not an error;
    /// it just means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }
}
