use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Options recognized by [`StructureSystem`](crate::StructureSystem).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Name of the artifact subdirectory, `<root>/<mode>/<image_name>/`.
    pub mode: String,
    /// Run the detector on the CUDA execution provider (needs the `cuda` feature).
    pub use_gpu: bool,
    /// Enable layout detection. Without it the whole page is a single region.
    pub layout: bool,
    pub layout_model_dir: Option<PathBuf>,
    pub layout_dict_path: Option<PathBuf>,
    pub layout_score_threshold: f32,
    pub table: bool,
    pub ocr: bool,
    /// Associate recognized lines with regions.
    pub attach_text: bool,
    pub return_word_box: bool,
    pub vis_font_path: Option<PathBuf>,
    /// Scratch root for the per-call temporary workspace.
    pub image_dir: Option<PathBuf>,
    /// When set, artifacts are also written here and kept.
    pub output: Option<PathBuf>,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            mode: "structure".to_string(),
            use_gpu: false,
            layout: true,
            layout_model_dir: None,
            layout_dict_path: None,
            layout_score_threshold: 0.5,
            table: false,
            ocr: false,
            attach_text: false,
            return_word_box: false,
            vis_font_path: None,
            image_dir: None,
            output: None,
        }
    }
}

impl StructureConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Effective configuration: text recognition requires layout detection.
    pub fn resolved(&self) -> Self {
        let mut config = self.clone();
        if !config.layout && (config.ocr || config.table) {
            config.ocr = false;
            config.table = false;
            tracing::warn!("When layout is false, ocr is automatically set to false");
        }
        config
    }

    pub fn recognition_enabled(&self) -> bool {
        self.layout && (self.ocr || self.table)
    }
}
