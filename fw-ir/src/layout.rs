use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where IR inputs are read from and generated artifacts are written to,
/// relative to a working root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactLayout {
    pub input_dir: String,
    pub input_prefix: String,
    pub input_suffix: String,
    pub output_dir: String,
    pub output_prefix: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            input_dir: "compiled".to_string(),
            input_prefix: "fw".to_string(),
            input_suffix: "config".to_string(),
            output_dir: "final".to_string(),
            output_prefix: "fw".to_string(),
        }
    }
}

impl ArtifactLayout {
    /// `<root>/<input_dir>/<input_prefix><index>.<input_suffix>`
    pub fn input_path(&self, root: &Path, index: usize) -> PathBuf {
        root.join(&self.input_dir).join(format!(
            "{}{index}.{}",
            self.input_prefix, self.input_suffix
        ))
    }

    pub fn output_root(&self, root: &Path) -> PathBuf {
        root.join(&self.output_dir)
    }

    /// `<root>/<output_dir>/<output_prefix><index>.<language>`
    pub fn output_path(&self, root: &Path, index: usize, language: &str) -> PathBuf {
        self.output_root(root)
            .join(format!("{}{index}.{language}", self.output_prefix))
    }
}
