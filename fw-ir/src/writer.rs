use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::layout::ArtifactLayout;

/// Failure writing one generated artifact.
#[derive(Debug, Error)]
#[error("failed to write output file {path}: {source}")]
pub struct WriteError {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

/// Write one generated configuration next to its siblings and return its path.
pub fn write_artifact(
    layout: &ArtifactLayout,
    root: &Path,
    index: usize,
    language: &str,
    text: &str,
) -> Result<PathBuf, WriteError> {
    let path = layout.output_path(root, index, language);
    fs::write(&path, text).map_err(|source| WriteError {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}
