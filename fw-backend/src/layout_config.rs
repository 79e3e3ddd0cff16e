use std::fs;
use std::path::Path;

use fw_ir::ArtifactLayout;
use thiserror::Error;

/// Errors returned when loading a layout file.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to read layout file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse layout file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Load an artifact layout from a TOML file. Missing keys keep their defaults.
pub fn load_layout(path: &Path) -> Result<ArtifactLayout, LayoutError> {
    let raw = fs::read_to_string(path).map_err(|source| LayoutError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_layout(&raw, path.display().to_string())
}

/// Built-in layout.
pub fn default_layout() -> ArtifactLayout {
    let embedded = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config/layout.toml"));
    parse_layout(embedded, "embedded layout".to_string()).unwrap_or_default()
}

fn parse_layout(raw: &str, path: String) -> Result<ArtifactLayout, LayoutError> {
    toml::from_str(raw).map_err(|source| LayoutError::Parse { path, source })
}
