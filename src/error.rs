//! Error types, one enum per concern.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("I/O error while rendering: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not launch '{binary}': {source} (is it installed?)")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("typst compilation failed: {0}")]
    Compile(String),
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("I/O error while rasterizing: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not launch '{binary}': {source} (is it installed?)")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rasterizer failed: {0}")]
    Failed(String),

    #[error("page {0} is out of range")]
    PageOutOfRange(u32),

    #[error("invalid scale factor {0}")]
    InvalidScale(f32),

    #[error("PNG decode error: {0}")]
    Decode(#[from] png::DecodingError),

    #[error("PNG encode error: {0}")]
    Encode(#[from] png::EncodingError),

    #[error("unsupported pixel layout: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShareError {
    #[error("sharing is not supported on this platform")]
    Unsupported,

    #[error("share cancelled by the user")]
    Cancelled,

    #[error("share sheet failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("failed to save '{path}': {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("prompt cancelled: {0}")]
    Prompt(#[from] inquire::InquireError),
}
