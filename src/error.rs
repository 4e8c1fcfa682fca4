//! Error types shared by the animator and its hosts.

use thiserror::Error;

use crate::surface::ElementHandle;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("rendering surface not available: {0}")]
    Unavailable(String),

    #[error("unknown visual element {0:?}")]
    UnknownElement(ElementHandle),
}

#[derive(Debug, Error)]
pub enum AnimatorError {
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("animator already running")]
    AlreadyRunning,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
