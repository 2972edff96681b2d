//! Error types for stratus-assembly

use thiserror::Error;

/// Errors that can occur while assembling or persisting artifacts
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest lists stack '{stack}' but no template was produced for it")]
    MissingTemplate { stack: String },
}
