use thiserror::Error;

/// Failure taxonomy for the correction pipeline.
///
/// Input errors are rejected immediately and never retried. Rate
/// limiting is the only transient class; the dispatch layer retries it
/// with backoff. Everything else is terminal for the unit of work.
#[derive(Error, Debug)]
pub enum CorrectionError {
    #[error("Invalid bounding box: {width}x{height} at ({x}, {y})")]
    InvalidBbox { x: i32, y: i32, width: i32, height: i32 },

    #[error("Page has no OCR result")]
    MissingOcrResult,

    #[error("Unknown correction method: {method}")]
    UnknownMethod { method: String },

    #[error("Patch editor rate limited: {details}")]
    RateLimited { details: String },

    #[error("Patch editor failed: {details}")]
    EditorFailed { details: String },

    #[error("No usable font could be loaded for text overlay")]
    FontUnavailable,

    #[error("Patch not found in storage: {path}")]
    PatchMissing { path: String },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CorrectionError {
    /// Whether the dispatch layer should retry this unit of work.
    pub fn is_transient(&self) -> bool {
        matches!(self, CorrectionError::RateLimited { .. })
    }

    /// Caller mistakes, surfaced without retry.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CorrectionError::InvalidBbox { .. }
                | CorrectionError::MissingOcrResult
                | CorrectionError::UnknownMethod { .. }
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            CorrectionError::InvalidBbox { .. } => "INVALID_BBOX",
            CorrectionError::MissingOcrResult => "MISSING_OCR_RESULT",
            CorrectionError::UnknownMethod { .. } => "UNKNOWN_METHOD",
            CorrectionError::RateLimited { .. } => "RATE_LIMITED",
            CorrectionError::EditorFailed { .. } => "EDITOR_FAILED",
            CorrectionError::FontUnavailable => "FONT_UNAVAILABLE",
            CorrectionError::PatchMissing { .. } => "PATCH_MISSING",
            CorrectionError::Image(_) => "IMAGE_ERROR",
            CorrectionError::Storage(_) => "STORAGE_ERROR",
            CorrectionError::Other(_) => "UNKNOWN_ERROR",
        }
    }
}
