//! AI patch editor boundary.
//!
//! The editor receives the whole ROI image plus original/target text
//! and returns an edited image. Session/signature failures are the
//! only class retried here, a small bounded number of times; rate
//! limiting is returned immediately so the dispatch layer can back
//! off, and everything else makes the caller fall back to the
//! deterministic text overlay.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("No image in editor response")]
    NoImage,

    #[error("Editor failed: {0}")]
    Failed(String),
}

/// Edits the textual content of an ROI patch, preserving everything
/// else. Injected at construction; no process-global handle.
#[async_trait]
pub trait PatchEditor: Send + Sync {
    async fn edit(
        &self,
        roi_bytes: &[u8],
        original_text: &str,
        corrected_text: &str,
    ) -> Result<Vec<u8>, EditorError>;
}

/// Wraps any editor with the bounded session-retry policy: only
/// [`EditorError::SessionExpired`] is retried, up to `max_retries`
/// attempts; every other error is returned as-is on first sight.
pub struct RetryingEditor<E> {
    inner: E,
    max_retries: u32,
}

impl<E: PatchEditor> RetryingEditor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner, max_retries: 3 }
    }

    pub fn with_max_retries(inner: E, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl<E: PatchEditor> PatchEditor for RetryingEditor<E> {
    async fn edit(
        &self,
        roi_bytes: &[u8],
        original_text: &str,
        corrected_text: &str,
    ) -> Result<Vec<u8>, EditorError> {
        let mut last_err = EditorError::Failed("no attempts made".to_string());

        for attempt in 1..=self.max_retries {
            match self.inner.edit(roi_bytes, original_text, corrected_text).await {
                Ok(bytes) => return Ok(bytes),
                Err(EditorError::SessionExpired(details)) => {
                    debug!(
                        "Editor session expired (attempt {}/{}): {}",
                        attempt, self.max_retries, details
                    );
                    last_err = EditorError::SessionExpired(details);
                }
                Err(err) => {
                    if matches!(err, EditorError::RateLimited(_)) {
                        warn!("Editor rate limited, surfacing without retry");
                    }
                    return Err(err);
                }
            }
        }

        Err(last_err)
    }
}

/// Test doubles.
pub mod stub {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Always returns the configured bytes.
    pub struct FixedEditor {
        pub output: Vec<u8>,
    }

    #[async_trait]
    impl PatchEditor for FixedEditor {
        async fn edit(&self, _roi: &[u8], _orig: &str, _corr: &str) -> Result<Vec<u8>, EditorError> {
            Ok(self.output.clone())
        }
    }

    /// Always fails with the configured error.
    pub struct FailingEditor {
        pub error: EditorError,
    }

    #[async_trait]
    impl PatchEditor for FailingEditor {
        async fn edit(&self, _roi: &[u8], _orig: &str, _corr: &str) -> Result<Vec<u8>, EditorError> {
            Err(self.error.clone())
        }
    }

    /// Fails with session errors a set number of times, then succeeds.
    pub struct FlakySessionEditor {
        pub failures_before_success: u32,
        pub output: Vec<u8>,
        pub calls: AtomicU32,
    }

    impl FlakySessionEditor {
        pub fn new(failures_before_success: u32, output: Vec<u8>) -> Self {
            Self {
                failures_before_success,
                output,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PatchEditor for FlakySessionEditor {
        async fn edit(&self, _roi: &[u8], _orig: &str, _corr: &str) -> Result<Vec<u8>, EditorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(EditorError::SessionExpired("thought signature stale".to_string()))
            } else {
                Ok(self.output.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::*;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn session_errors_are_retried_until_success() {
        let flaky = FlakySessionEditor::new(2, b"edited".to_vec());
        let editor = RetryingEditor::new(flaky);

        let out = editor.edit(b"roi", "old", "new").await.unwrap();
        assert_eq!(out, b"edited");
        assert_eq!(editor.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn session_retry_budget_is_bounded() {
        let flaky = FlakySessionEditor::new(10, b"never".to_vec());
        let editor = RetryingEditor::new(flaky);

        let err = editor.edit(b"roi", "old", "new").await.unwrap_err();
        assert!(matches!(err, EditorError::SessionExpired(_)));
        assert_eq!(editor.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limiting_is_returned_without_retry() {
        let failing = FailingEditor {
            error: EditorError::RateLimited("quota exhausted".to_string()),
        };
        let editor = RetryingEditor::new(failing);

        let err = editor.edit(b"roi", "old", "new").await.unwrap_err();
        assert!(matches!(err, EditorError::RateLimited(_)));
    }

    #[tokio::test]
    async fn terminal_failures_are_not_retried() {
        let failing = FailingEditor { error: EditorError::NoImage };
        let editor = RetryingEditor::new(failing);

        let err = editor.edit(b"roi", "old", "new").await.unwrap_err();
        assert_eq!(err, EditorError::NoImage);
    }
}
