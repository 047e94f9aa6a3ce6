//! Top-level orchestration: one `CorrectionPipeline` owns the injected
//! collaborators and drives a page through detection, candidate
//! generation, auto-adoption, apply, and undo.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auto_adopt::evaluate_auto_adopt;
use crate::candidates::CandidateGenerator;
use crate::config::Config;
use crate::correction::{self, PageLocks};
use crate::detection;
use crate::editor::PatchEditor;
use crate::errors::CorrectionError;
use crate::models::{BBox, Correction, CorrectionMethod, Issue, IssueStatus, OcrResult};
use crate::ocr::{context_around_bbox, OcrProvider};
use crate::roi::extract_roi_png;
use crate::storage::RasterStore;

/// Block lines of surrounding text handed to the generator on each
/// side of the target region.
const MAX_CONTEXT_LINES: usize = 3;

/// Drives the issue lifecycle over a page raster. The editor is
/// optional; without one, every correction renders via the text
/// overlay.
pub struct CorrectionPipeline {
    store: Arc<dyn RasterStore>,
    ocr: Arc<dyn OcrProvider>,
    generator: Arc<dyn CandidateGenerator>,
    editor: Option<Arc<dyn PatchEditor>>,
    locks: Arc<PageLocks>,
    config: Config,
}

impl CorrectionPipeline {
    pub fn new(
        store: Arc<dyn RasterStore>,
        ocr: Arc<dyn OcrProvider>,
        generator: Arc<dyn CandidateGenerator>,
        editor: Option<Arc<dyn PatchEditor>>,
        config: Config,
    ) -> Self {
        Self {
            store,
            ocr,
            generator,
            editor,
            locks: Arc::new(PageLocks::new()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run OCR over a page image and return the recognized text along
    /// with the detected, merged issue list.
    pub async fn detect_page(
        &self,
        page_image_path: &str,
        page_id: Uuid,
    ) -> Result<(OcrResult, Vec<Issue>), CorrectionError> {
        let page_png = self.store.get(page_image_path).await?;
        let ocr_result = self.ocr.detect_text(&page_png).await?;

        let issues =
            detection::detect_issues(&ocr_result, page_id, self.config.max_issues_per_page);
        let issues = detection::merge_nearby_issues(issues, self.config.merge_threshold);

        info!(
            "Detected {} issue(s) on page {} ({})",
            issues.len(),
            page_id,
            page_image_path
        );
        Ok((ocr_result, issues))
    }

    /// Ask the generator for replacement candidates for one issue and
    /// evaluate them for auto-adoption. The issue advances to
    /// Reviewing with its candidate list attached; returns the
    /// adoption decision and the selected candidate index.
    pub async fn generate_candidates_for_issue(
        &self,
        issue: &mut Issue,
        page_image_path: &str,
        ocr_result: Option<&OcrResult>,
    ) -> Result<(bool, Option<usize>), CorrectionError> {
        let ocr_result = ocr_result.ok_or(CorrectionError::MissingOcrResult)?;

        let page_png = self.store.get(page_image_path).await?;
        let (roi_png, _adjusted) = extract_roi_png(
            &page_png,
            issue.bbox,
            self.config.roi_margin,
            self.config.max_roi_width,
            self.config.max_roi_height,
        )?;

        let (context_before, context_after) =
            context_around_bbox(ocr_result, issue.bbox, MAX_CONTEXT_LINES);

        let candidates = self
            .generator
            .generate(&roi_png, &issue.ocr_text, &context_before, &context_after)
            .await?;

        let (should_adopt, selected) =
            evaluate_auto_adopt(&issue.ocr_text, &candidates, issue.confidence.unwrap_or(0.0));

        issue.candidates = Some(candidates);
        issue.auto_correctable = should_adopt;
        issue.status = IssueStatus::Reviewing;

        info!(
            "Issue {}: {} candidate(s), auto_adopt={}",
            issue.id,
            issue.candidates.as_ref().map_or(0, Vec::len),
            should_adopt
        );
        Ok((should_adopt, selected))
    }

    /// Render and apply one correction, overwriting the page image in
    /// place. On success the issue moves to Corrected and the returned
    /// `Correction` records the patches needed to undo.
    pub async fn apply_issue_correction(
        &self,
        issue: &mut Issue,
        page_image_path: &str,
        corrected_text: &str,
        method: CorrectionMethod,
        project_id: Uuid,
    ) -> Result<Correction, CorrectionError> {
        let outcome = correction::apply_correction(
            self.store.as_ref(),
            &self.locks,
            self.editor.as_deref(),
            &self.config,
            page_image_path,
            issue.bbox,
            corrected_text,
            &issue.ocr_text,
            method,
            project_id,
            issue.id,
        )
        .await?;

        issue.status = IssueStatus::Corrected;

        Ok(Correction {
            id: Uuid::new_v4(),
            issue_id: issue.id,
            method,
            original_text: issue.ocr_text.clone(),
            corrected_text: corrected_text.to_string(),
            candidates_snapshot: issue.candidates.clone(),
            patch_before_path: outcome.patch_before_path,
            patch_after_path: outcome.patch_after_path,
            patch_origin: outcome.patch_origin,
            applied: true,
            applied_at: Some(Utc::now()),
        })
    }

    /// Paste the before patch back onto the page. Returns false and
    /// leaves the issue and correction untouched when the restore
    /// cannot be performed.
    pub async fn undo_issue_correction(
        &self,
        issue: &mut Issue,
        correction: &mut Correction,
        page_image_path: &str,
    ) -> bool {
        let restored = correction::undo_correction(
            self.store.as_ref(),
            &self.locks,
            page_image_path,
            &correction.patch_before_path,
            correction.patch_origin,
        )
        .await;

        if restored {
            correction.applied = false;
            issue.status = IssueStatus::Reviewing;
            info!("Undid correction {} for issue {}", correction.id, issue.id);
        }
        restored
    }

    /// Register a caller-flagged region as an issue without running
    /// detection.
    pub fn manual_issue(&self, page_id: Uuid, bbox: BBox, ocr_text: &str) -> Issue {
        Issue::manual(page_id, bbox, ocr_text)
    }
}
