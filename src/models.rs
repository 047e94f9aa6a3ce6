use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::CorrectionError;

/// Axis-aligned rectangle in page-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = (self.x + self.width).max(other.x + other.width);
        let y2 = (self.y + self.height).max(other.y + other.height);
        BBox::new(x1, y1, x2 - x1, y2 - y1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    pub bbox: BBox,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrBlock {
    pub text: String,
    pub bbox: BBox,
    pub confidence: f32,
    pub words: Vec<OcrWord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResult {
    pub full_text: String,
    pub blocks: Vec<OcrBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    LowConfidence,
    Garbled,
    Missing,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Detected,
    Reviewing,
    Corrected,
    Skipped,
}

/// A proposed replacement text with a confidence and rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub confidence: f32,
    pub reason: String,
}

/// A flagged candidate problem region on a page.
///
/// Lifecycle: `Detected -> Reviewing -> Corrected`, back to `Reviewing`
/// via undo; `Skipped` is a terminal side branch. The core mutates
/// status but never deletes issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub page_id: Uuid,
    pub bbox: BBox,
    pub issue_type: IssueType,
    pub confidence: Option<f32>,
    pub ocr_text: String,
    pub detected_problems: Vec<String>,
    pub status: IssueStatus,
    pub auto_correctable: bool,
    pub candidates: Option<Vec<Candidate>>,
}

impl Issue {
    /// A caller-flagged region with no detector involvement.
    pub fn manual(page_id: Uuid, bbox: BBox, ocr_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            page_id,
            bbox,
            issue_type: IssueType::Manual,
            confidence: None,
            ocr_text: ocr_text.into(),
            detected_problems: Vec::new(),
            status: IssueStatus::Detected,
            auto_correctable: false,
            candidates: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    TextOverlay,
    NanoBanana,
}

impl FromStr for CorrectionMethod {
    type Err = CorrectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text_overlay" => Ok(CorrectionMethod::TextOverlay),
            "nano_banana" => Ok(CorrectionMethod::NanoBanana),
            other => Err(CorrectionError::UnknownMethod { method: other.to_string() }),
        }
    }
}

/// Audit record of one applied correction. Never deleted; `applied`
/// toggles to false on undo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub method: CorrectionMethod,
    pub original_text: String,
    pub corrected_text: String,
    pub candidates_snapshot: Option<Vec<Candidate>>,
    pub patch_before_path: String,
    pub patch_after_path: String,
    /// Page-space rectangle the before patch was extracted from. Undo
    /// pastes the patch back at exactly this origin.
    pub patch_origin: BBox,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Which rendering path produced the patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    TextOverlaySuccess,
    NanoBananaSuccess,
    FallbackToTextOverlay { reason: String },
}

/// Result of ROI extraction: the crop's own page-space rectangle plus
/// the offset of the original bbox's top-left corner inside the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustedBbox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub offset_x: i32,
    pub offset_y: i32,
}
