//! Patch correction: deterministic text-overlay rendering, best-effort
//! AI editing with fallback, and the apply/undo surgery on page
//! rasters.
//!
//! Apply overwrites the stored page image in place; the persisted
//! "before" patch is the only recovery path, and undo pastes it back
//! at the exact page coordinates it was extracted from. A per-page
//! lock serializes apply/undo so concurrent corrections cannot corrupt
//! the read-modify-write of one page raster.

use ab_glyph::{FontVec, PxScale};
use image::RgbImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::editor::{EditorError, PatchEditor};
use crate::errors::CorrectionError;
use crate::models::{AdjustedBbox, BBox, CorrectionMethod, RenderStatus};
use crate::roi::{encode_png, extract_roi};
use crate::sampling::{estimate_background_color, estimate_text_color, DEFAULT_SAMPLE_MARGIN};
use crate::storage::RasterStore;

/// System font candidates tried in order before the embedded fallback.
const FONT_PATHS: [&str; 5] = [
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

/// Last-resort font compiled into the binary so overlay rendering can
/// never fail on font loading.
static EMBEDDED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

static OVERLAY_FONT: LazyLock<Option<FontVec>> = LazyLock::new(|| {
    for path in FONT_PATHS {
        if let Ok(data) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(data) {
                debug!("Loaded overlay font from {}", path);
                return Some(font);
            }
        }
    }
    FontVec::try_from_vec(EMBEDDED_FONT.to_vec()).ok()
});

fn overlay_font() -> Result<&'static FontVec, CorrectionError> {
    OVERLAY_FONT.as_ref().ok_or(CorrectionError::FontUnavailable)
}

/// Render `corrected_text` into `bbox_in_roi` on the ROI image:
/// fill the rectangle with the estimated background color, then draw
/// the text centered in a contrasting color at ~70% of the rectangle
/// height.
pub fn apply_text_overlay(
    roi_png: &[u8],
    bbox_in_roi: BBox,
    corrected_text: &str,
) -> Result<Vec<u8>, CorrectionError> {
    if !bbox_in_roi.is_valid() {
        return Err(CorrectionError::InvalidBbox {
            x: bbox_in_roi.x,
            y: bbox_in_roi.y,
            width: bbox_in_roi.width,
            height: bbox_in_roi.height,
        });
    }

    let mut img: RgbImage = image::load_from_memory(roi_png)?.to_rgb8();

    let bg = estimate_background_color(&img, bbox_in_roi, DEFAULT_SAMPLE_MARGIN);
    let fg = estimate_text_color(&img, bbox_in_roi);

    let rect = Rect::at(bbox_in_roi.x, bbox_in_roi.y)
        .of_size(bbox_in_roi.width as u32, bbox_in_roi.height as u32);
    draw_filled_rect_mut(&mut img, rect, bg);

    let font = overlay_font()?;
    let font_size = ((bbox_in_roi.height as f32 * 0.7) as i32).max(12);
    let scale = PxScale::from(font_size as f32);

    let (text_w, text_h) = text_size(scale, font, corrected_text);
    let text_x = bbox_in_roi.x + (bbox_in_roi.width - text_w as i32) / 2;
    let text_y = bbox_in_roi.y + (bbox_in_roi.height - text_h as i32) / 2;

    draw_text_mut(&mut img, fg, text_x, text_y, scale, font, corrected_text);

    encode_png(&img)
}

/// Paste a patch onto a page image at `(x, y)`, alpha-aware, then
/// flatten to opaque RGB.
pub fn apply_patch_to_page(
    page_png: &[u8],
    patch_png: &[u8],
    x: i32,
    y: i32,
) -> Result<Vec<u8>, CorrectionError> {
    let mut page = image::load_from_memory(page_png)?.to_rgba8();
    let patch = image::load_from_memory(patch_png)?.to_rgba8();

    image::imageops::overlay(&mut page, &patch, x as i64, y as i64);

    let flattened: RgbImage = image::DynamicImage::ImageRgba8(page).to_rgb8();
    encode_png(&flattened)
}

/// Produce the corrected patch for an ROI, choosing between the
/// requested strategy and the deterministic overlay fallback.
///
/// Rate limiting from the editor is propagated so the dispatch layer
/// can retry the whole unit; any other editor failure degrades to the
/// overlay with the reason recorded in the status tag.
pub async fn render_correction(
    editor: Option<&dyn PatchEditor>,
    method: CorrectionMethod,
    roi_png: Vec<u8>,
    bbox_in_roi: BBox,
    original_text: &str,
    corrected_text: &str,
) -> Result<(Vec<u8>, RenderStatus), CorrectionError> {
    if method == CorrectionMethod::NanoBanana {
        let fallback_reason = match editor {
            Some(editor) => match editor.edit(&roi_png, original_text, corrected_text).await {
                Ok(bytes) => return Ok((bytes, RenderStatus::NanoBananaSuccess)),
                Err(EditorError::RateLimited(details)) => {
                    return Err(CorrectionError::RateLimited { details });
                }
                Err(err) => err.to_string(),
            },
            None => "no patch editor configured".to_string(),
        };

        warn!("AI edit failed, falling back to text overlay: {}", fallback_reason);
        let rendered = render_overlay_blocking(roi_png, bbox_in_roi, corrected_text).await?;
        return Ok((
            rendered,
            RenderStatus::FallbackToTextOverlay { reason: fallback_reason },
        ));
    }

    let rendered = render_overlay_blocking(roi_png, bbox_in_roi, corrected_text).await?;
    Ok((rendered, RenderStatus::TextOverlaySuccess))
}

/// The overlay render is pure CPU work on image buffers; keep it off
/// the async executor.
async fn render_overlay_blocking(
    roi_png: Vec<u8>,
    bbox_in_roi: BBox,
    corrected_text: &str,
) -> Result<Vec<u8>, CorrectionError> {
    let text = corrected_text.to_string();
    tokio::task::spawn_blocking(move || apply_text_overlay(&roi_png, bbox_in_roi, &text))
        .await
        .map_err(|e| CorrectionError::Other(e.into()))?
}

/// One async mutex per page-image path. Apply and undo both do a
/// read-modify-write of the page raster; without this guard,
/// concurrent corrections on one page can silently drop each other's
/// edits.
#[derive(Default)]
pub struct PageLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, path: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(path.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Everything the caller needs to record a [`crate::models::Correction`].
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub patch_before_path: String,
    pub patch_after_path: String,
    /// Page-space rectangle of the saved before patch; undo pastes at
    /// this origin.
    pub patch_origin: BBox,
    pub status: RenderStatus,
}

fn origin_of(adjusted: &AdjustedBbox) -> BBox {
    BBox::new(adjusted.x, adjusted.y, adjusted.width, adjusted.height)
}

/// Apply a correction to a page image and persist the before/after
/// patches.
#[allow(clippy::too_many_arguments)]
pub async fn apply_correction(
    store: &dyn RasterStore,
    locks: &PageLocks,
    editor: Option<&dyn PatchEditor>,
    config: &Config,
    page_image_path: &str,
    issue_bbox: BBox,
    corrected_text: &str,
    original_text: &str,
    method: CorrectionMethod,
    project_id: Uuid,
    issue_id: Uuid,
) -> Result<ApplyOutcome, CorrectionError> {
    if !issue_bbox.is_valid() {
        return Err(CorrectionError::InvalidBbox {
            x: issue_bbox.x,
            y: issue_bbox.y,
            width: issue_bbox.width,
            height: issue_bbox.height,
        });
    }

    let _page_guard = locks.acquire(page_image_path).await;

    let page_png = store.get(page_image_path).await?;
    let page_img = image::load_from_memory(&page_png)?.to_rgb8();

    let (roi_img, adjusted) = extract_roi(
        &page_img,
        issue_bbox,
        config.roi_margin,
        config.max_roi_width,
        config.max_roi_height,
    )?;
    let roi_png = encode_png(&roi_img)?;

    let patch_before_path = format!("projects/{}/patches/{}_before.png", project_id, issue_id);
    store.save_bytes(&roi_png, &patch_before_path).await?;

    let bbox_in_roi = BBox::new(
        adjusted.offset_x,
        adjusted.offset_y,
        issue_bbox.width,
        issue_bbox.height,
    );

    let (rendered, status) = render_correction(
        editor,
        method,
        roi_png,
        bbox_in_roi,
        original_text,
        corrected_text,
    )
    .await?;

    let patch_after_path = format!("projects/{}/patches/{}_after.png", project_id, issue_id);
    store.save_bytes(&rendered, &patch_after_path).await?;

    let updated_page = apply_patch_to_page(&page_png, &rendered, adjusted.x, adjusted.y)?;
    store.save_bytes(&updated_page, page_image_path).await?;

    info!(
        "Applied correction to {} for issue {} ({:?})",
        page_image_path, issue_id, status
    );

    Ok(ApplyOutcome {
        patch_before_path,
        patch_after_path,
        patch_origin: origin_of(&adjusted),
        status,
    })
}

/// Restore the before patch onto the page. Returns false on any
/// failure (missing patch, storage error) without touching state, so
/// the operation is safely retryable.
pub async fn undo_correction(
    store: &dyn RasterStore,
    locks: &PageLocks,
    page_image_path: &str,
    patch_before_path: &str,
    patch_origin: BBox,
) -> bool {
    let _page_guard = locks.acquire(page_image_path).await;

    let before_png = match store.get(patch_before_path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let err = if err.kind() == std::io::ErrorKind::NotFound {
                CorrectionError::PatchMissing { path: patch_before_path.to_string() }
            } else {
                CorrectionError::Storage(err)
            };
            warn!("Undo failed: {}", err);
            return false;
        }
    };

    let page_png = match store.get(page_image_path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Undo failed: page {} unavailable: {}", page_image_path, err);
            return false;
        }
    };

    let restored = match apply_patch_to_page(&page_png, &before_png, patch_origin.x, patch_origin.y)
    {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Undo failed compositing before patch: {}", err);
            return false;
        }
    };

    if let Err(err) = store.save_bytes(&restored, page_image_path).await {
        warn!("Undo failed saving page {}: {}", page_image_path, err);
        return false;
    }

    info!("Reverted correction on {} from {}", page_image_path, patch_before_path);
    true
}
