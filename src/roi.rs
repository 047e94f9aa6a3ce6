//! Region-of-interest extraction: crop a page image around a bbox with
//! margin expansion, bounds clamping, and size caps.

use image::RgbImage;
use std::io::Cursor;

use crate::errors::CorrectionError;
use crate::models::{AdjustedBbox, BBox};

/// Expand `bbox` by `margin` on all sides, clamp to the image, and
/// shrink symmetrically if the result exceeds the size caps.
///
/// The returned [`AdjustedBbox`] carries the crop's page-space origin
/// and the offset of the original bbox's top-left corner relative to
/// the crop; downstream rendering uses that offset to place the
/// target region inside the ROI. When the caps are tighter than the
/// unmargined bbox the crop no longer contains the whole target and
/// the offset can go negative.
pub fn extract_roi(
    img: &RgbImage,
    bbox: BBox,
    margin: i32,
    max_width: i32,
    max_height: i32,
) -> Result<(RgbImage, AdjustedBbox), CorrectionError> {
    if !bbox.is_valid() {
        return Err(CorrectionError::InvalidBbox {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
        });
    }

    let (img_w, img_h) = (img.width() as i32, img.height() as i32);

    let mut x1 = (bbox.x - margin).clamp(0, img_w);
    let mut y1 = (bbox.y - margin).clamp(0, img_h);
    let mut x2 = (bbox.x + bbox.width + margin).clamp(0, img_w);
    let mut y2 = (bbox.y + bbox.height + margin).clamp(0, img_h);

    // A bbox lying entirely outside the image clamps to nothing.
    if x2 <= x1 || y2 <= y1 {
        return Err(CorrectionError::InvalidBbox {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
        });
    }

    // Shrink symmetrically from both edges by half the excess each.
    if x2 - x1 > max_width {
        let excess = (x2 - x1) - max_width;
        x1 += excess / 2;
        x2 -= excess / 2;
    }
    if y2 - y1 > max_height {
        let excess = (y2 - y1) - max_height;
        y1 += excess / 2;
        y2 -= excess / 2;
    }

    let roi = image::imageops::crop_imm(
        img,
        x1 as u32,
        y1 as u32,
        (x2 - x1) as u32,
        (y2 - y1) as u32,
    )
    .to_image();

    let adjusted = AdjustedBbox {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
        offset_x: bbox.x - x1,
        offset_y: bbox.y - y1,
    };

    Ok((roi, adjusted))
}

/// PNG-bytes variant of [`extract_roi`].
pub fn extract_roi_png(
    page_png: &[u8],
    bbox: BBox,
    margin: i32,
    max_width: i32,
    max_height: i32,
) -> Result<(Vec<u8>, AdjustedBbox), CorrectionError> {
    let img = image::load_from_memory(page_png)?.to_rgb8();
    let (roi, adjusted) = extract_roi(&img, bbox, margin, max_width, max_height)?;
    Ok((encode_png(&roi)?, adjusted))
}

/// Encode an RGB image as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, CorrectionError> {
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img.clone()).write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
