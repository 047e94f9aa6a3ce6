//! Pixel sampling over a rectangular window: background color from a
//! ring outside the target bbox, text color from a sparse grid inside
//! it.

use image::{Rgb, RgbImage};

use crate::models::BBox;

/// Default distance outside the bbox at which background pixels are
/// sampled.
pub const DEFAULT_SAMPLE_MARGIN: i32 = 5;

/// ITU-R BT.601 luma.
pub fn luminance(pixel: Rgb<u8>) -> f32 {
    0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32
}

/// Estimate the background color by averaging pixels along a ring at
/// `sample_margin` outside the bbox: up to 10 evenly spaced positions
/// per edge, skipping edges whose margin falls outside the image.
/// Defaults to opaque white when no sample lands inside.
pub fn estimate_background_color(img: &RgbImage, bbox: BBox, sample_margin: i32) -> Rgb<u8> {
    let (img_w, img_h) = (img.width() as i32, img.height() as i32);
    let mut samples: Vec<Rgb<u8>> = Vec::new();

    let x_step = (bbox.width / 10).max(1);
    let mut dx = 0;
    while dx < bbox.width {
        let sx = (bbox.x + dx).clamp(0, img_w - 1);
        // above the bbox
        if bbox.y - sample_margin >= 0 {
            samples.push(*img.get_pixel(sx as u32, (bbox.y - sample_margin) as u32));
        }
        // below the bbox
        if bbox.y + bbox.height + sample_margin < img_h {
            samples.push(*img.get_pixel(sx as u32, (bbox.y + bbox.height + sample_margin) as u32));
        }
        dx += x_step;
    }

    let y_step = (bbox.height / 10).max(1);
    let mut dy = 0;
    while dy < bbox.height {
        let sy = (bbox.y + dy).clamp(0, img_h - 1);
        // left of the bbox
        if bbox.x - sample_margin >= 0 {
            samples.push(*img.get_pixel((bbox.x - sample_margin) as u32, sy as u32));
        }
        // right of the bbox
        if bbox.x + bbox.width + sample_margin < img_w {
            samples.push(*img.get_pixel((bbox.x + bbox.width + sample_margin) as u32, sy as u32));
        }
        dy += y_step;
    }

    if samples.is_empty() {
        return Rgb([255, 255, 255]);
    }

    let n = samples.len() as u32;
    let r = samples.iter().map(|p| p[0] as u32).sum::<u32>() / n;
    let g = samples.iter().map(|p| p[1] as u32).sum::<u32>() / n;
    let b = samples.iter().map(|p| p[2] as u32).sum::<u32>() / n;

    Rgb([r as u8, g as u8, b as u8])
}

/// Estimate a text color that contrasts with the background.
///
/// Samples a sparse 5x5 grid inside the bbox. On a light background
/// the darkest sampled pixel is used if it is plausibly ink
/// (luminance < 100), otherwise pure black; on a dark background the
/// lightest pixel if plausibly text (luminance > 155), otherwise pure
/// white. Extremum-if-plausible, else a safe default.
pub fn estimate_text_color(img: &RgbImage, bbox: BBox) -> Rgb<u8> {
    let (img_w, img_h) = (img.width() as i32, img.height() as i32);
    let mut samples: Vec<Rgb<u8>> = Vec::new();

    let x_step = (bbox.width / 5).max(1);
    let y_step = (bbox.height / 5).max(1);

    let mut dx = 0;
    while dx < bbox.width {
        let mut dy = 0;
        while dy < bbox.height {
            let px = (bbox.x + dx).clamp(0, img_w - 1);
            let py = (bbox.y + dy).clamp(0, img_h - 1);
            samples.push(*img.get_pixel(px as u32, py as u32));
            dy += y_step;
        }
        dx += x_step;
    }

    if samples.is_empty() {
        return Rgb([0, 0, 0]);
    }

    let bg = estimate_background_color(img, bbox, DEFAULT_SAMPLE_MARGIN);
    let bg_lum = luminance(bg);

    let darkest = samples
        .iter()
        .copied()
        .min_by(|a, b| luminance(*a).total_cmp(&luminance(*b)))
        .expect("samples is non-empty");
    let lightest = samples
        .iter()
        .copied()
        .max_by(|a, b| luminance(*a).total_cmp(&luminance(*b)))
        .expect("samples is non-empty");

    if bg_lum > 128.0 {
        if luminance(darkest) < 100.0 {
            darkest
        } else {
            Rgb([0, 0, 0])
        }
    } else if luminance(lightest) > 155.0 {
        lightest
    } else {
        Rgb([255, 255, 255])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
        RgbImage::from_pixel(width, height, color)
    }

    #[test]
    fn background_of_uniform_image_is_that_color() {
        let img = solid(100, 100, Rgb([200, 150, 100]));
        let bg = estimate_background_color(&img, BBox::new(20, 20, 40, 40), 5);
        assert_eq!(bg, Rgb([200, 150, 100]));
    }

    #[test]
    fn background_defaults_to_white_without_samples() {
        // bbox covers the whole image, every ring position is outside
        let img = solid(30, 30, Rgb([10, 10, 10]));
        let bg = estimate_background_color(&img, BBox::new(0, 0, 30, 30), 5);
        assert_eq!(bg, Rgb([255, 255, 255]));
    }

    #[test]
    fn dark_ink_on_light_background_is_picked_up() {
        let mut img = solid(100, 60, Rgb([240, 240, 240]));
        // a dark glyph-like blob inside the bbox
        for x in 30..40 {
            for y in 20..30 {
                img.put_pixel(x, y, Rgb([20, 20, 60]));
            }
        }
        let color = estimate_text_color(&img, BBox::new(25, 15, 30, 20));
        // either the sampled ink or pure black; never a light color
        assert!(luminance(color) < 100.0);
    }

    #[test]
    fn light_background_without_plausible_ink_defaults_to_black() {
        let img = solid(100, 60, Rgb([240, 240, 240]));
        let color = estimate_text_color(&img, BBox::new(20, 10, 40, 30));
        assert_eq!(color, Rgb([0, 0, 0]));
    }

    #[test]
    fn dark_background_without_plausible_text_defaults_to_white() {
        let img = solid(100, 60, Rgb([30, 30, 30]));
        let color = estimate_text_color(&img, BBox::new(20, 10, 40, 30));
        assert_eq!(color, Rgb([255, 255, 255]));
    }

    #[test]
    fn dark_background_prefers_lightest_plausible_pixel() {
        let mut img = solid(100, 60, Rgb([30, 30, 30]));
        for x in 25..45 {
            for y in 15..35 {
                img.put_pixel(x, y, Rgb([220, 220, 200]));
            }
        }
        let color = estimate_text_color(&img, BBox::new(25, 15, 20, 20));
        assert!(luminance(color) > 155.0);
    }
}
