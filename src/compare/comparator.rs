//! Image comparator abstraction and the built-in pixel comparator.
//!
//! - `ImageComparator` is the seam the comparison engine drives
//! - `PixelComparator` decodes both images with the `image` crate and counts
//!   mismatched pixels over the union of both canvases

use base64::Engine;
use image::{Rgba, RgbaImage};
use std::io::Cursor;

use super::types::{ComparatorError, ComparisonResult, DimensionDifference, PNG_DATA_URL_PREFIX};

/// Colour used for mismatched pixels in the diff overlay
const DIFF_HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Trait for image comparators
///
/// Implementations receive the encoded bytes of the new image and of the
/// reference image and describe how far apart they are.
pub trait ImageComparator: Send + Sync {
    fn compare(&self, new: &[u8], reference: &[u8]) -> Result<ComparisonResult, ComparatorError>;
}

/// Per-pixel comparator producing a magenta-on-faded diff overlay
#[derive(Debug, Clone, Default)]
pub struct PixelComparator {
    /// Largest per-channel difference still counted as equal
    tolerance: u8,
}

impl PixelComparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn pixels_match(&self, a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
        a.0.iter()
            .zip(b.0.iter())
            .all(|(x, y)| x.abs_diff(*y) <= self.tolerance)
    }
}

impl ImageComparator for PixelComparator {
    fn compare(&self, new: &[u8], reference: &[u8]) -> Result<ComparisonResult, ComparatorError> {
        let new_img = decode(new, "new")?;
        let ref_img = decode(reference, "reference")?;

        let (new_w, new_h) = new_img.dimensions();
        let (ref_w, ref_h) = ref_img.dimensions();
        let width = new_w.max(ref_w);
        let height = new_h.max(ref_h);

        let mut diff = RgbaImage::new(width, height);
        let mut mismatched: u64 = 0;
        for y in 0..height {
            for x in 0..width {
                let a = (x < new_w && y < new_h).then(|| new_img.get_pixel(x, y));
                let b = (x < ref_w && y < ref_h).then(|| ref_img.get_pixel(x, y));
                let pixel = match (a, b) {
                    (Some(a), Some(b)) if self.pixels_match(a, b) => fade(b),
                    _ => {
                        mismatched += 1;
                        DIFF_HIGHLIGHT
                    }
                };
                diff.put_pixel(x, y, pixel);
            }
        }

        let total = u64::from(width) * u64::from(height);
        let mis_match_percentage = if total == 0 {
            0.0
        } else {
            round2(mismatched as f64 * 100.0 / total as f64)
        };

        Ok(ComparisonResult {
            is_same_dimensions: new_w == ref_w && new_h == ref_h,
            dimension_difference: DimensionDifference {
                width: i64::from(new_w) - i64::from(ref_w),
                height: i64::from(new_h) - i64::from(ref_h),
            },
            mis_match_percentage,
            diff_image_url: Some(to_data_url(&diff)?),
        })
    }
}

fn decode(data: &[u8], which: &'static str) -> Result<RgbaImage, ComparatorError> {
    image::load_from_memory(data)
        .map(|img| img.to_rgba8())
        .map_err(|e| ComparatorError::Decode {
            which,
            message: e.to_string(),
        })
}

/// Blend a matching pixel towards white so highlights stand out
fn fade(p: &Rgba<u8>) -> Rgba<u8> {
    let lift = |c: u8| 255 - (255 - c) / 4;
    Rgba([lift(p[0]), lift(p[1]), lift(p[2]), 255])
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_data_url(img: &RgbaImage) -> Result<String, ComparatorError> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| ComparatorError::Encode(e.to_string()))?;
    Ok(format!(
        "{}{}",
        PNG_DATA_URL_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}
