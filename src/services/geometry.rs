use serde::Serialize;

use crate::models::order::CropRatio;

/// Absolute pixel rectangle inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Map a fractional crop box onto a `width` x `height` image.
///
/// Each edge is `round(dimension * ratio)` using round-half-away-from-zero
/// (`f64::round`), so 0.5 px always rounds up. Rounding the offset and the
/// extent independently can overshoot the image by one pixel; the extent is
/// then trimmed so `left + width <= image width` always holds.
pub fn crop_rect(ratio: &CropRatio, width: u32, height: u32) -> Result<CropRect, GeometryError> {
    if width == 0 || height == 0 {
        return Err(GeometryError::EmptySource { width, height });
    }

    let (left, crop_width) = axis(ratio.x, ratio.w, width);
    let (top, crop_height) = axis(ratio.y, ratio.h, height);

    if crop_width == 0 || crop_height == 0 {
        return Err(GeometryError::EmptyCrop {
            width: crop_width,
            height: crop_height,
        });
    }

    Ok(CropRect {
        left,
        top,
        width: crop_width,
        height: crop_height,
    })
}

fn axis(offset: f64, extent: f64, size: u32) -> (u32, u32) {
    let size_f = f64::from(size);
    let start = scale(offset, size_f).min(size);
    let length = scale(extent, size_f).min(size - start);
    (start, length)
}

fn scale(ratio: f64, size: f64) -> u32 {
    // Inputs are validated to [0, 1]; clamp keeps the cast well defined.
    (size * ratio).round().clamp(0.0, size) as u32
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("source image has no pixels ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    #[error("crop rectangle rounds to an empty area ({width}x{height})")]
    EmptyCrop { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(x: f64, y: f64, w: f64, h: f64) -> CropRatio {
        CropRatio { x, y, w, h }
    }

    #[test]
    fn test_reference_crop() {
        let rect = crop_rect(&ratio(0.25, 0.1, 0.5, 0.5), 4000, 3000).unwrap();
        assert_eq!(
            rect,
            CropRect {
                left: 1000,
                top: 300,
                width: 2000,
                height: 1500
            }
        );
        assert!(rect.left + rect.width <= 4000);
        assert!(rect.top + rect.height <= 3000);
    }

    #[test]
    fn test_full_frame() {
        let rect = crop_rect(&ratio(0.0, 0.0, 1.0, 1.0), 640, 480).unwrap();
        assert_eq!(rect, CropRect { left: 0, top: 0, width: 640, height: 480 });
    }

    #[test]
    fn test_half_pixel_rounds_away_from_zero() {
        // 3 * 0.5 = 1.5 -> 2
        let rect = crop_rect(&ratio(0.0, 0.0, 0.5, 0.5), 3, 3).unwrap();
        assert_eq!(rect.width, 2);
        assert_eq!(rect.height, 2);
    }

    #[test]
    fn test_rounding_overshoot_is_trimmed() {
        // left = round(1.5) = 2, width = round(1.5) = 2, but only 1 column remains
        let rect = crop_rect(&ratio(0.5, 0.5, 0.5, 0.5), 3, 3).unwrap();
        assert_eq!(rect.left, 2);
        assert_eq!(rect.width, 1);
        assert!(rect.left + rect.width <= 3);
        assert!(rect.top + rect.height <= 3);
    }

    #[test]
    fn test_sub_pixel_crop_is_error() {
        let err = crop_rect(&ratio(0.0, 0.0, 0.001, 0.5), 100, 100).unwrap_err();
        assert_eq!(err, GeometryError::EmptyCrop { width: 0, height: 50 });
    }

    #[test]
    fn test_empty_source_is_error() {
        assert!(matches!(
            crop_rect(&ratio(0.0, 0.0, 1.0, 1.0), 0, 10),
            Err(GeometryError::EmptySource { .. })
        ));
    }
}
