use async_trait::async_trait;
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};
use std::path::Path;

use crate::models::order::OutputSize;
use crate::services::geometry::CropRect;
use crate::services::storage::partial_path;

/// Image decoding and lossless re-encoding.
#[async_trait]
pub trait ImageCodec: Send + Sync {
    /// Read `(width, height)` of the image at `path`.
    async fn read_dimensions(&self, path: &Path) -> Result<(u32, u32), CodecError>;

    /// Cut `rect` out of `source`, optionally resize it, and write it to
    /// `dest` as PNG.
    async fn extract(
        &self,
        source: &Path,
        rect: CropRect,
        resize: Option<OutputSize>,
        dest: &Path,
    ) -> Result<(), CodecError>;
}

/// [`ImageCodec`] backed by the `image` crate. Decoding runs on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngCodec;

#[async_trait]
impl ImageCodec for PngCodec {
    async fn read_dimensions(&self, path: &Path) -> Result<(u32, u32), CodecError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(u32, u32), CodecError> {
            let reader = ImageReader::open(&path)?.with_guessed_format()?;
            Ok(reader.into_dimensions()?)
        })
        .await?
    }

    async fn extract(
        &self,
        source: &Path,
        rect: CropRect,
        resize: Option<OutputSize>,
        dest: &Path,
    ) -> Result<(), CodecError> {
        let source = source.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extract_blocking(&source, rect, resize, &dest)).await?
    }
}

fn extract_blocking(
    source: &Path,
    rect: CropRect,
    resize: Option<OutputSize>,
    dest: &Path,
) -> Result<(), CodecError> {
    let image = ImageReader::open(source)?.with_guessed_format()?.decode()?;

    let fits_x = rect.left.checked_add(rect.width).is_some_and(|r| r <= image.width());
    let fits_y = rect.top.checked_add(rect.height).is_some_and(|b| b <= image.height());
    if !fits_x || !fits_y {
        return Err(CodecError::OutOfBounds {
            rect,
            width: image.width(),
            height: image.height(),
        });
    }

    let mut cropped = image.crop_imm(rect.left, rect.top, rect.width, rect.height);
    if let Some(size) = resize {
        cropped = cropped.resize_exact(size.width, size.height, FilterType::Lanczos3);
    }

    // Renamed into place; readers never see a half-written PNG.
    let partial = partial_path(dest);
    if let Err(e) = cropped.save_with_format(&partial, ImageFormat::Png) {
        let _ = std::fs::remove_file(&partial);
        return Err(e.into());
    }
    std::fs::rename(&partial, dest)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crop {rect:?} exceeds {width}x{height} source")]
    OutOfBounds {
        rect: CropRect,
        width: u32,
        height: u32,
    },

    #[error("Codec task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_gradient(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[tokio::test]
    async fn test_read_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master.png");
        write_gradient(&master, 40, 30);

        let dims = PngCodec.read_dimensions(&master).await.unwrap();
        assert_eq!(dims, (40, 30));
    }

    #[tokio::test]
    async fn test_extract_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master.png");
        let cropped = dir.path().join("cropped.png");
        write_gradient(&master, 40, 30);

        let rect = CropRect { left: 10, top: 3, width: 20, height: 15 };
        PngCodec.extract(&master, rect, None, &cropped).await.unwrap();

        let out = image::open(&cropped).unwrap().to_rgb8();
        assert_eq!(out.dimensions(), (20, 15));
        // Top-left pixel of the crop is source pixel (10, 3).
        assert_eq!(out.get_pixel(0, 0), &Rgb([10, 3, 128]));
        assert_eq!(out.get_pixel(19, 14), &Rgb([29, 17, 128]));
        assert!(!partial_path(&cropped).exists());
    }

    #[tokio::test]
    async fn test_extract_with_resize() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master.png");
        let cropped = dir.path().join("cropped.png");
        write_gradient(&master, 40, 30);

        let rect = CropRect { left: 0, top: 0, width: 40, height: 30 };
        let size = OutputSize { width: 8, height: 6 };
        PngCodec.extract(&master, rect, Some(size), &cropped).await.unwrap();

        assert_eq!(image::image_dimensions(&cropped).unwrap(), (8, 6));
    }

    #[tokio::test]
    async fn test_out_of_bounds_rect_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master.png");
        let cropped = dir.path().join("cropped.png");
        write_gradient(&master, 40, 30);

        let rect = CropRect { left: 30, top: 0, width: 20, height: 10 };
        let err = PngCodec.extract(&master, rect, None, &cropped).await.unwrap_err();
        assert!(matches!(err, CodecError::OutOfBounds { width: 40, height: 30, .. }));
        assert!(!cropped.exists());
    }

    #[tokio::test]
    async fn test_corrupt_master_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master.png");
        std::fs::write(&master, b"<html>not an image</html>").unwrap();

        assert!(PngCodec.read_dimensions(&master).await.is_err());
    }
}
