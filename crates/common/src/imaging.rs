//! Screenshot image handling

use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::Result;

/// Convert a raw capture (PPM from `screendump`) to PNG and remove the raw file.
///
/// Returns the path of the PNG, which sits next to the raw file.
pub fn make_png(raw: &Path) -> Result<PathBuf> {
    let dest = raw.with_extension("png");

    let img = ImageReader::open(raw)?.with_guessed_format()?.decode()?;
    img.save(&dest)?;
    std::fs::remove_file(raw)?;

    trace!("Converted {} to {}", raw.display(), dest.display());
    Ok(dest)
}

/// Load an image and scale both dimensions by `scale`
pub fn scaled_image(file: &Path, scale: f32) -> Result<DynamicImage> {
    let img = image::open(file)?;
    Ok(scale_image(&img, scale))
}

pub fn scale_image(img: &DynamicImage, scale: f32) -> DynamicImage {
    let width = ((img.width() as f32) * scale).max(1.0) as u32;
    let height = ((img.height() as f32) * scale).max(1.0) as u32;
    img.resize_exact(width, height, FilterType::CatmullRom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_make_png_removes_raw_capture() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("screenshot_0000_boot.ppm");
        RgbImage::new(8, 4).save(&raw).unwrap();

        let png = make_png(&raw).unwrap();

        assert_eq!(png, dir.path().join("screenshot_0000_boot.png"));
        assert!(png.exists());
        assert!(!raw.exists());
        assert_eq!(image::open(&png).unwrap().width(), 8);
    }

    #[test]
    fn test_scale_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(10, 5));
        let scaled = scale_image(&img, 3.0);
        assert_eq!((scaled.width(), scaled.height()), (30, 15));
    }
}
