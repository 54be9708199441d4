//! JPEG normalization

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, WombatError};

/// Pixel size of an encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Image processing boundary.
///
/// Implementations are called from a blocking thread and may do CPU-heavy
/// decoding and encoding. Failures are reported as conversion errors.
pub trait ImageConverter: Send + Sync {
    /// Re-encode `src` as JPEG at `dest`
    fn convert_to_jpeg(&self, src: &Path, dest: &Path) -> Result<Dimensions>;

    /// Scale `src` to `width` pixels wide, preserving aspect ratio, and
    /// encode it as JPEG at `dest`
    fn resize_width_to_jpeg(&self, src: &Path, dest: &Path, width: u32) -> Result<Dimensions>;
}

/// [`ImageConverter`] backed by the `image` crate. Reads GIF, JPEG and PNG.
#[derive(Debug, Clone)]
pub struct JpegConverter {
    quality: u8,
}

impl JpegConverter {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    fn open(src: &Path) -> Result<DynamicImage> {
        // Staged uploads carry no usable extension, so sniff the format
        ImageReader::open(src)
            .map_err(|e| conversion(src, e))?
            .with_guessed_format()
            .map_err(|e| conversion(src, e))?
            .decode()
            .map_err(|e| conversion(src, e))
    }

    fn write(&self, image: &DynamicImage, dest: &Path) -> Result<Dimensions> {
        let rgb = image.to_rgb8();
        let file = File::create(dest).map_err(|e| conversion(dest, e))?;
        let mut writer = BufWriter::new(file);

        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, self.quality))
            .map_err(|e| conversion(dest, e))?;
        writer.flush().map_err(|e| conversion(dest, e))?;

        Ok(Dimensions {
            width: rgb.width(),
            height: rgb.height(),
        })
    }
}

impl Default for JpegConverter {
    fn default() -> Self {
        Self::new(85)
    }
}

impl ImageConverter for JpegConverter {
    fn convert_to_jpeg(&self, src: &Path, dest: &Path) -> Result<Dimensions> {
        let image = Self::open(src)?;
        self.write(&image, dest)
    }

    fn resize_width_to_jpeg(&self, src: &Path, dest: &Path, width: u32) -> Result<Dimensions> {
        if width == 0 {
            return Err(WombatError::Conversion("target width must be positive".to_string()));
        }

        let image = Self::open(src)?;
        let height = scaled_height(image.width(), image.height(), width);
        let resized = image.resize_exact(width, height, FilterType::Lanczos3);
        self.write(&resized, dest)
    }
}

/// Height matching `target_width` at the original aspect ratio, at least 1
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return height.max(1);
    }
    let (width, height, target_width) =
        (u64::from(width), u64::from(height), u64::from(target_width));
    let scaled = (height * target_width + width / 2) / width;
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

fn conversion(path: &Path, err: impl std::fmt::Display) -> WombatError {
    WombatError::Conversion(format!("{}: {}", path.display(), err))
}
