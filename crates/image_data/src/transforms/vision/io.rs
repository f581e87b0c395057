use crate::transforms::vision::geometric::{ConvertColor, Resize};
use crate::transforms::Transform;
use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, io::Reader as ImageReader, DynamicImage, GrayImage, RgbImage};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use tracing::debug;
use turbojpeg::{Decompressor, Image, PixelFormat};

/// Decode parameters shared by every image of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Target height, 0 keeps the decoded size. Set together with `new_width`.
    pub new_height: u32,
    pub new_width: u32,
    /// RGB8 when true, Luma8 when false.
    pub is_color: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            new_height: 0,
            new_width: 0,
            is_color: true,
        }
    }
}

impl DecodeOptions {
    fn resize(&self) -> Result<Option<Resize>> {
        if self.new_height == 0 || self.new_width == 0 {
            return Ok(None);
        }
        Resize::new(self.new_width, self.new_height, FilterType::Triangle).map(Some)
    }
}

/// Reads and decodes one image file.
///
/// Decoding never fails loudly: any problem (missing file, truncated data,
/// unknown format) yields `None` and the caller decides what to skip.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path, options: &DecodeOptions) -> Option<DynamicImage>;
}

// ============================================================================
// LoadImage - default decoder
// ============================================================================

/// Loads images from disk.
///
/// JPEG files go through TurboJPEG, falling back to the `image` crate if that
/// fails; every other format uses the `image` crate directly. The decoded
/// image is converted to the requested color mode, then resized to exactly
/// `new_width x new_height` (bilinear) when a size is set.
///
/// # Example
/// ```ignore
/// let loader = LoadImage::new();
/// let options = DecodeOptions { new_height: 256, new_width: 256, is_color: true };
/// let image = loader.load(Path::new("photo.jpg"), &options)?;
/// ```
#[derive(Debug, Clone)]
pub struct LoadImage {
    buffer_size: usize,
}

impl Default for LoadImage {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadImage {
    /// Creates a new image loader with an 8KB read buffer.
    pub fn new() -> Self {
        Self { buffer_size: 8192 }
    }

    /// Decodes, converts and resizes `path`, reporting why it failed.
    pub fn load(&self, path: &Path, options: &DecodeOptions) -> Result<DynamicImage> {
        let decoded = if Self::is_jpeg_file(path) {
            self.load_jpeg_turbo(path, options.is_color).or_else(|turbo_error| {
                debug!(
                    "TurboJPEG failed for {}, falling back to standard decoder: {}",
                    path.display(),
                    turbo_error
                );
                self.load_standard_format(path)
            })?
        } else {
            self.load_standard_format(path)?
        };

        let pipeline = ConvertColor::new(options.is_color).then(options.resize()?);
        pipeline
            .apply(decoded)
            .with_context(|| format!("Failed to prepare image: {}", path.display()))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;
        let file_size = file.metadata()?.len() as usize;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = Vec::with_capacity(file_size);
        reader
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;
        Ok(buffer)
    }

    /// Decodes JPEG straight into RGB or grayscale with TurboJPEG.
    fn load_jpeg_turbo(&self, path: &Path, is_color: bool) -> Result<DynamicImage> {
        let buffer = self.read_file(path)?;

        let mut decompressor =
            Decompressor::new().context("Failed to create TurboJPEG decompressor")?;
        let header = decompressor
            .read_header(&buffer)
            .with_context(|| format!("Failed to read JPEG header: {}", path.display()))?;
        let (width, height) = (header.width, header.height);

        let (format, channels) = if is_color {
            (PixelFormat::RGB, 3)
        } else {
            (PixelFormat::GRAY, 1)
        };
        let mut pixels = vec![0u8; width * height * channels];
        let output = Image {
            pixels: pixels.as_mut_slice(),
            width,
            pitch: width * channels,
            height,
            format,
        };
        decompressor
            .decompress(&buffer, output)
            .with_context(|| format!("Failed to decompress JPEG: {}", path.display()))?;

        let (w, h) = (width as u32, height as u32);
        if is_color {
            RgbImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8)
        } else {
            GrayImage::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8)
        }
        .ok_or_else(|| anyhow!("TurboJPEG returned a short buffer for {}", path.display()))
    }

    /// PNG, WebP, TIFF, BMP and any other format the `image` crate can guess.
    fn load_standard_format(&self, path: &Path) -> Result<DynamicImage> {
        let buffer = self.read_file(path)?;
        ImageReader::new(Cursor::new(buffer))
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("Failed to decode image: {}", path.display()))
    }

    fn is_jpeg_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|extension| matches!(extension.to_lowercase().as_str(), "jpg" | "jpeg"))
    }
}

impl ImageDecoder for LoadImage {
    fn decode(&self, path: &Path, options: &DecodeOptions) -> Option<DynamicImage> {
        match self.load(path, options) {
            Ok(image) => Some(image),
            Err(err) => {
                debug!("{:#}", err);
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
