use crate::dataloader::transform_gen_below;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};

// ============================================================================
// ConvertColor
// ============================================================================

/// Converts any decoded image to 8-bit RGB (`is_color = true`) or 8-bit
/// grayscale (`is_color = false`).
#[derive(Debug, Clone, Copy)]
pub struct ConvertColor {
    is_color: bool,
}

impl ConvertColor {
    pub fn new(is_color: bool) -> Self {
        Self { is_color }
    }
}

impl Transform<DynamicImage, DynamicImage> for ConvertColor {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        Ok(match (self.is_color, img) {
            (true, img @ DynamicImage::ImageRgb8(_)) => img,
            (false, img @ DynamicImage::ImageLuma8(_)) => img,
            (true, img) => DynamicImage::ImageRgb8(img.to_rgb8()),
            (false, img) => DynamicImage::ImageLuma8(img.to_luma8()),
        })
    }
}

// ============================================================================
// Resize
// ============================================================================

/// Resizes an image to exactly `width x height`, ignoring the aspect ratio.
///
/// # Filter Types
/// - `Nearest`: nearest neighbour, fastest
/// - `Triangle`: bilinear, the decoder's default
/// - `Lanczos3`: highest quality, slowest
///
/// # Example
/// ```ignore
/// let resize = Resize::new(256, 256, FilterType::Triangle)?;
/// let resized = resize.apply(img)?;
/// ```
#[derive(Debug, Clone)]
pub struct Resize {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl Resize {
    pub fn new(width: u32, height: u32, filter: FilterType) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive after resizing (got {}x{})",
            width,
            height
        );
        Ok(Self {
            width,
            height,
            filter,
        })
    }
}

impl Transform<DynamicImage, DynamicImage> for Resize {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if img.dimensions() == (self.width, self.height) {
            return Ok(img);
        }
        Ok(img.resize_exact(self.width, self.height, self.filter))
    }
}

// ============================================================================
// Crop
// ============================================================================

/// Where a [`Crop`] window is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMode {
    /// Centered window (test phase).
    Center,
    /// Uniformly random window drawn from the transform RNG (training phase).
    Random,
}

/// Square `size x size` crop.
///
/// Fails if the image is smaller than the crop in either dimension.
#[derive(Debug, Clone)]
pub struct Crop {
    size: u32,
    mode: CropMode,
}

impl Crop {
    pub fn new(size: u32, mode: CropMode) -> Result<Self> {
        ensure!(size > 0, "Crop size must be positive");
        Ok(Self { size, mode })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Top-left corner of the crop window for an image of `width x height`.
    fn offset(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        ensure!(
            self.size <= width && self.size <= height,
            "Crop size {} exceeds image size {}x{}",
            self.size,
            width,
            height
        );
        let (max_x, max_y) = (width - self.size, height - self.size);
        Ok(match self.mode {
            CropMode::Center => (max_x / 2, max_y / 2),
            CropMode::Random => (transform_gen_below(max_x + 1), transform_gen_below(max_y + 1)),
        })
    }
}

impl Transform<DynamicImage, DynamicImage> for Crop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        if (width, height) == (self.size, self.size) {
            return Ok(img);
        }
        let (x, y) = self.offset(width, height)?;
        Ok(img.crop_imm(x, y, self.size, self.size))
    }
}
