use crate::dataloader::transform_gen_bool;
use crate::transforms::Transform;
use anyhow::{anyhow, ensure, Result};
use image::{DynamicImage, ImageBuffer, Pixel};

// ============================================================================
// RandomHorizontalFlip
// ============================================================================

/// Mirrors images horizontally with probability `p`.
///
/// # Example
/// ```ignore
/// let flip = RandomHorizontalFlip::new(0.5)?;
/// let augmented = flip.apply(image)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "Probability must be in [0.0, 1.0] range (got {})",
            p
        );
        Ok(Self { p })
    }

    /// Reverses each row of an 8-bit image in one pass over the raw buffer.
    fn flip_rows<P>(img: ImageBuffer<P, Vec<u8>>) -> Result<ImageBuffer<P, Vec<u8>>>
    where
        P: Pixel<Subpixel = u8>,
    {
        let (width, height) = img.dimensions();
        let channels = P::CHANNEL_COUNT as usize;
        let row_len = width as usize * channels;
        let mut pixels = img.into_raw();

        for row in pixels.chunks_exact_mut(row_len) {
            // Reverse pixel order, then restore channel order inside each pixel.
            row.reverse();
            for pixel in row.chunks_exact_mut(channels) {
                pixel.reverse();
            }
        }

        ImageBuffer::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("Failed to rebuild flipped {}x{} image", width, height))
    }

    fn flip(img: DynamicImage) -> Result<DynamicImage> {
        Ok(match img {
            DynamicImage::ImageRgb8(rgb) => DynamicImage::ImageRgb8(Self::flip_rows(rgb)?),
            DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(Self::flip_rows(gray)?),
            other => other.fliph(),
        })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomHorizontalFlip {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        match self.p {
            p if p <= 0.0 => Ok(img),
            p if p >= 1.0 => Self::flip(img),
            p if transform_gen_bool(p) => Self::flip(img),
            _ => Ok(img),
        }
    }
}
