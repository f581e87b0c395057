use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

/// Number of tensor channels [`ToTensor`] produces for `img`.
pub fn channel_count(img: &DynamicImage) -> i64 {
    match img {
        DynamicImage::ImageLuma8(_) => 1,
        _ => 3,
    }
}

// ============================================================================
// ToTensor
// ============================================================================

/// Converts an image to a channel-first f32 tensor holding the raw 0–255
/// pixel values (mean subtraction and scaling happen downstream).
///
/// | Input Format  | Output Shape |
/// |---------------|--------------|
/// | Grayscale (L) | `[1, H, W]`  |
/// | RGB           | `[3, H, W]`  |
/// | Other         | `[3, H, W]`, converted to RGB |
#[derive(Debug, Clone, Copy)]
pub struct ToTensor;

impl Transform<DynamicImage, Tensor> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );
        let (h, w) = (height as i64, width as i64);

        // image buffers are interleaved HWC
        let hwc = match img {
            DynamicImage::ImageLuma8(gray) => Tensor::from_slice(gray.as_raw()).reshape(&[h, w, 1]),
            DynamicImage::ImageRgb8(rgb) => Tensor::from_slice(rgb.as_raw()).reshape(&[h, w, 3]),
            other => Tensor::from_slice(other.to_rgb8().as_raw()).reshape(&[h, w, 3]),
        };

        Ok(hwc.permute(&[2, 0, 1]).to_kind(Kind::Float).contiguous())
    }
}
