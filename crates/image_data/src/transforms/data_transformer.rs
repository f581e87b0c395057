//! Pixel transform engine: turns a decoded image into the float values stored
//! in one slot of a batch.

use crate::dataloader::TransformConfig;
use crate::transforms::vision::{
    channel_count, Crop, CropMode, RandomHorizontalFlip, SubtractMean, ToTensor,
};
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::Tensor;

/// Shape inference plus per-image transformation into a batch slot.
pub trait DataTransformer: Send + Sync {
    /// `[C, H, W]` that [`transform`](Self::transform) will produce for `image`.
    fn infer_shape(&self, image: &DynamicImage) -> Result<[i64; 3]>;

    /// Writes the transformed image into `slot`, a `[C, H, W]` view into the batch.
    fn transform(&self, image: DynamicImage, slot: &mut Tensor) -> Result<()>;
}

/// Default engine: optional square crop, optional mirroring, then
/// `(pixel - mean) * scale` on raw 0–255 values.
///
/// Crop offsets and mirroring draw from the thread-local transform RNG, so
/// they are reproducible when the prefetch thread is seeded.
pub struct PixelTransformer {
    crop_size: Option<u32>,
    mean: SubtractMean,
    pipeline: Box<dyn Transform<DynamicImage, Tensor>>,
}

impl PixelTransformer {
    pub fn from_config(config: &TransformConfig) -> Result<Self> {
        let crop = match config.crop_size {
            0 => None,
            size => {
                let mode = if config.train {
                    CropMode::Random
                } else {
                    CropMode::Center
                };
                Some(Crop::new(size, mode)?)
            }
        };
        let mirror = if config.mirror {
            Some(RandomHorizontalFlip::new(0.5)?)
        } else {
            None
        };
        let mean = SubtractMean::new(&config.mean_values, config.scale);
        let crop_size = crop.as_ref().map(Crop::size);

        let pipeline = crop.then(mirror).then(ToTensor).then(mean.clone());
        Ok(Self {
            crop_size,
            mean,
            pipeline: Box::new(pipeline),
        })
    }
}

impl Default for PixelTransformer {
    /// Identity: raw pixel values, no crop, no mirror.
    fn default() -> Self {
        Self {
            crop_size: None,
            mean: SubtractMean::new(&[], 1.0),
            pipeline: Box::new(ToTensor),
        }
    }
}

impl DataTransformer for PixelTransformer {
    fn infer_shape(&self, image: &DynamicImage) -> Result<[i64; 3]> {
        let channels = channel_count(image);
        self.mean.check_channels(channels)?;

        let (width, height) = image.dimensions();
        match self.crop_size {
            Some(size) => {
                ensure!(
                    size <= width && size <= height,
                    "Crop size {} exceeds image size {}x{}",
                    size,
                    width,
                    height
                );
                Ok([channels, size as i64, size as i64])
            }
            None => Ok([channels, height as i64, width as i64]),
        }
    }

    fn transform(&self, image: DynamicImage, slot: &mut Tensor) -> Result<()> {
        let values = self.pipeline.apply(image)?;
        ensure!(
            values.size() == slot.size(),
            "Transformed image shape {:?} does not match the batch image shape {:?}",
            values.size(),
            slot.size()
        );
        slot.f_copy_(&values)
            .context("Failed to copy transformed image into the batch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::init_transform_rng;
    use image::{Rgb, RgbImage};
    use tch::{Device, Kind};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([x as u8, y as u8, 100])
        }))
    }

    fn slot(shape: [i64; 3]) -> Tensor {
        Tensor::zeros(&shape, (Kind::Float, Device::Cpu))
    }

    #[test]
    fn test_identity_transform() -> Result<()> {
        let transformer = PixelTransformer::default();
        let image = gradient(5, 4);
        let shape = transformer.infer_shape(&image)?;
        assert_eq!(shape, [3, 4, 5]);

        let mut out = slot(shape);
        transformer.transform(image, &mut out)?;
        assert_eq!(out.double_value(&[0, 3, 4]), 4.0);
        assert_eq!(out.double_value(&[1, 3, 4]), 3.0);
        assert_eq!(out.double_value(&[2, 0, 0]), 100.0);
        Ok(())
    }

    #[test]
    fn test_center_crop_mean_and_scale() -> Result<()> {
        let config = TransformConfig {
            crop_size: 2,
            mean_values: vec![1.0, 0.0, 100.0],
            scale: 2.0,
            train: false,
            ..TransformConfig::default()
        };
        let transformer = PixelTransformer::from_config(&config)?;
        let image = gradient(6, 4);
        let shape = transformer.infer_shape(&image)?;
        assert_eq!(shape, [3, 2, 2]);

        let mut out = slot(shape);
        transformer.transform(image, &mut out)?;
        // Window starts at (2, 1): channel 0 holds x, channel 1 holds y.
        assert_eq!(out.double_value(&[0, 0, 0]), (2.0 - 1.0) * 2.0);
        assert_eq!(out.double_value(&[1, 1, 0]), 2.0 * 2.0);
        assert_eq!(out.double_value(&[2, 1, 1]), 0.0);
        Ok(())
    }

    #[test]
    fn test_random_crop_with_mirror() -> Result<()> {
        init_transform_rng(3);
        let config = TransformConfig {
            crop_size: 3,
            mirror: true,
            ..TransformConfig::default()
        };
        let transformer = PixelTransformer::from_config(&config)?;

        for _ in 0..20 {
            let mut out = slot([3, 3, 3]);
            transformer.transform(gradient(8, 8), &mut out)?;
            // Channel 0 holds x, so any 3-wide window spans exactly two columns.
            let xs = out.select(0, 0);
            let span = xs.max().double_value(&[]) - xs.min().double_value(&[]);
            assert_eq!(span, 2.0);
            assert!(xs.max().double_value(&[]) <= 7.0);
        }
        Ok(())
    }

    #[test]
    fn test_shape_errors() -> Result<()> {
        let cropping = PixelTransformer::from_config(&TransformConfig {
            crop_size: 10,
            ..TransformConfig::default()
        })?;
        assert!(cropping.infer_shape(&gradient(8, 12)).is_err());

        let two_means = PixelTransformer::from_config(&TransformConfig {
            mean_values: vec![1.0, 2.0],
            ..TransformConfig::default()
        })?;
        assert!(two_means.infer_shape(&gradient(2, 2)).is_err());

        let mut wrong_slot = slot([3, 5, 5]);
        let err = PixelTransformer::default()
            .transform(gradient(4, 4), &mut wrong_slot)
            .unwrap_err();
        assert!(err.to_string().contains("does not match the batch image shape"));
        Ok(())
    }

    #[test]
    fn test_writes_through_batch_view() -> Result<()> {
        let batch = Tensor::zeros(&[2, 3, 2, 2], (Kind::Float, Device::Cpu));
        let mut second = batch.get(1);

        PixelTransformer::default().transform(gradient(2, 2), &mut second)?;
        assert_eq!(batch.double_value(&[1, 2, 0, 0]), 100.0);
        assert_eq!(batch.double_value(&[0, 2, 0, 0]), 0.0);
        Ok(())
    }
}
