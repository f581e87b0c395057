use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use tch::Tensor;

// ============================================================================
// SubtractMean
// ============================================================================

/// Subtracts per-channel means, then multiplies by `scale`.
///
/// ```text
/// output[c,h,w] = (input[c,h,w] - mean[c]) * scale
/// ```
///
/// `mean` may be empty (no subtraction), hold a single value applied to every
/// channel, or hold exactly one value per channel.
///
/// # Example
/// ```ignore
/// let stage = SubtractMean::new(&[104.0, 117.0, 123.0], 0.017);
/// let centered = stage.apply(tensor)?;
/// ```
#[derive(Debug, Clone)]
pub struct SubtractMean {
    mean: Vec<f32>,
    scale: f32,
}

impl SubtractMean {
    pub fn new(mean: &[f32], scale: f32) -> Self {
        Self {
            mean: mean.to_vec(),
            scale,
        }
    }

    /// Checks that the means can be applied to `num_channels` channels.
    pub fn check_channels(&self, num_channels: i64) -> Result<()> {
        ensure!(
            self.mean.len() <= 1 || self.mean.len() as i64 == num_channels,
            "Channel count mismatch: image has {} channels but {} mean values were given",
            num_channels,
            self.mean.len()
        );
        Ok(())
    }
}

impl Transform<Tensor, Tensor> for SubtractMean {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        let (num_channels, _height, _width) = tensor
            .size3()
            .context("Input must be 3D tensor [C, H, W]")?;
        self.check_channels(num_channels)?;

        let centered = match self.mean.as_slice() {
            [] => tensor,
            [mean] => tensor - f64::from(*mean),
            means => {
                let mean_t = Tensor::from_slice(means)
                    .reshape(&[num_channels, 1, 1])
                    .to_kind(tensor.kind());
                tensor - mean_t
            }
        };

        Ok(if self.scale == 1.0 {
            centered
        } else {
            centered * f64::from(self.scale)
        })
    }
}
