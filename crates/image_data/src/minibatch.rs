use anyhow::{ensure, Context, Result};
use tch::{Device, Kind, Tensor};

/// A recyclable batch buffer: image data and labels for `batch_size` images.
///
/// - `data`: float tensor `[batch_size, C, H, W]`. `C/H/W` come from the first
///   image of the batch and may change from one batch to the next.
/// - `label`: float tensor `[batch_size, L]`, `L = 1` for single-label
///   datasets, `L = max_label_id + 1` for multi-label datasets. Its shape is
///   fixed for the lifetime of the layer.
///
/// Buffers are allocated once by the layer and refilled in place by the
/// batch loader, so neither tensor is replaced unless the image shape changes.
///
/// # Example
/// ```ignore
/// let batch = Batch::new([32, 3, 224, 224], [32, 1]);
/// assert_eq!(batch.batch_size(), 32);
/// ```
#[derive(Debug)]
pub struct Batch {
    pub data: Tensor,
    pub label: Tensor,
}

impl Batch {
    /// Allocates zero-filled CPU tensors.
    pub fn new(data_shape: [i64; 4], label_shape: [i64; 2]) -> Self {
        Self {
            data: Tensor::zeros(&data_shape, (Kind::Float, Device::Cpu)),
            label: Tensor::zeros(&label_shape, (Kind::Float, Device::Cpu)),
        }
    }

    pub fn batch_size(&self) -> i64 {
        self.data.size()[0]
    }

    /// `[C, H, W]` of every image in this batch.
    pub fn image_shape(&self) -> Result<[i64; 3]> {
        let (_, c, h, w) = self
            .data
            .size4()
            .context("Batch data must be a 4D tensor [B, C, H, W]")?;
        Ok([c, h, w])
    }

    pub fn label_width(&self) -> i64 {
        self.label.size().get(1).copied().unwrap_or(0)
    }

    /// Makes `data` hold `[batch_size, C, H, W]` images, reallocating only
    /// when the image shape differs from the current one.
    pub fn reshape_data(&mut self, image_shape: [i64; 3]) -> Result<()> {
        if self.image_shape()? == image_shape {
            return Ok(());
        }
        let [c, h, w] = image_shape;
        ensure!(
            c > 0 && h > 0 && w > 0,
            "Image shape must be positive (got {}x{}x{})",
            c,
            h,
            w
        );
        self.data = Tensor::zeros(
            &[self.batch_size(), c, h, w],
            (self.data.kind(), self.data.device()),
        );
        Ok(())
    }

    /// New handles to the same storage; writes through either are visible to both.
    pub fn shallow_clone(&self) -> Self {
        Self {
            data: self.data.shallow_clone(),
            label: self.label.shallow_clone(),
        }
    }

    /// Copies both tensors to the target device (CPU/GPU).
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            data: self.data.to_device(device),
            label: self.label.to_device(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_allocation() -> Result<()> {
        let batch = Batch::new([4, 3, 8, 6], [4, 1]);

        assert_eq!(batch.batch_size(), 4);
        assert_eq!(batch.image_shape()?, [3, 8, 6]);
        assert_eq!(batch.label_width(), 1);
        assert_eq!(batch.data.kind(), Kind::Float);
        assert_eq!(batch.label.double_value(&[3, 0]), 0.0);
        Ok(())
    }

    #[test]
    fn test_reshape_data_keeps_batch_dimension() -> Result<()> {
        let mut batch = Batch::new([2, 3, 4, 4], [2, 8]);

        batch.reshape_data([1, 10, 12])?;
        assert_eq!(batch.data.size(), vec![2, 1, 10, 12]);
        assert_eq!(batch.label.size(), vec![2, 8]);

        assert!(batch.reshape_data([0, 10, 12]).is_err());
        Ok(())
    }

    #[test]
    fn test_reshape_data_same_shape_keeps_buffer() -> Result<()> {
        let mut batch = Batch::new([2, 1, 2, 2], [2, 1]);
        let _ = batch.data.fill_(7.0);

        batch.reshape_data([1, 2, 2])?;
        assert_eq!(batch.data.double_value(&[1, 0, 1, 1]), 7.0);
        Ok(())
    }

    #[test]
    fn test_batch_to_device() {
        let cpu_batch = Batch::new([2, 3, 2, 2], [2, 1]);
        let target_device = Device::cuda_if_available();
        let moved = cpu_batch.to_device(target_device);

        assert_eq!(moved.data.device(), target_device);
        assert_eq!(moved.label.device(), target_device);
        assert_eq!(cpu_batch.data.device(), Device::Cpu);
    }
}
