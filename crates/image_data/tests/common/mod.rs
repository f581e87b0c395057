#![allow(dead_code)]

use anyhow::Result;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use image_data::transforms::vision::{DecodeOptions, ImageDecoder};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// A temporary dataset directory holding real image files and a manifest.
pub struct TestDataset {
    pub dir: TempDir,
}

impl TestDataset {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Root folder prefix for manifest filenames (ends with a separator).
    pub fn root(&self) -> String {
        format!("{}/", self.dir.path().display())
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes a `width x height` RGB PNG whose every pixel is `[value; 3]`.
    pub fn write_png(&self, name: &str, width: u32, height: u32, value: u8) -> Result<PathBuf> {
        let path = self.path(name);
        RgbImage::from_pixel(width, height, Rgb([value; 3])).save(&path)?;
        Ok(path)
    }

    /// Writes a `width x height` grayscale PNG with value `x + y` at each pixel.
    pub fn write_gradient_png(&self, name: &str, width: u32, height: u32) -> Result<PathBuf> {
        let path = self.path(name);
        GrayImage::from_fn(width, height, |x, y| Luma([(x + y) as u8])).save(&path)?;
        Ok(path)
    }

    pub fn write_garbage(&self, name: &str) -> Result<PathBuf> {
        let path = self.path(name);
        fs::write(&path, b"not an image at all")?;
        Ok(path)
    }

    pub fn write_manifest(&self, name: &str, lines: &[&str]) -> Result<PathBuf> {
        let path = self.path(name);
        fs::write(&path, lines.join("\n"))?;
        Ok(path)
    }
}

/// In-memory decoder: `img_<i>.png` decodes to a uniform 2x2 RGB image of value `i`,
/// names listed in `unreadable` fail.
#[derive(Default)]
pub struct FakeDecoder {
    pub unreadable: Vec<String>,
    pub calls: AtomicUsize,
}

impl FakeDecoder {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            unreadable: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageDecoder for FakeDecoder {
    fn decode(&self, path: &Path, _options: &DecodeOptions) -> Option<DynamicImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = path.file_name()?.to_str()?;
        if self.unreadable.iter().any(|bad| bad == name) {
            return None;
        }
        let value: u8 = name.strip_prefix("img_")?.strip_suffix(".png")?.parse().ok()?;
        Some(DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([value; 3]))))
    }
}

/// Index encoded in the pixels of each slot (see [`FakeDecoder`] / `write_png`).
pub fn slot_values(data: &tch::Tensor) -> Vec<i64> {
    (0..data.size()[0])
        .map(|i| data.double_value(&[i, 0, 0, 0]) as i64)
        .collect()
}
