//! src/dataloader/config.rs
//!
//! Configuration for the image data layer.
//!
//! The `ImageDataConfig` struct stores every option the layer recognizes:
//! where the manifest lives, how images are decoded, how batches are sized,
//! how labels are encoded and how the prefetch ring behaves.
//!
//! Example:
//! ```ignore
//! let config = ImageDataConfig::builder("data/train.txt")
//!     .root_folder("data/images/")
//!     .resize(256, 256)
//!     .batch_size(32)
//!     .shuffle(true)
//!     .build();
//! ```
//!
//! Or from JSON (unknown fields are rejected, missing fields take defaults):
//! ```ignore
//! let config = ImageDataConfig::from_json_file("layer.json")?;
//! ```
//!
//! # Memory considerations:
//! - `prefetch_count`: every buffer holds a full `[batch_size, C, H, W]` float tensor.
//! - `max_load_retries`: `None` keeps retrying unreadable files forever, which can
//!                       stall batch production if every file in the manifest is bad.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do when a multi-label entry writes both sentinels to the same label slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelConflictPolicy {
    /// Last write wins without a trace.
    #[default]
    Overwrite,
    /// Last write wins, and the conflict is logged.
    Warn,
    /// Batch production stops with `LoadError::LabelConflict`.
    Reject,
}

/// Parameters for the default pixel transform engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// Multiplier applied after mean subtraction.
    pub scale: f32,
    /// Randomly mirror images horizontally (p = 0.5).
    pub mirror: bool,
    /// Square crop size, 0 disables cropping.
    pub crop_size: u32,
    /// Per-channel means; a single value is broadcast to every channel.
    pub mean_values: Vec<f32>,
    /// Training phase crops at random offsets, test phase crops at the center.
    pub train: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            mirror: false,
            crop_size: 0,
            mean_values: Vec::new(),
            train: true,
        }
    }
}

/// Configuration for the image data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageDataConfig {
    /// Manifest file listing `<filename> <labels>` lines (required).
    pub source: PathBuf,
    /// Prefix prepended verbatim to every filename of the manifest.
    pub root_folder: String,
    /// Resize height, 0 keeps the decoded height. Must be set together with `new_width`.
    pub new_height: u32,
    /// Resize width, 0 keeps the decoded width.
    pub new_width: u32,
    /// Decode as 3-channel color (true) or 1-channel grayscale (false).
    pub is_color: bool,
    /// Number of images per batch (must be > 0)
    pub batch_size: usize,
    /// Shuffle the entries at setup and every time the cursor wraps around.
    pub shuffle: bool,
    /// Skip a random number of entries in `[0, rand_skip)` at setup.
    pub rand_skip: usize,
    /// Separates labels inside one label group.
    pub label_separator: char,
    /// Separates the "use" label group from the "ignore" label group.
    pub label_list_separator: char,
    /// Value written for "use" labels in multi-label rows.
    pub use_label_value: f32,
    /// Value written for "ignore" labels in multi-label rows.
    pub ignore_label_value: f32,
    pub label_conflict: LabelConflictPolicy,
    /// Consecutive unreadable images tolerated before giving up. `None` retries forever.
    pub max_load_retries: Option<usize>,
    /// Number of recycled batch buffers shared by the producer and the consumer.
    pub prefetch_count: usize,
    /// Seed for shuffling, `rand_skip` and random transforms. Drawn at random when unset.
    pub seed: Option<u64>,
    /// How long the consumer waits for a prefetched batch, in milliseconds.
    pub timeout_ms: u64,
    pub transform: TransformConfig,
}

impl Default for ImageDataConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            root_folder: String::new(),
            new_height: 0,
            new_width: 0,
            is_color: true,
            batch_size: 1,
            shuffle: false,
            rand_skip: 0,
            label_separator: ',',
            label_list_separator: ';',
            use_label_value: 1.0,
            ignore_label_value: -1.0,
            label_conflict: LabelConflictPolicy::Overwrite,
            max_load_retries: None,
            prefetch_count: 3,
            seed: None,
            timeout_ms: 30_000,
            transform: TransformConfig::default(),
        }
    }
}

impl ImageDataConfig {
    pub fn builder(source: impl Into<PathBuf>) -> ImageDataConfigBuilder {
        ImageDataConfigBuilder {
            config: Self {
                source: source.into(),
                ..Self::default()
            },
        }
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open layer config: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse layer config: {}", path.display()))
    }

    /// Reads a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse layer config")
    }

    /// Checks every constraint that does not depend on the manifest contents.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.as_os_str().is_empty() {
            return Err(ConfigError::MissingSource);
        }
        if (self.new_height == 0) != (self.new_width == 0) {
            return Err(ConfigError::InconsistentResize {
                height: self.new_height,
                width: self.new_width,
            });
        }
        if self.label_separator == self.label_list_separator {
            return Err(ConfigError::SameSeparators(self.label_separator));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::NonPositiveBatchSize);
        }
        if self.prefetch_count == 0 {
            return Err(ConfigError::ZeroPrefetchCount);
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.use_label_value == 0.0
            || self.ignore_label_value == 0.0
            || self.use_label_value == self.ignore_label_value
        {
            return Err(ConfigError::InvalidLabelValues {
                use_value: self.use_label_value,
                ignore_value: self.ignore_label_value,
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Builder for ImageDataConfig with method chaining
pub struct ImageDataConfigBuilder {
    config: ImageDataConfig,
}

impl ImageDataConfigBuilder {
    pub fn root_folder(mut self, root: impl Into<String>) -> Self {
        self.config.root_folder = root.into();
        self
    }

    /// Resize every decoded image to exactly `height` x `width`.
    pub fn resize(mut self, height: u32, width: u32) -> Self {
        self.config.new_height = height;
        self.config.new_width = width;
        self
    }

    pub fn is_color(mut self, is_color: bool) -> Self {
        self.config.is_color = is_color;
        self
    }

    /// Set the batch size (must be > 0)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    pub fn rand_skip(mut self, rand_skip: usize) -> Self {
        self.config.rand_skip = rand_skip;
        self
    }

    /// Set both label separators at once.
    pub fn separators(mut self, label_separator: char, label_list_separator: char) -> Self {
        self.config.label_separator = label_separator;
        self.config.label_list_separator = label_list_separator;
        self
    }

    /// Set the sentinels written for "use" and "ignore" labels.
    pub fn label_values(mut self, use_value: f32, ignore_value: f32) -> Self {
        self.config.use_label_value = use_value;
        self.config.ignore_label_value = ignore_value;
        self
    }

    pub fn label_conflict(mut self, policy: LabelConflictPolicy) -> Self {
        self.config.label_conflict = policy;
        self
    }

    /// Give up after `retries` consecutive unreadable images instead of retrying forever.
    pub fn max_load_retries(mut self, retries: usize) -> Self {
        self.config.max_load_retries = Some(retries);
        self
    }

    pub fn prefetch_count(mut self, count: usize) -> Self {
        self.config.prefetch_count = count;
        self
    }

    /// Set the random seed for reproducible shuffling, skipping and transforms.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Set the consumer-side wait for a prefetched batch.
    ///
    /// - Too low: May fail while the producer is still decoding a large batch
    /// - Too high: Delays detection of a stalled producer.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn transform(mut self, transform: TransformConfig) -> Self {
        self.config.transform = transform;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ImageDataConfig {
        self.config
    }
}
