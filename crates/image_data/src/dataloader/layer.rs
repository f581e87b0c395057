use crate::batch_loader::BatchLoader;
use crate::cursor::DatasetCursor;
use crate::dataloader::prefetch::{PrefetchThread, PrefetchedBatch};
use crate::dataloader::ImageDataConfig;
use crate::dataset::LabelMode;
use crate::error::ConfigError;
use crate::minibatch::Batch;
use crate::readers::ManifestParser;
use crate::transforms::vision::{ImageDecoder, LoadImage};
use crate::transforms::{DataTransformer, PixelTransformer};
use anyhow::Result;
use rand::Rng;
use tracing::info;

/// Reads an image manifest and serves batches prepared on a background thread.
///
/// Setup (all failures here are fatal and typed as [`ConfigError`]):
/// 1. validate the configuration,
/// 2. parse the manifest and fix the label layout,
/// 3. shuffle / randomly skip,
/// 4. infer `[C, H, W]` from the first loadable image without moving the cursor,
/// 5. allocate `prefetch_count` batch buffers and start the producer thread.
///
/// # Example
/// ```ignore
/// let config = ImageDataConfig::builder("train.txt")
///     .root_folder("images/")
///     .resize(256, 256)
///     .batch_size(32)
///     .shuffle(true)
///     .build();
/// let layer = ImageDataLayer::setup(config)?;
///
/// for _ in 0..iterations {
///     let batch = layer.next_batch()?;
///     train_step(&batch.data, &batch.label)?;
/// } // the buffer goes back to the producer here
/// ```
pub struct ImageDataLayer {
    prefetch: PrefetchThread,
    label_mode: LabelMode,
    data_shape: [i64; 4],
    label_shape: [i64; 2],
    num_entries: usize,
}

impl ImageDataLayer {
    /// Sets the layer up with the default decoder and pixel transformer.
    pub fn setup(config: ImageDataConfig) -> Result<Self> {
        let transformer = PixelTransformer::from_config(&config.transform)?;
        Self::setup_with(config, LoadImage::new(), transformer)
    }

    /// Sets the layer up with caller-provided collaborators.
    pub fn setup_with<D, T>(config: ImageDataConfig, decoder: D, transformer: T) -> Result<Self>
    where
        D: ImageDecoder + 'static,
        T: DataTransformer + 'static,
    {
        config.validate()?;
        let source = config.source.display().to_string();

        info!("Opening file {}", source);
        let manifest = ManifestParser::from_config(&config)?.parse_file(&config.source)?;
        if manifest.is_empty() {
            return Err(ConfigError::EmptyDataset { path: source }.into());
        }
        let num_entries = manifest.len();
        let label_mode = manifest.label_mode;
        info!("A total of {} images.", num_entries);
        if let LabelMode::Multi { width } = label_mode {
            info!("Multi-label dataset with {} labels per image", width);
        }

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let cursor = DatasetCursor::init(
            manifest.entries,
            config.shuffle,
            config.rand_skip,
            Some(seed),
        )?;
        let mut loader = BatchLoader::new(cursor, label_mode, decoder, transformer, &config);

        let [channels, height, width] =
            loader
                .probe_shape()?
                .ok_or_else(|| ConfigError::NoLoadableImage {
                    path: source.clone(),
                    num_entries,
                })?;

        let batch_size = config.batch_size as i64;
        let data_shape = [batch_size, channels, height, width];
        let label_shape = [batch_size, label_mode.width() as i64];
        info!(
            "output data size: {},{},{},{}",
            batch_size, channels, height, width
        );

        let batches = (0..config.prefetch_count)
            .map(|_| Batch::new(data_shape, label_shape))
            .collect();
        let prefetch = PrefetchThread::spawn(batches, config.timeout(), seed, move |batch| {
            loader.load_batch(batch)
        })?;

        Ok(Self {
            prefetch,
            label_mode,
            data_shape,
            label_shape,
            num_entries,
        })
    }

    /// Blocks until the producer has a filled batch (bounded by `timeout_ms`).
    pub fn next_batch(&self) -> Result<PrefetchedBatch<'_>> {
        self.prefetch.recv()
    }

    pub fn label_mode(&self) -> LabelMode {
        self.label_mode
    }

    /// `[B, C, H, W]` inferred at setup. Individual batches may differ in `C/H/W`
    /// when images are not resized.
    pub fn data_shape(&self) -> [i64; 4] {
        self.data_shape
    }

    pub fn label_shape(&self) -> [i64; 2] {
        self.label_shape
    }

    /// Number of manifest entries.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }
}
