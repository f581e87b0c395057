//! Fills recycled [`Batch`] buffers from the dataset cursor.
//!
//! One call to [`BatchLoader::load_batch`] produces one batch:
//!
//! ```text
//!   cursor ──► decode (skip + advance on failure) ──► infer [C, H, W] ──► reshape batch
//!                                                                          │
//!   for item_id in 0..B:                                                   ▼
//!     decode next loadable entry ──► transform into data[item_id] ──► write label row ──► advance
//! ```
//!
//! Unreadable images are logged and skipped; they never reach the consumer.
//! The only errors produced here come from the opt-in `max_load_retries` and
//! `label_conflict = reject` settings, or from a transform that cannot fit an
//! image into the batch shape.

use crate::cursor::DatasetCursor;
use crate::dataloader::{ImageDataConfig, LabelConflictPolicy};
use crate::dataset::{Entry, LabelGroup, LabelMode};
use crate::error::LoadError;
use crate::minibatch::Batch;
use crate::transforms::vision::{DecodeOptions, ImageDecoder};
use crate::transforms::DataTransformer;
use anyhow::{anyhow, ensure, Context, Result};
use image::DynamicImage;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tch::Tensor;
use tracing::{debug, warn};

pub struct BatchLoader<D, T> {
    cursor: DatasetCursor,
    label_mode: LabelMode,
    decoder: D,
    transformer: T,
    options: DecodeOptions,
    root_folder: String,
    use_label_value: f32,
    ignore_label_value: f32,
    label_conflict: LabelConflictPolicy,
    max_load_retries: Option<usize>,
}

impl<D, T> BatchLoader<D, T>
where
    D: ImageDecoder,
    T: DataTransformer,
{
    pub fn new(
        cursor: DatasetCursor,
        label_mode: LabelMode,
        decoder: D,
        transformer: T,
        config: &ImageDataConfig,
    ) -> Self {
        Self {
            cursor,
            label_mode,
            decoder,
            transformer,
            options: DecodeOptions {
                new_height: config.new_height,
                new_width: config.new_width,
                is_color: config.is_color,
            },
            root_folder: config.root_folder.clone(),
            use_label_value: config.use_label_value,
            ignore_label_value: config.ignore_label_value,
            label_conflict: config.label_conflict,
            max_load_retries: config.max_load_retries,
        }
    }

    pub fn cursor(&self) -> &DatasetCursor {
        &self.cursor
    }

    pub fn label_mode(&self) -> LabelMode {
        self.label_mode
    }

    /// `root_folder` is a plain string prefix, not a directory join.
    fn image_path(&self, entry: &Entry) -> PathBuf {
        PathBuf::from(format!("{}{}", self.root_folder, entry.filename))
    }

    fn label_value(&self, group: LabelGroup) -> f32 {
        match group {
            LabelGroup::Use => self.use_label_value,
            LabelGroup::Ignore => self.ignore_label_value,
        }
    }

    /// Shape of the first loadable image at or after the cursor, looking at
    /// each entry at most once. The cursor does not move.
    pub fn probe_shape(&self) -> Result<Option<[i64; 3]>> {
        for offset in 0..self.cursor.len() {
            let Some(entry) = self.cursor.peek_ahead(offset) else {
                break;
            };
            let path = self.image_path(entry);
            match self.decoder.decode(&path, &self.options) {
                Some(image) => return self.transformer.infer_shape(&image).map(Some),
                None => warn!("Could not load {}", path.display()),
            }
        }
        Ok(None)
    }

    /// Decodes the entry under the cursor, skipping unreadable entries.
    ///
    /// On success the cursor still points at the returned entry. Every
    /// failure advances the cursor (wrapping and reshuffling as usual).
    fn load_current(&mut self) -> Result<(Entry, DynamicImage)> {
        ensure!(!self.cursor.is_empty(), "Cannot load images from an empty dataset");

        let mut failures = 0usize;
        loop {
            let entry = self
                .cursor
                .current()
                .cloned()
                .ok_or_else(|| anyhow!("Dataset cursor is out of range"))?;
            let path = self.image_path(&entry);

            if let Some(image) = self.decoder.decode(&path, &self.options) {
                return Ok((entry, image));
            }

            warn!("Could not load {}", path.display());
            failures += 1;
            self.cursor.advance();

            if self.max_load_retries.is_some_and(|max| failures > max) {
                return Err(LoadError::RetriesExhausted {
                    attempts: failures,
                    filename: entry.filename,
                }
                .into());
            }
        }
    }

    /// Writes one entry's labels into its row of the label buffer.
    fn write_labels(&self, entry: &Entry, row: &mut [f32]) -> Result<()> {
        match self.label_mode {
            LabelMode::Single => {
                let label = entry
                    .group(LabelGroup::Use)
                    .first()
                    .ok_or_else(|| anyhow!("Entry '{}' has no label", entry.filename))?;
                row[0] = *label as f32;
            }
            LabelMode::Multi { width } => {
                for group in LabelGroup::ALL {
                    let value = self.label_value(group);
                    for &label_id in entry.group(group) {
                        let cell = row.get_mut(label_id).ok_or_else(|| {
                            anyhow!(
                                "Label {} of '{}' is outside the label width {}",
                                label_id,
                                entry.filename,
                                width
                            )
                        })?;

                        if *cell != 0.0 && *cell != value {
                            match self.label_conflict {
                                LabelConflictPolicy::Overwrite => {}
                                LabelConflictPolicy::Warn => warn!(
                                    "Label {} of '{}' changes from {} to {}",
                                    label_id, entry.filename, *cell, value
                                ),
                                LabelConflictPolicy::Reject => {
                                    return Err(LoadError::LabelConflict {
                                        filename: entry.filename.clone(),
                                        label_id,
                                        current: *cell,
                                        requested: value,
                                    }
                                    .into())
                                }
                            }
                        }
                        *cell = value;
                    }
                }
            }
        }
        Ok(())
    }

    /// Fills `batch` with the next `batch_size` loadable entries.
    ///
    /// The first decoded image fixes `[C, H, W]` for this batch and is reused
    /// for slot 0. Labels are written in one copy at the end; multi-label rows
    /// start from 0.
    pub fn load_batch(&mut self, batch: &mut Batch) -> Result<()> {
        let batch_timer = Instant::now();
        let batch_size = batch.batch_size();
        let width = self.label_mode.width();
        ensure!(
            batch.label_width() == width as i64,
            "Label buffer has {} columns but the dataset needs {}",
            batch.label_width(),
            width
        );

        let mut read_time = Duration::ZERO;
        let mut transform_time = Duration::ZERO;

        let timer = Instant::now();
        let first = self.load_current()?;
        read_time += timer.elapsed();

        let image_shape = self
            .transformer
            .infer_shape(&first.1)
            .with_context(|| format!("Failed to infer the shape of '{}'", first.0.filename))?;
        batch.reshape_data(image_shape)?;

        let mut labels = vec![0f32; batch_size as usize * width];
        let mut pending = Some(first);

        for (item_id, row) in labels.chunks_exact_mut(width).enumerate() {
            let timer = Instant::now();
            let (entry, image) = match pending.take() {
                Some(loaded) => loaded,
                None => self.load_current()?,
            };
            read_time += timer.elapsed();

            let timer = Instant::now();
            let mut slot = batch.data.get(item_id as i64);
            self.transformer
                .transform(image, &mut slot)
                .with_context(|| format!("Failed to transform '{}'", entry.filename))?;
            transform_time += timer.elapsed();

            self.write_labels(&entry, row)?;
            self.cursor.advance();
        }

        let label_tensor = Tensor::from_slice(&labels).reshape(&[batch_size, width as i64]);
        batch
            .label
            .f_copy_(&label_tensor)
            .context("Failed to copy labels into the batch")?;

        debug!("Prefetch batch: {} ms.", batch_timer.elapsed().as_millis());
        debug!("     Read time: {} ms.", read_time.as_millis());
        debug!("Transform time: {} ms.", transform_time.as_millis());
        Ok(())
    }
}
