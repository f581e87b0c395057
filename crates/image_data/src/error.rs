//! Error types for the image data layer.
//!
//! Two families:
//! - [`ConfigError`]: fatal problems detected while setting the layer up. They
//!   abort initialization before any batch is produced.
//! - [`LoadError`]: problems during steady-state batch production. Unreadable
//!   images are never errors (they are skipped); these variants only exist
//!   behind the opt-in `max_load_retries` and `label_conflict = reject` knobs.
//!
//! Public functions return `anyhow::Result`, so match on a variant with
//! `err.downcast_ref::<ConfigError>()`.

use thiserror::Error;

/// Fatal configuration errors raised at setup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// `source` was left empty.
    #[error("No manifest source configured")]
    MissingSource,

    /// Only one of `new_height` / `new_width` was set.
    #[error(
        "new_height and new_width must be set at the same time (got {height}x{width})"
    )]
    InconsistentResize { height: u32, width: u32 },

    /// Both label separators are the same character.
    #[error("The label separator and the label list separator may not be the same ('{0}')")]
    SameSeparators(char),

    #[error("Positive batch size required")]
    NonPositiveBatchSize,

    #[error("Prefetch count must be > 0")]
    ZeroPrefetchCount,

    #[error("Batch timeout must be > 0 ms")]
    ZeroTimeout,

    /// The multi-label sentinels collide with each other or with the 0 default.
    #[error("Label values must be non-zero and distinct (use={use_value}, ignore={ignore_value})")]
    InvalidLabelValues { use_value: f32, ignore_value: f32 },

    #[error("Not enough points to skip: rand_skip={rand_skip}, dataset size={dataset_size}")]
    NotEnoughPointsToSkip {
        rand_skip: usize,
        dataset_size: usize,
    },

    #[error("Manifest {path} contains no entries")]
    EmptyDataset { path: String },

    #[error("None of the {num_entries} entries in {path} could be loaded")]
    NoLoadableImage { path: String, num_entries: usize },

    /// Single-label datasets need exactly one label on every line.
    #[error("Entry '{filename}' on line {line} has no label")]
    MissingLabel { filename: String, line: usize },
}

/// Errors surfaced while producing batches.
#[derive(Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("Gave up after {attempts} consecutive unreadable images (last: {filename})")]
    RetriesExhausted { attempts: usize, filename: String },

    #[error(
        "Label {label_id} of '{filename}' is already set to {current}, refusing to overwrite it with {requested}"
    )]
    LabelConflict {
        filename: String,
        label_id: usize,
        current: f32,
        requested: f32,
    },
}
