pub mod batch_loader;
pub mod cursor;
pub mod dataloader;
pub mod dataset;
pub mod error;
pub mod minibatch;
pub mod readers;
pub mod transforms;

pub use batch_loader::BatchLoader;
pub use cursor::DatasetCursor;
pub use dataloader::{ImageDataConfig, ImageDataLayer, LabelConflictPolicy, PrefetchedBatch, TransformConfig};
pub use dataset::{Entry, LabelGroup, LabelMode};
pub use error::{ConfigError, LoadError};
pub use minibatch::Batch;
pub use readers::{Manifest, ManifestParser};
