//! src/dataloader/mod.rs
//!
//! The image data layer and the background machinery that feeds it.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │ ImageDataConfig  │ (builder or JSON)
//!                 └────────┬─────────┘
//!                          ↓ setup()
//!                 ┌──────────────────┐
//!                 │ ManifestParser   │ → entries + LabelMode
//!                 └────────┬─────────┘
//!                          ↓
//!                 ┌──────────────────┐
//!                 │ DatasetCursor    │ (shuffle, rand_skip, wraparound)
//!                 └────────┬─────────┘
//!                          ↓ owned by the producer thread
//!   ┌─────────────────────────────────────────────────────┐
//!   │ PrefetchThread                                      │
//!   │   BatchLoader: ImageDecoder → DataTransformer       │
//!   │   free ring ──► load_batch(&mut Batch) ──► full ring │
//!   └──────────────────────────┬──────────────────────────┘
//!                              ↓ next_batch()
//!                     ┌──────────────────┐
//!                     │ PrefetchedBatch  │ (returns its buffer on drop)
//!                     └──────────────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dataloader/
//! ├── mod.rs        # Public API exports + architecture docs
//! ├── config.rs     # ImageDataConfig, builder, JSON loading, validation
//! ├── layer.rs      # ImageDataLayer: setup + next_batch
//! ├── prefetch.rs   # PrefetchThread and PrefetchedBatch (double buffering)
//! └── common/
//!     ├── mod.rs
//!     └── thread.rs # Thread-local transform RNG
//! ```
//!
//! # Memory Usage
//! `prefetch_count x batch_size x C x H x W` floats for image data, plus the
//! label buffers.

mod common;
mod config;
mod layer;
mod prefetch;

pub use common::thread::{init_transform_rng, transform_gen_below, transform_gen_bool, TRANSFORM_RNG};
pub use config::{ImageDataConfig, ImageDataConfigBuilder, LabelConflictPolicy, TransformConfig};
pub use layer::ImageDataLayer;
pub use prefetch::{PrefetchThread, PrefetchedBatch, PREFETCH_THREAD_NAME};
