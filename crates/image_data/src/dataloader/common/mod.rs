//! src/dataloader/common/mod.rs
//!
//! Utilities shared by the prefetch thread and the transforms it runs.

pub mod thread;
