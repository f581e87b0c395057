pub mod core;
pub mod data_transformer;
pub mod vision;

pub use core::{Chain, Transform};
pub use data_transformer::{DataTransformer, PixelTransformer};
