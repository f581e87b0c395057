//! src/transforms/vision/mod.rs
//!
//! Image stages used by the decoder and the pixel transform engine.
//!
//! ```text
//! transforms/vision/
//! ├── io.rs            → ImageDecoder trait, LoadImage (TurboJPEG + image crate)
//! ├── geometric.rs     → ConvertColor, Resize, Crop
//! ├── augmentation.rs  → RandomHorizontalFlip
//! ├── conversion.rs    → ToTensor (raw 0–255, CHW)
//! └── photometric.rs   → SubtractMean (mean subtraction + scale)
//! ```
//!
//! ```ignore
//! use crate::transforms::Transform;
//! use crate::transforms::vision::{Crop, CropMode, RandomHorizontalFlip, SubtractMean, ToTensor};
//!
//! let pipeline = Crop::new(227, CropMode::Random)?
//!     .then(RandomHorizontalFlip::new(0.5)?)
//!     .then(ToTensor)
//!     .then(SubtractMean::new(&[104.0, 117.0, 123.0], 1.0));
//! ```

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod io;
pub mod photometric;

pub use augmentation::RandomHorizontalFlip;
pub use conversion::{channel_count, ToTensor};
pub use geometric::{ConvertColor, Crop, CropMode, Resize};
pub use io::{DecodeOptions, ImageDecoder, LoadImage};
pub use photometric::SubtractMean;
