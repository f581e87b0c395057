pub mod manifest;

pub use manifest::{Manifest, ManifestParser, ManifestSource, ParsedLine};
