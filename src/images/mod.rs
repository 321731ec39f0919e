pub mod source;
pub mod tools;

pub use source::{FetchError, HttpSourceFetcher, SourceFetcher};
pub use tools::{transform, CropMode, ImageFormat, TransformError};
