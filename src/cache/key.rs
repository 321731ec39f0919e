use std::path::PathBuf;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::images::{CropMode, ImageFormat};

/// File stem reserved for the unresized original. Derivative stems always carry a
/// parenthesised mode, so no size label can produce it.
pub const ORIGINAL_STEM: &str = "originalImage";

/// Longest directory name a namespace key is split into. Stays below the usual
/// 255-byte file name limit.
pub const SEGMENT_LEN: usize = 200;

/// Last directory of every namespace. Not in the base64url alphabet, so a key that is a
/// segment-prefix of another key never nests one namespace inside the other.
pub const NAMESPACE_TERMINATOR: &str = "@";

/// Encode a source identifier into a filesystem-safe key.
///
/// URL-safe base64 of the UTF-8 bytes: reversible, so distinct sources never share a
/// namespace, and free of `/` and `+`.
pub fn encode_source(source: &str) -> String {
    URL_SAFE_NO_PAD.encode(source.as_bytes())
}

/// Relative directory of the namespace for `key`: the key in segments of at most
/// [`SEGMENT_LEN`] bytes, followed by [`NAMESPACE_TERMINATOR`].
pub fn namespace_dir(key: &str) -> PathBuf {
    let mut dir: PathBuf = key
        .as_bytes()
        .chunks(SEGMENT_LEN)
        .map(|segment| String::from_utf8_lossy(segment).into_owned())
        .collect();
    dir.push(NAMESPACE_TERMINATOR);
    dir
}

/// Name of the cache file for one derivative inside a source namespace, e.g.
/// `small(FillSquare).jpg` or `originalImage.png`.
pub fn file_name(size: Option<&str>, mode: CropMode, format: ImageFormat) -> String {
    match size.filter(|s| !s.is_empty()) {
        Some(size) => format!("{}({}).{}", size, mode, format.extension()),
        None => format!("{}.{}", ORIGINAL_STEM, format.extension()),
    }
}
