use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode {format} image: {message}")]
    Encode { format: ImageFormat, message: String },

    #[error("Image worker aborted: {0}")]
    Aborted(String),
}

/// How an image is fitted into the target edge.
///
/// `FillSquare` scales the image to cover a square and crops the overflow around the center.
/// `Uniform` keeps the aspect ratio and scales the longer side to the target edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    #[default]
    FillSquare,
    Uniform,
}

impl fmt::Display for CropMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropMode::FillSquare => f.write_str("FillSquare"),
            CropMode::Uniform => f.write_str("Uniform"),
        }
    }
}

impl FromStr for CropMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "fillsquare" | "fill_square" | "fill-square" => Ok(CropMode::FillSquare),
            "uniform" => Ok(CropMode::Uniform),
            _ => Err(format!(
                "Unsupported mode: {}. Must be one of the following: FillSquare, Uniform",
                value
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Jpeg => f.write_str("JPEG"),
            ImageFormat::Png => f.write_str("PNG"),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            _ => Err(format!(
                "Unsupported format: {}. Must be one of the following: Jpeg, Png",
                value
            )),
        }
    }
}

const JPEG_QUALITY: u8 = 85;

/// Decode `image_data`, fit it into `resize` (mode and target edge) when given, and encode
/// the result as `format`.
///
/// Without a resize the pixels are re-encoded as-is, so the output is always in `format`
/// even when the source already was.
pub fn transform(
    image_data: &[u8],
    resize: Option<(CropMode, u32)>,
    format: ImageFormat,
) -> Result<Vec<u8>, TransformError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| TransformError::Decode(e.to_string()))?;

    let img = match resize {
        Some((mode, edge)) => resize_image(img, mode, edge),
        None => img,
    };

    encode_image(img, format)
}

fn resize_image(img: DynamicImage, mode: CropMode, edge: u32) -> DynamicImage {
    match mode {
        // Cover the square, then crop the longer axis around the center
        CropMode::FillSquare => img.resize_to_fill(edge, edge, FilterType::Lanczos3),
        CropMode::Uniform => img.resize(edge, edge, FilterType::Lanczos3),
    }
}

fn encode_image(img: DynamicImage, format: ImageFormat) -> Result<Vec<u8>, TransformError> {
    let mut output = Vec::new();
    let encode_error = |e: image::ImageError| TransformError::Encode {
        format,
        message: e.to_string(),
    };

    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY);
            encoder.encode_image(&rgb).map_err(encode_error)?;
        }
        ImageFormat::Png => {
            img.write_to(&mut Cursor::new(&mut output), image::ImageOutputFormat::Png)
                .map_err(encode_error)?;
        }
    }

    Ok(output)
}
