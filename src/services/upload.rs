// Upload validation and image metrics
//
// Validates a user-selected file (format, size, name, corruption) and builds
// the immutable UploadedImage the pipeline consumes. Format acceptance is
// decided by sniffing the bytes, not by trusting the file extension.

use std::sync::Arc;

use base64::{engine::general_purpose, Engine};
use image::ImageFormat;
use tracing::debug;
use uuid::Uuid;

use crate::core::config::UploadConfig;
use crate::core::errors::{UploadError, UploadResult};
use crate::core::types::UploadedImage;

const MAX_FILENAME_LEN: usize = 255;

fn accepted(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP
    )
}

fn mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        _ => "image/png",
    }
}

/// Basic type/size/name validation. Returns the sniffed format on success.
pub fn validate_upload(
    filename: &str,
    bytes: &[u8],
    config: &UploadConfig,
) -> UploadResult<ImageFormat> {
    let format = image::guess_format(bytes).map_err(|_| UploadError::UnsupportedFormat)?;
    if !accepted(format) {
        return Err(UploadError::UnsupportedFormat);
    }

    if bytes.len() > config.max_file_size {
        return Err(UploadError::TooLarge {
            size: bytes.len(),
            max_mb: config.max_file_size / (1024 * 1024),
        });
    }

    if filename.chars().count() > MAX_FILENAME_LEN {
        return Err(UploadError::NameTooLong);
    }

    Ok(format)
}

/// Validate a file and build the UploadedImage the pipeline consumes.
///
/// Decoding the image dimensions doubles as the corruption check: bytes that
/// sniff as a supported format but fail to decode are rejected.
pub fn process_upload(
    filename: &str,
    bytes: Vec<u8>,
    config: &UploadConfig,
) -> UploadResult<UploadedImage> {
    let format = validate_upload(filename, &bytes, config)?;

    let (width, height) = image::load_from_memory(&bytes)
        .map(|img| (img.width(), img.height()))
        .map_err(UploadError::Corrupt)?;

    let data_url = format!(
        "data:{};base64,{}",
        mime_type(format),
        general_purpose::STANDARD.encode(&bytes)
    );

    debug!(
        filename,
        width, height, size = bytes.len(), "upload validated"
    );

    Ok(UploadedImage {
        id: Uuid::new_v4(),
        filename: filename.to_string(),
        bytes: Arc::new(bytes),
        data_url,
        width,
        height,
    })
}
