use sha2::{Digest, Sha256};
use shared::ImageMimeType;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No image was uploaded")]
    MissingImage,
    #[error("Uploaded image is empty")]
    Empty,
    #[error("Image is too large ({size} bytes, limit is {max} bytes)")]
    TooLarge { size: usize, max: usize },
    #[error("Unsupported image type: {0}")]
    UnsupportedMediaType(String),
    #[error("Failed to read upload: {0}")]
    Multipart(String),
}

pub fn image_digest(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

/// Maps a declared content type onto the accepted set. Parameters such as
/// `; charset=...` are ignored.
pub fn accept_mime_type(content_type: &str) -> Result<ImageMimeType, UploadError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ImageMimeType::from_str(&essence)
        .map_err(|_| UploadError::UnsupportedMediaType(content_type.to_string()))
}

pub fn validate_image_size(image_data: &[u8], max: usize) -> Result<(), UploadError> {
    if image_data.is_empty() {
        return Err(UploadError::Empty);
    }
    if image_data.len() > max {
        return Err(UploadError::TooLarge {
            size: image_data.len(),
            max,
        });
    }
    Ok(())
}
