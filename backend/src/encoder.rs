use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use shared::ImageMimeType;
use std::io::Read;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Failed to read image: {0}")]
    Read(#[from] std::io::Error),
}

/// Base64 image data plus its declared MIME type, ready to inline in a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPayload {
    pub data: String,
    pub mime_type: ImageMimeType,
}

impl TransportPayload {
    pub fn encoded_len(&self) -> usize {
        self.data.len()
    }
}

/// Reads the whole source and encodes it. No format sniffing or size checks.
pub fn encode<R: Read>(mut reader: R, mime_type: ImageMimeType) -> Result<TransportPayload, EncodingError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(encode_bytes(&bytes, mime_type))
}

pub fn encode_bytes(bytes: &[u8], mime_type: ImageMimeType) -> TransportPayload {
    TransportPayload {
        data: STANDARD.encode(bytes),
        mime_type,
    }
}

pub fn encode_file(path: impl AsRef<Path>, mime_type: ImageMimeType) -> Result<TransportPayload, EncodingError> {
    let file = std::fs::File::open(path)?;
    encode(file, mime_type)
}
