use base64::{engine::general_purpose, Engine};
use sha2::{Digest, Sha256};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

const ACCEPTED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Declared types that carry no information about the payload.
const UNKNOWN_MIME_TYPES: [&str; 1] = ["application/octet-stream"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("No image file provided")]
    Missing,
    #[error("empty file")]
    Empty,
    #[error("{:.1}MB exceeds 5MB limit", megabytes(.size_bytes))]
    TooLarge { size_bytes: usize },
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),
}

fn megabytes(size_bytes: &usize) -> f64 {
    *size_bytes as f64 / BYTES_PER_MB
}

/// An image received in a request. Lives only for that request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    bytes: Vec<u8>,
    declared_mime: Option<String>,
    byte_length: usize,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>, declared_mime: Option<String>) -> Self {
        let byte_length = bytes.len();
        Self::with_measured_length(bytes, declared_mime, byte_length)
    }

    /// `byte_length` may exceed `bytes.len()` when the reader stopped buffering at the ceiling.
    pub fn with_measured_length(
        bytes: Vec<u8>,
        declared_mime: Option<String>,
        byte_length: usize,
    ) -> Self {
        Self {
            bytes,
            declared_mime,
            byte_length,
        }
    }

    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Checks run in order: presence, emptiness, size ceiling, declared type.
pub fn validate_upload(image: Option<&UploadedImage>) -> Result<(), UploadError> {
    let image = image.ok_or(UploadError::Missing)?;

    if image.byte_length == 0 {
        return Err(UploadError::Empty);
    }

    if image.byte_length > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size_bytes: image.byte_length,
        });
    }

    if let Some(mime) = image.declared_mime() {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let known = !essence.is_empty() && !UNKNOWN_MIME_TYPES.contains(&essence.as_str());
        if known && !ACCEPTED_MIME_TYPES.contains(&essence.as_str()) {
            return Err(UploadError::UnsupportedType(mime.to_string()));
        }
    }

    Ok(())
}
