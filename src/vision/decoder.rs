//! Turns inbound image payloads into RGB pixel buffers.

use base64::Engine;
use image::RgbImage;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Image payload is empty")]
    Empty,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Decodes a base64 image, accepting both bare base64 and `data:` URLs.
pub fn decode_base64_image(payload: &str) -> Result<RgbImage, DecodeError> {
    let encoded = match payload.split_once(',') {
        Some((_prefix, data)) => data,
        None => payload,
    };
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    decode_image_bytes(&bytes)
}

/// Decodes raw image file bytes (PNG, JPEG, ...) into a 3-channel RGB buffer.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Some(kind) = infer::get(bytes) {
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(DecodeError::UnsupportedFileType(
                kind.mime_type().to_string(),
            ));
        }
        debug!("Decoding {} image ({} bytes)", kind.mime_type(), bytes.len());
    }

    let decoded = image::load_from_memory(bytes)?;
    Ok(decoded.to_rgb8())
}
