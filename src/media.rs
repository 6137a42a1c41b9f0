//! Validated image values and data URI encoding.

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShopVisionError};

/// MIME types Gemini accepts as inline image input.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// An encoded image with a known MIME type.
///
/// The bytes are carried untouched: encoding to a data URI and parsing it back
/// yields the same bytes, so an image can be fed back into either adapter
/// without lossy re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceImage {
    bytes: Bytes,
    mime_type: String,
}

impl SourceImage {
    /// Builds an image from bytes and a declared MIME type.
    pub fn new(bytes: impl Into<Bytes>, mime_type: &str) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ShopVisionError::InvalidImage("image data is empty".into()));
        }
        let mime_type = normalize_mime(mime_type);
        if !SUPPORTED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(ShopVisionError::InvalidImage(format!("unsupported mime type: {mime_type}")));
        }
        Ok(Self { bytes, mime_type })
    }

    /// Builds an image from raw bytes, sniffing the MIME type from magic bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ShopVisionError::InvalidImage("image data is empty".into()));
        }
        let mime = sniff_mime(&bytes)
            .ok_or_else(|| ShopVisionError::InvalidImage("unrecognized image format".into()))?;
        Self::new(bytes, mime)
    }

    /// Parses `data:<mime>;base64,<payload>`. A bare base64 payload is also
    /// accepted, in which case the MIME type is sniffed from the decoded bytes.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        let Some(rest) = uri.strip_prefix("data:") else {
            return Self::from_bytes(decode_base64(uri)?);
        };
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ShopVisionError::InvalidImage("data uri has no payload".into()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| ShopVisionError::InvalidImage("data uri is not base64 encoded".into()))?;
        Self::new(decode_base64(payload)?, mime)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// File extension used when the image is exported.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/heic" => "heic",
            "image/heif" => "heif",
            _ => "png",
        }
    }
}

impl TryFrom<String> for SourceImage {
    type Error = ShopVisionError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_data_uri(&value)
    }
}

impl From<SourceImage> for String {
    fn from(image: SourceImage) -> Self {
        image.to_data_uri()
    }
}

fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ShopVisionError::InvalidImage(format!("invalid base64: {e}")))
}

fn normalize_mime(mime: &str) -> String {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        other => other.to_string(),
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    let mime = ::image::guess_format(bytes).ok()?.to_mime_type();
    SUPPORTED_MIME_TYPES.contains(&mime).then_some(mime)
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Smallest valid-looking PNG header plus padding.
    pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, 0x49, 0x48, 0x44, 0x52];
    pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01];
}
