use crate::error::ClientError;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Path answering the verification handshake
pub const VERIFICATION_PATH: &str = "verification";

/// Path accepting frames for detection
pub const DETECT_PATH: &str = "detect";

/// Exact body a detection service returns from the verification path
pub const VERIFICATION_TOKEN: &str = "True";

/// Multipart field, filename and content type of an uploaded frame
pub const IMAGE_FIELD: &str = "image";
pub const IMAGE_FILENAME: &str = "image.jpg";
pub const IMAGE_MIME: &str = "image/jpeg";

/// JSON body of a successful detect call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub image_with_objects: String,
}

/// Annotated frame returned by the detection service
#[derive(Debug, Clone)]
pub struct DetectionResult {
    image_base64: String,
    received_at: DateTime<Utc>,
}

impl DetectionResult {
    /// Wrap base64 JPEG data, rejecting payloads that do not decode
    pub fn from_base64<S: Into<String>>(data: S) -> Result<Self, ClientError> {
        let image_base64 = data.into();
        if image_base64.is_empty() {
            return Err(ClientError::submission("empty image_with_objects"));
        }

        BASE64_ENGINE
            .decode(image_base64.as_bytes())
            .map_err(|e| ClientError::submission(format!("invalid base64 image: {}", e)))?;

        Ok(Self {
            image_base64,
            received_at: Utc::now(),
        })
    }

    /// Base64 payload exactly as the service sent it
    pub fn base64(&self) -> &str {
        &self.image_base64
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// `data:` URI suitable for image views
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", IMAGE_MIME, self.image_base64)
    }

    /// Decoded JPEG bytes
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>, ClientError> {
        BASE64_ENGINE
            .decode(self.image_base64.as_bytes())
            .map_err(|e| ClientError::submission(format!("invalid base64 image: {}", e)))
    }
}
