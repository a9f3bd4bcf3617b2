mod http;
mod mock;
mod types;

pub use http::DetectionClient;
pub use mock::MockDetectionService;
pub use types::{
    DetectResponse, DetectionResult, DETECT_PATH, IMAGE_FIELD, IMAGE_FILENAME, IMAGE_MIME,
    VERIFICATION_PATH, VERIFICATION_TOKEN,
};

use crate::error::ClientError;
use async_trait::async_trait;
use bytes::Bytes;

/// Calls a detection service makes available to the verifier and the scheduler
#[async_trait]
pub trait DetectionApi: Send + Sync {
    /// True only when `{base_url}/verification` answers exactly `True`.
    /// Transport failures also read as false.
    async fn verify(&self, base_url: &str) -> bool;

    /// Upload one JPEG frame to `{base_url}/detect`
    async fn submit_frame(&self, base_url: &str, image: Bytes)
        -> Result<DetectionResult, ClientError>;
}
