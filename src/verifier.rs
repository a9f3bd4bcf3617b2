use crate::client::DetectionApi;
use crate::endpoint::EndpointUrl;
use crate::error::ClientError;
use std::sync::Arc;
use tracing::{debug, info};

/// Confirms a candidate base URL against the detection service before it is used.
///
/// A refused verification and an unreachable service look the same to callers:
/// both come back as [`ClientError::VerificationRejected`].
#[derive(Clone)]
pub struct EndpointVerifier {
    api: Arc<dyn DetectionApi>,
}

impl EndpointVerifier {
    pub fn new(api: Arc<dyn DetectionApi>) -> Self {
        Self { api }
    }

    /// True when the service confirms the candidate
    pub async fn check(&self, candidate: &str) -> bool {
        self.verify(EndpointUrl::candidate(candidate)).await.is_ok()
    }

    /// Verify a candidate, handing back the verified endpoint.
    ///
    /// Blank candidates fail with [`ClientError::EmptyCandidate`] without any
    /// network traffic.
    pub async fn verify(&self, candidate: EndpointUrl) -> Result<EndpointUrl, ClientError> {
        if candidate.is_blank() {
            debug!("Rejecting blank candidate without contacting the service");
            return Err(ClientError::EmptyCandidate);
        }

        if self.api.verify(candidate.as_str()).await {
            info!("Endpoint {} passed verification", candidate);
            Ok(candidate.into_verified())
        } else {
            Err(ClientError::VerificationRejected {
                url: candidate.as_str().to_string(),
            })
        }
    }
}
