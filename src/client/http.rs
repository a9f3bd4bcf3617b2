use super::types::{
    DetectResponse, DetectionResult, DETECT_PATH, IMAGE_FIELD, IMAGE_FILENAME, IMAGE_MIME,
    VERIFICATION_PATH, VERIFICATION_TOKEN,
};
use super::DetectionApi;
use crate::config::ServiceConfig;
use crate::endpoint::join_url;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info, warn};

/// HTTP transport to a remote detection service.
///
/// Holds nothing but the pooled `reqwest` client; every call takes the base
/// address it talks to.
#[derive(Clone)]
pub struct DetectionClient {
    http: Client,
}

impl DetectionClient {
    /// Create a client with the configured timeouts
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        info!(
            "Detection client ready (request timeout {:?}, connect timeout {:?})",
            config.request_timeout(),
            config.connect_timeout()
        );

        Ok(Self { http })
    }

    /// Use an already configured `reqwest` client
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    async fn fetch_verification(&self, url: &str) -> std::result::Result<bool, reqwest::Error> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Verification request to {} answered {}", url, status);
            return Ok(false);
        }

        let body = response.text().await?;
        debug!("Verification body from {}: {:?}", url, body);
        Ok(body == VERIFICATION_TOKEN)
    }

    async fn post_frame(
        &self,
        url: &str,
        image: Bytes,
    ) -> std::result::Result<DetectResponse, ClientError> {
        let part = Part::bytes(image.to_vec())
            .file_name(IMAGE_FILENAME)
            .mime_str(IMAGE_MIME)
            .map_err(|e| submission_error(url, e))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| submission_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::submission(format!(
                "{} answered {}",
                url, status
            )));
        }

        response
            .json::<DetectResponse>()
            .await
            .map_err(|e| submission_error(url, e))
    }
}

fn submission_error(url: &str, e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::submission(format!("request to {} timed out", url))
    } else {
        ClientError::submission(e.to_string())
    }
}

#[async_trait]
impl DetectionApi for DetectionClient {
    async fn verify(&self, base_url: &str) -> bool {
        let url = join_url(base_url, VERIFICATION_PATH);

        match self.fetch_verification(&url).await {
            Ok(verified) => verified,
            Err(e) => {
                warn!("Verification request to {} failed: {}", url, e);
                false
            }
        }
    }

    async fn submit_frame(
        &self,
        base_url: &str,
        image: Bytes,
    ) -> std::result::Result<DetectionResult, ClientError> {
        let url = join_url(base_url, DETECT_PATH);
        debug!("Submitting {} byte frame to {}", image.len(), url);

        let response = self.post_frame(&url, image).await?;

        DetectionResult::from_base64(response.image_with_objects)
    }
}
