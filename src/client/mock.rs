use super::{DetectionApi, DetectionResult};
use crate::error::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Scripted detection service for testing without a remote endpoint
pub struct MockDetectionService {
    verify_default: Mutex<bool>,
    verify_delay: Mutex<Duration>,
    submit_queue: Mutex<VecDeque<Result<String, ClientError>>>,
    submit_default: Mutex<Result<String, ClientError>>,
    submit_delay: Mutex<Duration>,
    verify_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    verified_urls: Mutex<Vec<String>>,
    submitted_urls: Mutex<Vec<String>>,
}

impl MockDetectionService {
    /// Service that refuses verification and fails every submission
    pub fn new() -> Self {
        Self {
            verify_default: Mutex::new(false),
            verify_delay: Mutex::new(Duration::ZERO),
            submit_queue: Mutex::new(VecDeque::new()),
            submit_default: Mutex::new(Err(ClientError::submission("no scripted response"))),
            submit_delay: Mutex::new(Duration::ZERO),
            verify_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            verified_urls: Mutex::new(Vec::new()),
            submitted_urls: Mutex::new(Vec::new()),
        }
    }

    /// Service that accepts every verification
    pub fn accepting() -> Self {
        let service = Self::new();
        service.set_verify_result(true);
        service
    }

    pub fn set_verify_result(&self, verified: bool) {
        *self.verify_default.lock() = verified;
    }

    pub fn set_verify_delay(&self, delay: Duration) {
        *self.verify_delay.lock() = delay;
    }

    /// Queue a one-shot detect response
    pub fn push_submit_result(&self, result: Result<String, ClientError>) {
        self.submit_queue.lock().push_back(result);
    }

    /// Response used once the queue is drained
    pub fn set_submit_default(&self, result: Result<String, ClientError>) {
        *self.submit_default.lock() = result;
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock() = delay;
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn verified_urls(&self) -> Vec<String> {
        self.verified_urls.lock().clone()
    }

    pub fn submitted_urls(&self) -> Vec<String> {
        self.submitted_urls.lock().clone()
    }
}

impl Default for MockDetectionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DetectionApi for MockDetectionService {
    async fn verify(&self, base_url: &str) -> bool {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verified_urls.lock().push(base_url.to_string());

        let delay = *self.verify_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let verified = *self.verify_default.lock();
        debug!("Mock verification of {}: {}", base_url, verified);
        verified
    }

    async fn submit_frame(
        &self,
        base_url: &str,
        image: Bytes,
    ) -> Result<DetectionResult, ClientError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted_urls.lock().push(base_url.to_string());
        debug!("Mock submission of {} bytes to {}", image.len(), base_url);

        let delay = *self.submit_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .submit_queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.submit_default.lock().clone());

        scripted.and_then(DetectionResult::from_base64)
    }
}
