use super::{
    BarcodeScanner, CameraPermission, CaptureOptions, FrameCapture, FrameRenderer, Navigator,
    PermissionStatus, RenderFrame,
};
use crate::error::PlatformError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Permission prompt with a fixed answer
pub struct MockPermission {
    status: PermissionStatus,
    requests: AtomicUsize,
}

impl MockPermission {
    pub fn new(status: PermissionStatus) -> Self {
        Self {
            status,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraPermission for MockPermission {
    async fn request_camera_access(&self) -> PermissionStatus {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.status
    }
}

/// Camera whose readiness and failures are driven by the test
pub struct MockCamera {
    ready: watch::Sender<bool>,
    failing: AtomicBool,
    frame: Bytes,
    captures: AtomicUsize,
    last_options: Mutex<Option<CaptureOptions>>,
}

impl MockCamera {
    /// Camera that is not ready yet
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            ready,
            failing: AtomicBool::new(false),
            frame: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9]),
            captures: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    /// Camera that is ready immediately
    pub fn ready() -> Self {
        let camera = Self::new();
        camera.set_ready();
        camera
    }

    pub fn set_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<CaptureOptions> {
        *self.last_options.lock()
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameCapture for MockCamera {
    async fn wait_ready(&self) -> Result<(), PlatformError> {
        let mut ready = self.ready.subscribe();
        ready
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| PlatformError::CameraUnavailable("mock camera dropped".to_string()))
    }

    async fn capture_frame(&self, options: CaptureOptions) -> Result<Bytes, PlatformError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options);

        if self.failing.load(Ordering::SeqCst) {
            return Err(PlatformError::CameraUnavailable(
                "mock capture failure".to_string(),
            ));
        }

        Ok(self.frame.clone())
    }
}

/// Scanner replaying scripted scan streams, one per `start`
pub struct MockScanner {
    sessions: VecDeque<Result<Vec<String>, PlatformError>>,
    starts: usize,
}

impl MockScanner {
    pub fn new() -> Self {
        Self {
            sessions: VecDeque::new(),
            starts: 0,
        }
    }

    /// Queue a stream that yields `payloads` and then ends
    pub fn with_session<I, S>(mut self, payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sessions
            .push_back(Ok(payloads.into_iter().map(Into::into).collect()));
        self
    }

    /// Queue a failed start
    pub fn with_failure(mut self, error: PlatformError) -> Self {
        self.sessions.push_back(Err(error));
        self
    }

    pub fn starts(&self) -> usize {
        self.starts
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BarcodeScanner for MockScanner {
    async fn start(&mut self) -> Result<mpsc::Receiver<String>, PlatformError> {
        self.starts += 1;

        let payloads = self
            .sessions
            .pop_front()
            .unwrap_or(Err(PlatformError::ScannerClosed))?;

        debug!("Mock scanner session with {} payloads", payloads.len());
        let (tx, rx) = mpsc::channel(payloads.len().max(1));
        for payload in payloads {
            let _ = tx.try_send(payload);
        }

        Ok(rx)
    }
}

/// Navigator that records every requested route
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
        }
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().clone()
    }
}

impl Default for RecordingNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().push(route.to_string());
    }
}

/// Renderer that records every frame it is asked to show
pub struct RecordingRenderer {
    frames: Mutex<Vec<RenderFrame>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
        }
    }

    pub fn frames(&self) -> Vec<RenderFrame> {
        self.frames.lock().clone()
    }

    /// Base64 payloads of the detection frames rendered so far
    pub fn detections(&self) -> Vec<String> {
        self.frames
            .lock()
            .iter()
            .filter_map(|frame| match frame {
                RenderFrame::Detection(result) => Some(result.base64().to_string()),
                _ => None,
            })
            .collect()
    }
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer for RecordingRenderer {
    fn render_frame(&self, frame: RenderFrame) -> Result<(), PlatformError> {
        self.frames.lock().push(frame);
        Ok(())
    }
}
