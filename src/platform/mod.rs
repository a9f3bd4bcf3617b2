//! Seams to the host platform: permission prompts, the camera preview, the
//! barcode scanner, screen navigation and the image view.

mod file;
mod mock;

pub use file::{ChannelNavigator, DirectoryCamera, FileRenderer, StaticPermission, StdinScanner};
pub use mock::{MockCamera, MockPermission, MockScanner, RecordingNavigator, RecordingRenderer};

use crate::client::DetectionResult;
use crate::error::PlatformError;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Answer to a camera permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

#[async_trait]
pub trait CameraPermission: Send + Sync {
    async fn request_camera_access(&self) -> PermissionStatus;
}

/// Options passed to the camera for a single still
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Compression quality in (0.0, 1.0]
    pub quality: f32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self { quality: 0.5 }
    }
}

#[async_trait]
pub trait FrameCapture: Send + Sync {
    /// Resolves once the camera preview is initialized
    async fn wait_ready(&self) -> Result<(), PlatformError>;

    /// Take one compressed JPEG still
    async fn capture_frame(&self, options: CaptureOptions) -> Result<Bytes, PlatformError>;
}

/// Source of raw barcode payloads.
///
/// Each `start` opens a new scan stream; once a stream ends the scanner may be
/// started again.
#[async_trait]
pub trait BarcodeScanner: Send + Sync {
    async fn start(&mut self) -> Result<mpsc::Receiver<String>, PlatformError>;
}

pub trait Navigator: Send + Sync {
    /// Switch screens, e.g. to `ObjectDetection?url=http://h`
    fn navigate(&self, route: &str);
}

/// What the image view should show
#[derive(Debug, Clone)]
pub enum RenderFrame {
    /// Nothing detected yet
    Placeholder,
    /// Raw JPEG bytes
    Raw(Bytes),
    /// Annotated frame from the detection service
    Detection(DetectionResult),
}

pub trait FrameRenderer: Send + Sync {
    fn render_frame(&self, frame: RenderFrame) -> Result<(), PlatformError>;
}
