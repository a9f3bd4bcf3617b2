use super::{
    BarcodeScanner, CameraPermission, CaptureOptions, FrameCapture, FrameRenderer, Navigator,
    PermissionStatus, RenderFrame,
};
use crate::error::PlatformError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Permission prompt answered from configuration
pub struct StaticPermission {
    granted: bool,
}

impl StaticPermission {
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }
}

#[async_trait]
impl CameraPermission for StaticPermission {
    async fn request_camera_access(&self) -> PermissionStatus {
        if self.granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }
}

/// Camera that cycles through the JPEG files of a directory
pub struct DirectoryCamera {
    dir: PathBuf,
    frames: Mutex<Vec<PathBuf>>,
    next: AtomicUsize,
}

impl DirectoryCamera {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            frames: Mutex::new(Vec::new()),
            next: AtomicUsize::new(0),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    fn is_jpeg(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl FrameCapture for DirectoryCamera {
    async fn wait_ready(&self) -> Result<(), PlatformError> {
        let unavailable = |details: String| PlatformError::CameraUnavailable(details);

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| unavailable(format!("{}: {}", self.dir.display(), e)))?;

        let mut frames = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| unavailable(e.to_string()))?
        {
            let path = entry.path();
            if Self::is_jpeg(&path) {
                frames.push(path);
            }
        }

        if frames.is_empty() {
            return Err(unavailable(format!(
                "no JPEG frames in {}",
                self.dir.display()
            )));
        }

        frames.sort();
        info!(
            "Directory camera ready with {} frames from {}",
            frames.len(),
            self.dir.display()
        );
        *self.frames.lock() = frames;
        Ok(())
    }

    async fn capture_frame(&self, options: CaptureOptions) -> Result<Bytes, PlatformError> {
        let path = {
            let frames = self.frames.lock();
            if frames.is_empty() {
                return Err(PlatformError::CameraUnavailable(
                    "camera not initialized".to_string(),
                ));
            }
            let index = self.next.fetch_add(1, Ordering::Relaxed) % frames.len();
            frames[index].clone()
        };

        debug!(
            "Capturing {} (requested quality {:.2})",
            path.display(),
            options.quality
        );

        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| PlatformError::CameraUnavailable(format!("{}: {}", path.display(), e)))?;

        Ok(Bytes::from(data))
    }
}

/// Renderer that keeps the latest annotated frame on disk
pub struct FileRenderer {
    output_path: PathBuf,
}

impl FileRenderer {
    pub fn new<P: AsRef<Path>>(output_path: P) -> Self {
        Self {
            output_path: output_path.as_ref().to_path_buf(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn write_atomically(&self, data: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.output_path.with_extension("tmp");
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.output_path)
    }
}

impl FrameRenderer for FileRenderer {
    fn render_frame(&self, frame: RenderFrame) -> Result<(), PlatformError> {
        let data = match frame {
            RenderFrame::Placeholder => {
                info!("Waiting for the first detection result");
                return Ok(());
            }
            RenderFrame::Raw(bytes) => bytes.to_vec(),
            RenderFrame::Detection(result) => result
                .jpeg_bytes()
                .map_err(|e| PlatformError::Render(e.to_string()))?,
        };

        self.write_atomically(&data).map_err(|e| {
            PlatformError::Render(format!("{}: {}", self.output_path.display(), e))
        })?;

        debug!(
            "Rendered {} bytes to {}",
            data.len(),
            self.output_path.display()
        );
        Ok(())
    }
}

/// Scanner reading one payload per line from standard input
pub struct StdinScanner {
    started: bool,
}

impl StdinScanner {
    pub fn new() -> Self {
        Self { started: false }
    }
}

impl Default for StdinScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BarcodeScanner for StdinScanner {
    async fn start(&mut self) -> Result<mpsc::Receiver<String>, PlatformError> {
        // stdin cannot be reopened once it reaches EOF
        if self.started {
            return Err(PlatformError::ScannerClosed);
        }
        self.started = true;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Standard input closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read scan from standard input: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Navigator forwarding routes to the application router
pub struct ChannelNavigator {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, route: &str) {
        if self.sender.send(route.to_string()).is_err() {
            warn!("Navigation to {} dropped: router is gone", route);
        }
    }
}
