use super::types::{ComponentState, Screen, ShutdownReason};
use crate::capture::CaptureScheduler;
use crate::client::{DetectionApi, DetectionClient};
use crate::config::DetectcamConfig;
use crate::endpoint::EndpointUrl;
use crate::error::Result;
use crate::events::EventBus;
use crate::platform::{
    BarcodeScanner, CameraPermission, DirectoryCamera, FileRenderer, FrameCapture, FrameRenderer,
    StaticPermission, StdinScanner,
};
use crate::scan::ScanInput;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Capacity of the scan input channel
const SCAN_INPUT_CAPACITY: usize = 16;

/// Host collaborators the two screens run against
pub struct PlatformBindings {
    pub api: Arc<dyn DetectionApi>,
    pub permission: Arc<dyn CameraPermission>,
    pub scanner: Box<dyn BarcodeScanner>,
    pub camera: Option<Arc<dyn FrameCapture>>,
    pub renderer: Arc<dyn FrameRenderer>,
}

impl PlatformBindings {
    /// File and console bindings used by the command line binary
    pub fn from_config(config: &DetectcamConfig) -> Result<Self> {
        let client = DetectionClient::new(&config.service)?;

        Ok(Self {
            api: Arc::new(client),
            permission: Arc::new(StaticPermission::new(config.capture.camera_permission)),
            scanner: Box::new(StdinScanner::new()),
            camera: Some(Arc::new(DirectoryCamera::new(&config.capture.frames_dir))),
            renderer: Arc::new(FileRenderer::new(&config.display.output_path)),
        })
    }
}

/// Request a shutdown of a running orchestrator from another task
#[derive(Clone)]
pub struct ShutdownTrigger {
    sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
}

impl ShutdownTrigger {
    /// Returns false when a shutdown was already requested
    pub async fn request(&self, reason: ShutdownReason) -> bool {
        match self.sender.lock().await.take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }
}

/// Drives the scan screen and, once an endpoint is verified, the detection screen
pub struct DetectcamOrchestrator {
    pub(super) config: DetectcamConfig,
    pub(super) event_bus: Arc<EventBus>,

    // Collaborators
    pub(super) api: Arc<dyn DetectionApi>,
    pub(super) permission: Arc<dyn CameraPermission>,
    pub(super) scanner: Option<Box<dyn BarcodeScanner>>,
    pub(super) camera: Option<Arc<dyn FrameCapture>>,
    pub(super) renderer: Arc<dyn FrameRenderer>,

    // Screens
    pub(super) screen: Screen,
    pub(super) manual_url: Option<String>,
    pub(super) input_tx: Option<mpsc::Sender<ScanInput>>,
    pub(super) input_rx: Option<mpsc::Receiver<ScanInput>>,
    pub(super) endpoint: Option<EndpointUrl>,
    pub(super) scheduler: Option<CaptureScheduler>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_trigger: ShutdownTrigger,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl DetectcamOrchestrator {
    /// Create a new orchestrator with the given configuration and collaborators
    pub fn new(config: DetectcamConfig, bindings: PlatformBindings) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let (input_tx, input_rx) = mpsc::channel(SCAN_INPUT_CAPACITY);

        Self {
            config,
            event_bus,
            api: bindings.api,
            permission: bindings.permission,
            scanner: Some(bindings.scanner),
            camera: bindings.camera,
            renderer: bindings.renderer,
            screen: Screen::Scan,
            manual_url: None,
            input_tx: Some(input_tx),
            input_rx: Some(input_rx),
            endpoint: None,
            scheduler: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_trigger: ShutdownTrigger {
                sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            },
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Submit a URL through manual entry as soon as the scan screen opens
    pub fn with_manual_url<S: Into<String>>(mut self, url: S) -> Self {
        self.manual_url = Some(url.into());
        self
    }

    /// Register the components with their initial state
    pub async fn initialize(&self) {
        let mut states = self.component_states.lock().await;
        states.insert("scanner".to_string(), ComponentState::Stopped);
        states.insert("capture".to_string(), ComponentState::Stopped);
        drop(states);

        info!("Detectcam components initialized");
    }

    /// Sender feeding the scan screen, e.g. for a manual-entry front end.
    ///
    /// Scan input stays open while any returned sender is alive.
    pub fn input_sender(&self) -> Option<mpsc::Sender<ScanInput>> {
        self.input_tx.clone()
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown_trigger.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Endpoint verified on the scan screen, once there is one
    pub fn endpoint(&self) -> Option<&EndpointUrl> {
        self.endpoint.as_ref()
    }

    pub fn scheduler(&self) -> Option<&CaptureScheduler> {
        self.scheduler.as_ref()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub(super) async fn set_component_state(&self, component: &str, state: ComponentState) {
        debug!(
            "{} is now {:?} on the {:?} screen",
            component, state, self.screen
        );
        self.component_states
            .lock()
            .await
            .insert(component.to_string(), state);
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    /// Scanner and capture states, keyed by component name
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().await.clone()
    }
}
