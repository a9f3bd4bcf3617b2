use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectcamConfig {
    pub service: ServiceConfig,
    pub scanner: ScannerConfig,
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Total timeout for a single request to the detection service
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScannerConfig {
    /// Delay after a rejected scan before new candidates are accepted
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Base delay before restarting a stopped barcode scanner
    #[serde(default = "default_restart_base_delay_ms")]
    pub restart_base_delay_ms: u64,

    /// Upper bound for the scanner restart delay
    #[serde(default = "default_restart_max_delay_ms")]
    pub restart_max_delay_ms: u64,

    /// Scanner restarts attempted before giving up on scanning
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Period between capture cycles
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Capture quality requested from the camera (0.0 - 1.0]
    #[serde(default = "default_quality")]
    pub quality: f32,

    /// Directory of JPEG frames used by the file-backed camera
    #[serde(default = "default_frames_dir")]
    pub frames_dir: String,

    /// Whether the file-backed platform grants camera access
    #[serde(default = "default_camera_permission")]
    pub camera_permission: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayConfig {
    /// Where the file renderer writes the latest annotated frame
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl ScannerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl CaptureConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl DetectcamConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("service.request_timeout_secs", default_request_timeout())?
            .set_default("service.connect_timeout_secs", default_connect_timeout())?
            .set_default("scanner.cooldown_ms", default_cooldown_ms())?
            .set_default(
                "scanner.restart_base_delay_ms",
                default_restart_base_delay_ms(),
            )?
            .set_default("scanner.restart_max_delay_ms", default_restart_max_delay_ms())?
            .set_default("scanner.max_restarts", default_max_restarts())?
            .set_default("capture.interval_ms", default_interval_ms())?
            .set_default("capture.quality", default_quality() as f64)?
            .set_default("capture.frames_dir", default_frames_dir())?
            .set_default("capture.camera_permission", default_camera_permission())?
            .set_default("display.output_path", default_output_path())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // DETECTCAM_CAPTURE__INTERVAL_MS=2500
            .add_source(
                Environment::with_prefix("DETECTCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: DetectcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Service request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.service.connect_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Service connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.scanner.cooldown_ms == 0 {
            return Err(ConfigError::Message(
                "Scanner cooldown_ms must be greater than 0".to_string(),
            ));
        }

        if self.scanner.restart_base_delay_ms > self.scanner.restart_max_delay_ms {
            return Err(ConfigError::Message(
                "Scanner restart_base_delay_ms must not exceed restart_max_delay_ms".to_string(),
            ));
        }

        if self.capture.interval_ms == 0 {
            return Err(ConfigError::Message(
                "Capture interval_ms must be greater than 0".to_string(),
            ));
        }

        if !(self.capture.quality > 0.0 && self.capture.quality <= 1.0) {
            return Err(ConfigError::Message(
                "Capture quality must be within (0.0, 1.0]".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for DetectcamConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                request_timeout_secs: default_request_timeout(),
                connect_timeout_secs: default_connect_timeout(),
            },
            scanner: ScannerConfig {
                cooldown_ms: default_cooldown_ms(),
                restart_base_delay_ms: default_restart_base_delay_ms(),
                restart_max_delay_ms: default_restart_max_delay_ms(),
                max_restarts: default_max_restarts(),
            },
            capture: CaptureConfig {
                interval_ms: default_interval_ms(),
                quality: default_quality(),
                frames_dir: default_frames_dir(),
                camera_permission: default_camera_permission(),
            },
            display: DisplayConfig {
                output_path: default_output_path(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_request_timeout() -> u64 {
    10
}
fn default_connect_timeout() -> u64 {
    5
}

fn default_cooldown_ms() -> u64 {
    2000
}
fn default_restart_base_delay_ms() -> u64 {
    500
}
fn default_restart_max_delay_ms() -> u64 {
    10_000
}
fn default_max_restarts() -> u32 {
    5
}

fn default_interval_ms() -> u64 {
    5000
}
fn default_quality() -> f32 {
    0.5
}
fn default_frames_dir() -> String {
    "./frames".to_string()
}
fn default_camera_permission() -> bool {
    true
}

fn default_output_path() -> String {
    "./detections/latest.jpg".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}
