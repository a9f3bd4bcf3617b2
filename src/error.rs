use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Detection client error: {0}")]
    Client(#[from] ClientError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid route: {route}")]
    Route { route: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl DetectcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures of the verification and capture flows.
///
/// None of these are fatal: the scan coordinator turns the first two into an
/// input-error indicator, the capture scheduler logs the last two and keeps the
/// previously displayed result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Endpoint {url} rejected verification")]
    VerificationRejected { url: String },

    #[error("Candidate URL is empty")]
    EmptyCandidate,

    #[error("Frame capture failed: {details}")]
    CaptureFailure { details: String },

    #[error("Frame submission failed: {details}")]
    SubmissionFailure { details: String },
}

impl ClientError {
    pub fn capture<S: Into<String>>(details: S) -> Self {
        Self::CaptureFailure {
            details: details.into(),
        }
    }

    pub fn submission<S: Into<String>>(details: S) -> Self {
        Self::SubmissionFailure {
            details: details.into(),
        }
    }
}

/// Errors reported by platform collaborators (camera, scanner, renderer)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Camera not available: {0}")]
    CameraUnavailable(String),

    #[error("Barcode scanner error: {0}")]
    Scanner(String),

    #[error("Barcode scanner closed")]
    ScannerClosed,

    #[error("Render error: {0}")]
    Render(String),
}

impl PlatformError {
    /// Whether retrying the collaborator may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlatformError::CameraUnavailable(_)
                | PlatformError::Scanner(_)
                | PlatformError::Render(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DetectcamError>;
