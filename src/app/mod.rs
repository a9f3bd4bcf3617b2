mod orchestrator;
mod runtime;
mod screens;
mod shutdown;
mod types;


pub use orchestrator::{DetectcamOrchestrator, PlatformBindings, ShutdownTrigger};
pub use types::{ComponentState, Screen, ShutdownReason};
