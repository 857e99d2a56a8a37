//! Portal Core - shared infrastructure for the session and access layer
//!
//! Error types, logging bootstrap, configuration, clock sources, the task
//! scheduler and the value types every other crate speaks.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{NavigationConfig, PortalConfig, SessionConfig};
pub use error::{ErrorContext, PortalError, PortalResult};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use scheduler::{spawn_interval, spawn_task, with_timeout, TaskHandle};
pub use types::{PermissionSet, Role};

// Re-export commonly used external types
pub use tokio;
pub use tracing;
