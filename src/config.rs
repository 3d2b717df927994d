//! Launch and session configuration
//!
//! Plain option structs handed to the registry and to `Session::create`.
//! Wiring them from CLI arguments or the environment is the caller's job.

use std::path::PathBuf;
use std::time::Duration;

use crate::session::RequestLogger;

/// Configuration for launching the shared browser process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    /// Run without a visible UI
    pub headless: bool,

    /// Artificial delay inserted before each browser action, making
    /// interactions observable in a visible browser
    pub slow_motion: Option<Duration>,

    /// Keep the browser sandbox enabled
    pub sandbox: bool,

    /// Explicit browser binary; `None` lets the launcher pick
    pub executable_path: Option<PathBuf>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        LaunchConfig {
            headless: true,
            slow_motion: None,
            sandbox: true,
            executable_path: None,
        }
    }
}

impl LaunchConfig {
    /// Debug profile: visible UI, 10 ms slow motion, sandbox disabled
    pub fn debug() -> Self {
        LaunchConfig {
            headless: false,
            slow_motion: Some(Duration::from_millis(10)),
            sandbox: false,
            executable_path: None,
        }
    }

    /// Set an explicit browser binary
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }
}

/// Configuration for creating a session.
#[derive(Clone, Default)]
pub struct SessionConfig {
    /// Launch configuration used if this session is the one that starts the
    /// shared process
    pub launch: LaunchConfig,

    /// Request logger invoked after every logged navigation
    pub logger: Option<RequestLogger>,
}

impl SessionConfig {
    /// Session over a debug-profile browser
    pub fn debug() -> Self {
        SessionConfig {
            launch: LaunchConfig::debug(),
            logger: None,
        }
    }

    /// Attach a request logger
    pub fn with_logger(mut self, logger: RequestLogger) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("launch", &self.launch)
            .field("logger", &self.logger.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
