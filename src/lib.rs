//! Tiller: session engine for driving a remote browser
//!
//! This library sits between a caller's intent ("click the submit button",
//! "download this URL", "wait until this element appears") and the low-level
//! remote-control primitives of a script-controllable browser. The transport
//! itself is pluggable: implementations of the [`bridge`] traits execute the
//! actual remote commands, while this crate owns session lifecycle, element
//! interaction policy, error translation, and download capture.

pub mod error;
pub mod config;

pub mod bridge;
pub mod registry;
pub mod session;
pub mod element;
pub mod download;

mod scripts;

// Re-exports
pub use error::{DownloadError, Error, Result, SessionError};
pub use config::{LaunchConfig, SessionConfig};
pub use registry::BrowserRegistry;
pub use session::{RequestLogger, Session};
pub use element::ElementHandle;
pub use download::{DownloadedFile, TriggerOutcome};

/// Tiller library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
