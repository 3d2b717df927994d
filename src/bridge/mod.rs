//! # Control bridge layer
//!
//! The seam between the session engine and the remote-control transport.
//! The engine consumes browsers, pages, and nodes exclusively through the
//! traits defined here; which protocol actually carries the commands is an
//! integration concern.
//!
//! ## Module structure
//! - `traits`: the `Launcher`/`Browser`/`RemotePage`/`RemoteNode` contracts
//! - `types`: option structs, wait policies, and the transport error
//! - `mock`: scriptable in-memory implementations for tests
//!
//! ## Usage
//! ```rust,no_run
//! use tiller::bridge::mock::MockLauncher;
//! use tiller::{BrowserRegistry, LaunchConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> tiller::Result<()> {
//! let registry = Arc::new(BrowserRegistry::new(Arc::new(MockLauncher::new())));
//! let browser = registry.acquire(&LaunchConfig::default()).await?;
//! assert!(browser.is_alive());
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod types;
pub mod mock;

pub use traits::{Browser, Launcher, RemoteNode, RemotePage};
pub use types::{
    ClickOptions, CloseOptions, NavigateOptions, TransportError, TypeOptions, WaitCondition,
    WaitUntil,
};
