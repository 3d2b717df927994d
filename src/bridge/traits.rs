//! Control-bridge trait definitions
//!
//! These traits are the seam between the session engine and whatever
//! transport actually speaks to the browser. The engine only ever holds
//! `Arc<dyn …>` values; production transports and the in-tree mock both
//! implement the same contracts.
//!
//! Scripts passed to [`RemotePage::evaluate`] are full page-context
//! expressions. Scripts passed to [`RemoteNode::evaluate`] and
//! [`RemoteNode::evaluate_handle`] are function bodies executed with the
//! node bound as `elem`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bridge::types::{
    ClickOptions, CloseOptions, NavigateOptions, TransportError, TypeOptions, WaitCondition,
};
use crate::config::LaunchConfig;

/// Launches browser processes.
///
/// Implementations own process spawning and the initial protocol handshake.
/// The registry holds one of these and calls it at most once per lifetime.
#[async_trait]
pub trait Launcher: Send + Sync + std::fmt::Debug {
    /// Start a browser process configured per `config`
    async fn launch(&self, config: &LaunchConfig) -> Result<Arc<dyn Browser>, TransportError>;
}

/// A handle to one running browser process.
#[async_trait]
pub trait Browser: Send + Sync + std::fmt::Debug {
    /// Open a new page (tab) in this browser
    async fn new_page(&self) -> Result<Arc<dyn RemotePage>, TransportError>;

    /// Terminate the underlying process
    async fn close(&self) -> Result<(), TransportError>;

    /// Whether the process is still running
    fn is_alive(&self) -> bool;
}

/// A handle to one remote page.
#[async_trait]
pub trait RemotePage: Send + Sync + std::fmt::Debug {
    /// Current page URL
    fn url(&self) -> String;

    /// Navigate to `url`, resolving per the completion policy in `options`
    async fn goto(&self, url: &str, options: &NavigateOptions) -> Result<(), TransportError>;

    /// Reload the current page
    async fn reload(&self, options: &NavigateOptions) -> Result<(), TransportError>;

    /// Resolve once an in-flight navigation completes
    async fn wait_for_navigation(&self, options: &NavigateOptions) -> Result<(), TransportError>;

    /// Resize the viewport
    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), TransportError>;

    /// Evaluate a page-context expression and return its JSON value.
    ///
    /// A returned promise is awaited; the resolved value is what comes back.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, TransportError>;

    /// Find the first match for a CSS selector
    async fn query_selector(
        &self,
        selector: &str,
    ) -> Result<Option<Arc<dyn RemoteNode>>, TransportError>;

    /// Find all matches for a CSS selector
    async fn query_selector_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Arc<dyn RemoteNode>>, TransportError>;

    /// Block until a match satisfies `condition`.
    ///
    /// Resolves with the matching node for [`WaitCondition::Visible`] and
    /// with `None` for [`WaitCondition::Hidden`]. The deadline is whatever
    /// the bridge enforces; elapsing it is a [`TransportError::Timeout`].
    async fn wait_for_selector(
        &self,
        selector: &str,
        condition: WaitCondition,
    ) -> Result<Option<Arc<dyn RemoteNode>>, TransportError>;

    /// Capture a full-viewport PNG screenshot into `path`
    async fn screenshot(&self, path: &Path) -> Result<(), TransportError>;

    /// Send keystrokes to whatever currently has focus
    async fn type_text(&self, text: &str, options: &TypeOptions) -> Result<(), TransportError>;

    /// Send a raw protocol command addressed to this page
    async fn send_raw_command(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError>;

    /// Close this page
    async fn close(&self, options: &CloseOptions) -> Result<(), TransportError>;
}

/// A reference to one DOM node within a page.
#[async_trait]
pub trait RemoteNode: Send + Sync + std::fmt::Debug {
    /// Dispatch real pointer clicks on this node
    async fn click(&self, options: &ClickOptions) -> Result<(), TransportError>;

    /// Simulate keystrokes into this node
    async fn type_text(&self, text: &str, options: &TypeOptions) -> Result<(), TransportError>;

    /// Give this node input focus
    async fn focus(&self) -> Result<(), TransportError>;

    /// Select options on a selection element; returns the values actually
    /// selected
    async fn select(&self, values: &[String]) -> Result<Vec<String>, TransportError>;

    /// Attach files to a file-input element
    async fn set_files(&self, paths: &[PathBuf]) -> Result<(), TransportError>;

    /// Read a named property as its JSON value
    async fn property(&self, name: &str) -> Result<serde_json::Value, TransportError>;

    /// Evaluate a function body with this node bound as `elem`
    async fn evaluate(&self, body: &str) -> Result<serde_json::Value, TransportError>;

    /// Evaluate a function body expected to return a DOM node, or nothing
    async fn evaluate_handle(
        &self,
        body: &str,
    ) -> Result<Option<Arc<dyn RemoteNode>>, TransportError>;

    /// Find the first subtree match for a CSS selector
    async fn query_selector(
        &self,
        selector: &str,
    ) -> Result<Option<Arc<dyn RemoteNode>>, TransportError>;

    /// Find all subtree matches for a CSS selector
    async fn query_selector_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Arc<dyn RemoteNode>>, TransportError>;
}
