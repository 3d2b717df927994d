//! Bridge type definitions
//!
//! Option structs and result types shared by every bridge implementation.

use std::time::Duration;
use thiserror::Error;

/// Failure raised by a bridge implementation for any remote command.
///
/// The engine translates these into session-bound errors at the
/// [`Session`](crate::Session)/[`ElementHandle`](crate::ElementHandle)
/// boundary. `NavigationAborted` is its own kind so download triggering can
/// recognize the abort without matching on message text.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The remote end rejected or failed the command
    #[error("remote command failed: {0}")]
    Command(String),
    /// The bridge-enforced deadline for the command elapsed
    #[error("remote command timed out: {0}")]
    Timeout(String),
    /// The page or browser behind this handle is gone
    #[error("target closed: {0}")]
    TargetClosed(String),
    /// In-page navigation was cancelled, typically because a download began
    #[error("navigation aborted: {0}")]
    NavigationAborted(String),
}

impl TransportError {
    /// Create a command failure
    pub fn command<S: Into<String>>(msg: S) -> Self {
        TransportError::Command(msg.into())
    }

    /// Create a timeout failure
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        TransportError::Timeout(msg.into())
    }

    /// Create a target-closed failure
    pub fn target_closed<S: Into<String>>(msg: S) -> Self {
        TransportError::TargetClosed(msg.into())
    }

    /// Create a navigation-aborted failure
    pub fn navigation_aborted<S: Into<String>>(msg: S) -> Self {
        TransportError::NavigationAborted(msg.into())
    }

    /// Whether this failure is an aborted in-page navigation
    pub fn is_navigation_aborted(&self) -> bool {
        matches!(self, TransportError::NavigationAborted(_))
    }
}

/// Navigation completion policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// The load event fired
    #[default]
    Load,
    /// The DOMContentLoaded event fired
    DomContentLoaded,
    /// In-flight network activity stayed below a small threshold for a
    /// stability window
    NetworkIdle,
}

impl WaitUntil {
    /// Protocol-level name of this policy
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitUntil::Load => "load",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::NetworkIdle => "networkidle0",
        }
    }
}

/// Options for navigation commands (goto, reload, wait-for-navigation)
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    /// Completion policy
    pub wait_until: WaitUntil,
    /// Deadline override; `None` uses the bridge default
    pub timeout: Option<Duration>,
}

impl NavigateOptions {
    /// Options waiting for network quiescence
    pub fn network_idle() -> Self {
        NavigateOptions {
            wait_until: WaitUntil::NetworkIdle,
            ..Default::default()
        }
    }
}

/// Condition a selector wait resolves on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// A matching element exists with computed display not `none` and
    /// nonzero rendered height
    Visible,
    /// No visible matching element remains
    Hidden,
}

/// Options for pointer clicks on a remote node
#[derive(Debug, Clone)]
pub struct ClickOptions {
    /// Number of clicks to dispatch (3 selects existing text content)
    pub click_count: u32,
    /// Pause between mouse down and up
    pub delay: Option<Duration>,
}

impl Default for ClickOptions {
    fn default() -> Self {
        ClickOptions {
            click_count: 1,
            delay: None,
        }
    }
}

impl ClickOptions {
    /// Options for a triple click
    pub fn triple() -> Self {
        ClickOptions {
            click_count: 3,
            ..Default::default()
        }
    }
}

/// Options for simulated keystrokes
#[derive(Debug, Clone, Default)]
pub struct TypeOptions {
    /// Pause between individual key events
    pub delay: Option<Duration>,
}

/// Options for closing a page
#[derive(Debug, Clone)]
pub struct CloseOptions {
    /// Run the page's beforeunload/unload handlers
    pub run_before_unload: bool,
}

impl Default for CloseOptions {
    fn default() -> Self {
        CloseOptions {
            run_before_unload: true,
        }
    }
}
