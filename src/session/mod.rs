//! # Session layer
//!
//! A [`Session`] owns one page within the shared browser process and is the
//! caller's whole interface to it: navigation, querying, waiting, in-page
//! evaluation, and the request-logging side channel. Element interaction
//! lives on [`ElementHandle`](crate::ElementHandle)s produced by the query
//! methods; download capture is layered on in [`crate::download`].
//!
//! ## Module structure
//! - `logging`: the request-logging side channel and logger contract
//! - `console`: the interactive command loop for live debugging
//!
//! ## Error contract
//! Every interactive operation translates bridge failures into a
//! session-bound [`SessionError`](crate::SessionError). Best-effort
//! operations (`html`, `contains`, `wait_till_not_exists`) degrade silently
//! instead.

mod console;
mod logging;

#[cfg(test)]
mod tests;

pub use logging::RequestLogger;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, instrument};
use url::Url;

use crate::bridge::{
    Browser, CloseOptions, NavigateOptions, RemotePage, TransportError, TypeOptions, WaitCondition,
};
use crate::config::SessionConfig;
use crate::element::ElementHandle;
use crate::error::SessionError;
use crate::registry::BrowserRegistry;
use crate::{Error, Result};

/// Viewport applied to every freshly created session
const INITIAL_VIEWPORT: (u32, u32) = (1680, 1050);

/// Interval between iterations of engine-side polling loops
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Canonical bound for the soft existence wait
pub const DEFAULT_SOFT_WAIT: Duration = Duration::from_secs(30);

/// One controlled browser page and its operations.
///
/// Cheap to clone; clones share the same underlying page. Commands are
/// expected to be issued by a single task at a time — multi-step sequences
/// like download capture take no internal locks, so concurrent use of one
/// session from several tasks is caller responsibility.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    browser: Arc<dyn Browser>,
    page: Arc<dyn RemotePage>,
    logger: Option<RequestLogger>,
    download_dir: Mutex<Option<PathBuf>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.inner.page.url())
            .field("logger", &self.inner.logger.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Session {
    /// Create a session on the shared browser process.
    ///
    /// Acquires the process from `registry` (launching it on first use with
    /// `config.launch`), opens a page, applies the initial viewport,
    /// navigates to `url` waiting for network quiescence, and performs
    /// request logging before returning.
    #[instrument(skip(registry, config))]
    pub async fn create(
        registry: &BrowserRegistry,
        url: &str,
        config: SessionConfig,
    ) -> Result<Session> {
        let browser = registry.acquire(&config.launch).await?;
        let page = browser.new_page().await.map_err(Error::process)?;

        let session = Session {
            inner: Arc::new(SessionInner {
                browser,
                page,
                logger: config.logger,
                download_dir: Mutex::new(None),
            }),
        };

        let (width, height) = INITIAL_VIEWPORT;
        session.set_viewport(width, height).await?;
        session.goto(url, &NavigateOptions::network_idle()).await?;
        session.log_request().await?;

        Ok(session)
    }

    /// Open a sibling session sharing this session's process and logger.
    ///
    /// `url` may be partial: it is resolved as a relative reference against
    /// the current page URL, so `/path?x=1` keeps the current scheme and
    /// host while replacing path and query.
    pub async fn new_tab(&self, url: &str) -> Result<Session> {
        let target = self.resolve_tab_url(url)?;
        debug!(target = %target, "Opening new tab");

        let page = self
            .inner
            .browser
            .new_page()
            .await
            .map_err(|err| self.fail("opening new tab failed", err))?;

        let session = Session {
            inner: Arc::new(SessionInner {
                browser: Arc::clone(&self.inner.browser),
                page,
                logger: self.inner.logger.clone(),
                download_dir: Mutex::new(None),
            }),
        };

        session
            .goto(&target, &NavigateOptions::network_idle())
            .await?;
        session.log_request().await?;

        Ok(session)
    }

    /// Current page URL
    pub fn url(&self) -> String {
        self.inner.page.url()
    }

    /// Navigate to `url`
    pub async fn goto(&self, url: &str, options: &NavigateOptions) -> Result<()> {
        debug!(url, "Navigating");
        self.inner
            .page
            .goto(url, options)
            .await
            .map_err(|err| self.fail(format!("navigation to {} failed", url), err))
    }

    /// Reload the current page
    pub async fn reload(&self, options: &NavigateOptions) -> Result<()> {
        self.inner
            .page
            .reload(options)
            .await
            .map_err(|err| self.fail("reload failed", err))
    }

    /// Resolve once an in-flight navigation completes; waits for network
    /// quiescence under the default options
    pub async fn wait_for_navigation(&self, options: &NavigateOptions) -> Result<()> {
        self.inner
            .page
            .wait_for_navigation(options)
            .await
            .map_err(|err| self.fail("waiting for navigation failed", err))
    }

    /// Close this session's page; unload handlers run under the default
    /// options
    pub async fn close(&self, options: &CloseOptions) -> Result<()> {
        debug!(url = %self.url(), "Closing session page");
        self.inner
            .page
            .close(options)
            .await
            .map_err(|err| self.fail("closing page failed", err))
    }

    /// Evaluate a page-context expression and return its JSON value
    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.inner
            .page
            .evaluate(script)
            .await
            .map_err(|err| self.fail("script evaluation failed", err))
    }

    /// Evaluate a page-context expression and deserialize its result
    pub async fn evaluate_as<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T> {
        let value = self.evaluate(script).await?;
        serde_json::from_value(value)
            .map_err(|err| self.fail_msg(format!("unexpected evaluation result: {}", err)))
    }

    /// Full scroll extent of the page in pixels
    pub async fn page_height(&self) -> Result<u32> {
        let height: f64 = self.evaluate_as(crate::scripts::PAGE_HEIGHT).await?;
        Ok(height as u32)
    }

    /// Serialized HTML of the document, or `None` when capture fails.
    ///
    /// Best-effort: used opportunistically by logging and keep-alive paths
    /// where a failure must not abort the surrounding operation.
    pub async fn html(&self) -> Option<String> {
        match self.inner.page.evaluate(crate::scripts::OUTER_HTML).await {
            Ok(value) => value.as_str().map(str::to_owned),
            Err(err) => {
                debug!(error = %err, "HTML capture failed");
                None
            }
        }
    }

    /// Substring test against the current HTML snapshot; false when capture
    /// fails
    pub async fn contains(&self, needle: &str) -> bool {
        self.html()
            .await
            .map(|html| html.contains(needle))
            .unwrap_or(false)
    }

    /// Whether at least one element matches `selector`
    pub async fn exists(&self, selector: &str) -> Result<bool> {
        let nodes = self
            .inner
            .page
            .query_selector_all(selector)
            .await
            .map_err(|err| self.fail(format!("query for {:?} failed", selector), err))?;
        Ok(!nodes.is_empty())
    }

    /// First match for `selector`, if any
    pub async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let node = self
            .inner
            .page
            .query_selector(selector)
            .await
            .map_err(|err| self.fail(format!("query for {:?} failed", selector), err))?;
        Ok(node.map(|node| ElementHandle::new(self.clone(), node)))
    }

    /// All matches for `selector`; empty when none
    pub async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let nodes = self
            .inner
            .page
            .query_selector_all(selector)
            .await
            .map_err(|err| self.fail(format!("query for {:?} failed", selector), err))?;
        Ok(nodes
            .into_iter()
            .map(|node| ElementHandle::new(self.clone(), node))
            .collect())
    }

    /// Block until a visible match for `selector` appears.
    ///
    /// Visibility means computed display not `none` and nonzero rendered
    /// height. The deadline is bridge-enforced; elapsing it surfaces a
    /// session-bound error.
    pub async fn wait_for_selector(&self, selector: &str) -> Result<ElementHandle> {
        match self
            .inner
            .page
            .wait_for_selector(selector, WaitCondition::Visible)
            .await
        {
            Ok(Some(node)) => Ok(ElementHandle::new(self.clone(), node)),
            Ok(None) => Err(self.fail_msg(format!("no visible match for {:?}", selector))),
            Err(err) => Err(self.fail(format!("waiting for {:?} failed", selector), err)),
        }
    }

    /// Block until no visible match for `selector` remains; hard error on
    /// the bridge-enforced deadline
    pub async fn wait_for_selector_to_disappear(&self, selector: &str) -> Result<()> {
        self.inner
            .page
            .wait_for_selector(selector, WaitCondition::Hidden)
            .await
            .map(|_| ())
            .map_err(|err| {
                self.fail(
                    format!("waiting for {:?} to disappear failed", selector),
                    err,
                )
            })
    }

    /// Poll once per second until `selector` no longer matches, up to
    /// `timeout` ([`DEFAULT_SOFT_WAIT`] is the canonical bound).
    ///
    /// Soft by contract: gives up silently on the bound and swallows query
    /// failures instead of raising.
    #[instrument(skip(self))]
    pub async fn wait_till_not_exists(&self, selector: &str, timeout: Duration) {
        let start = Instant::now();
        loop {
            match self.inner.page.query_selector_all(selector).await {
                Ok(nodes) if nodes.is_empty() => return,
                Ok(_) => {}
                Err(err) => {
                    debug!(error = %err, "Existence poll failed, giving up");
                    return;
                }
            }
            if start.elapsed() >= timeout {
                debug!(selector, "Selector still present after soft wait");
                return;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Send keystrokes to whatever currently has focus on the page
    pub async fn type_text(&self, text: &str, options: &TypeOptions) -> Result<()> {
        self.inner
            .page
            .type_text(text, options)
            .await
            .map_err(|err| self.fail("typing failed", err))
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.inner
            .page
            .set_viewport(width, height)
            .await
            .map_err(|err| self.fail("setting viewport failed", err))
    }

    fn resolve_tab_url(&self, url: &str) -> Result<String> {
        let current_url = self.inner.page.url();
        let current = Url::parse(&current_url).map_err(|err| {
            Error::invalid_argument(format!(
                "current page URL {:?} is not resolvable: {}",
                current_url, err
            ))
        })?;
        let resolved = current.join(url).map_err(|err| {
            Error::invalid_argument(format!(
                "cannot resolve {:?} against {:?}: {}",
                url, current_url, err
            ))
        })?;
        Ok(resolved.into())
    }

    // Crate-internal plumbing for the element and download layers.

    pub(crate) fn page(&self) -> Arc<dyn RemotePage> {
        Arc::clone(&self.inner.page)
    }

    pub(crate) fn logger(&self) -> Option<RequestLogger> {
        self.inner.logger.clone()
    }

    /// Swap the recorded download directory, returning the previous value
    pub(crate) fn swap_download_dir(&self, dir: Option<PathBuf>) -> Option<PathBuf> {
        let mut slot = self
            .inner
            .download_dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *slot, dir)
    }

    pub(crate) fn recorded_download_dir(&self) -> Option<PathBuf> {
        self.inner
            .download_dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Build a session-bound error from a transport failure
    pub(crate) fn fail(&self, message: impl Into<String>, source: TransportError) -> Error {
        Error::Session(SessionError::new(self.clone(), message, Some(source)))
    }

    /// Build a session-bound error with no transport cause
    pub(crate) fn fail_msg(&self, message: impl Into<String>) -> Error {
        Error::Session(SessionError::new(self.clone(), message, None))
    }
}
