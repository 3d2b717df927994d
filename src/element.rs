//! Element handles
//!
//! An [`ElementHandle`] wraps one remote DOM node together with the session
//! that produced it. Handles are constructed only from successful queries and
//! waits; absence is always `None` or an empty list, never a null handle.
//! Every operation translates transport failures into the session-bound
//! error, so a handle used after its page navigated away fails cleanly.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::bridge::{ClickOptions, RemoteNode, TypeOptions};
use crate::scripts;
use crate::session::Session;
use crate::{Error, Result};

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

/// A reference to one node within a session's page.
///
/// Cheap to clone; clones refer to the same remote node. The handle holds a
/// back-reference to its owning [`Session`] so failures carry the session
/// and `submit` can run the request-logging side channel.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    session: Session,
    node: Arc<dyn RemoteNode>,
}

impl ElementHandle {
    pub(crate) fn new(session: Session, node: Arc<dyn RemoteNode>) -> Self {
        ElementHandle { session, node }
    }

    /// The session this element belongs to
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run a script body against this node (`elem` in scope) and return its
    /// JSON value
    pub async fn evaluate(&self, body: &str) -> Result<Value> {
        self.node
            .evaluate(body)
            .await
            .map_err(|err| self.session.fail("element script failed", err))
    }

    /// Raw inner HTML of the element
    pub async fn inner_html(&self) -> Result<String> {
        let value = self.property("innerHTML").await?;
        Ok(value.as_str().map(str::to_owned).unwrap_or_default())
    }

    /// Text content of the element, tags stripped and whitespace trimmed
    pub async fn inner_text(&self) -> Result<String> {
        let html = self.inner_html().await?;
        Ok(tag_pattern().replace_all(&html, "").trim().to_string())
    }

    /// Current value property of the element
    pub async fn value(&self) -> Result<Value> {
        self.property("value").await
    }

    /// Custom-data attributes of the element as a map
    pub async fn dataset(&self) -> Result<HashMap<String, String>> {
        let value = self.evaluate(scripts::DATASET_BODY).await?;
        serde_json::from_value(value)
            .map_err(|err| self.session.fail_msg(format!("unexpected dataset shape: {}", err)))
    }

    /// Read a named property, computed on demand.
    ///
    /// `data` and `dataset` return the custom-data attribute map; any other
    /// name returns the remote property's JSON value (null when absent).
    pub async fn property(&self, name: &str) -> Result<Value> {
        if name == "data" || name == "dataset" {
            let map = self.dataset().await?;
            return Ok(serde_json::to_value(map).unwrap_or(Value::Null));
        }
        self.node
            .property(name)
            .await
            .map_err(|err| self.session.fail(format!("reading property {:?} failed", name), err))
    }

    /// Whether the element is visible: computed display not `none` and
    /// nonzero rendered height
    pub async fn is_visible(&self) -> Result<bool> {
        let value = self.evaluate(scripts::IS_VISIBLE_BODY).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Give the element input focus
    pub async fn focus(&self) -> Result<()> {
        self.node
            .focus()
            .await
            .map_err(|err| self.session.fail("focus failed", err))
    }

    /// Remove input focus from the element
    pub async fn blur(&self) -> Result<()> {
        self.evaluate(scripts::BLUR_BODY).await.map(|_| ())
    }

    /// Click the element, visibility-aware.
    ///
    /// A visible element receives one real pointer click so listeners bound
    /// to pointer events fire normally. A hidden element (mid-transition,
    /// off-screen) receives exactly one script-level `.click()` instead,
    /// since a simulated pointer cannot reach it. Never both.
    pub async fn click(&self, options: &ClickOptions) -> Result<()> {
        if self.is_visible().await? {
            self.node
                .click(options)
                .await
                .map_err(|err| self.session.fail("click failed", err))
        } else {
            debug!("Element not visible, falling back to script click");
            self.evaluate(scripts::SCRIPT_CLICK_BODY).await.map(|_| ())
        }
    }

    /// Click preceded by the owning session's request logging.
    ///
    /// Submits are state-changing, so the forensic trail is captured before
    /// the page can navigate away; plain [`click`](Self::click) stays
    /// unlogged.
    pub async fn submit(&self, options: &ClickOptions) -> Result<()> {
        self.session.log_request().await?;
        self.click(options).await
    }

    /// Simulate keystrokes into the element.
    ///
    /// Unless `append` is set, a triple click first selects the existing
    /// content so the typed text replaces it.
    pub async fn type_text(&self, text: &str, append: bool, options: &TypeOptions) -> Result<()> {
        if !append {
            self.node
                .click(&ClickOptions::triple())
                .await
                .map_err(|err| self.session.fail("select-all click failed", err))?;
        }
        self.node
            .type_text(text, options)
            .await
            .map_err(|err| self.session.fail("typing failed", err))
    }

    /// JSON-encode `value` and assign it directly to the element's value
    /// property, bypassing keystroke simulation.
    ///
    /// Values that cannot be JSON-encoded raise the invalid-argument error.
    pub async fn set_value<T: Serialize>(&self, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(value)
            .map_err(|err| Error::invalid_argument(format!("value not JSON-encodable: {}", err)))?;
        self.evaluate(&scripts::set_value_body(&encoded))
            .await
            .map(|_| ())
    }

    /// Upload files through the native file-input mechanism
    pub async fn select_files(&self, paths: &[PathBuf]) -> Result<()> {
        self.node
            .set_files(paths)
            .await
            .map_err(|err| self.session.fail("file upload failed", err))
    }

    /// Upload a single file
    pub async fn select_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.select_files(&[path.into()]).await
    }

    /// Map of option value to visible label for a selection element
    pub async fn options(&self) -> Result<HashMap<String, String>> {
        let value = self.evaluate(scripts::OPTION_MAP_BODY).await?;
        serde_json::from_value(value)
            .map_err(|err| self.session.fail_msg(format!("unexpected option map: {}", err)))
    }

    /// Select one option; returns the values actually selected
    pub async fn select_option(&self, value: &str) -> Result<Vec<String>> {
        self.select_options(&[value.to_string()]).await
    }

    /// Select multiple options; returns the values actually selected
    pub async fn select_options(&self, values: &[String]) -> Result<Vec<String>> {
        self.node
            .select(values)
            .await
            .map_err(|err| self.session.fail("option selection failed", err))
    }

    /// Substring test against the element's inner HTML snapshot at call time
    pub async fn contains(&self, needle: &str) -> Result<bool> {
        Ok(self.inner_html().await?.contains(needle))
    }

    /// First subtree match for `selector`, if any
    pub async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let node = self
            .node
            .query_selector(selector)
            .await
            .map_err(|err| self.session.fail(format!("query for {:?} failed", selector), err))?;
        Ok(node.map(|node| ElementHandle::new(self.session.clone(), node)))
    }

    /// All subtree matches for `selector`; empty when none
    pub async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let nodes = self
            .node
            .query_selector_all(selector)
            .await
            .map_err(|err| self.session.fail(format!("query for {:?} failed", selector), err))?;
        Ok(nodes
            .into_iter()
            .map(|node| ElementHandle::new(self.session.clone(), node))
            .collect())
    }

    /// First match for `selector` one level inside the element's shadow root.
    ///
    /// The selector is embedded into the generated script as a JSON string
    /// literal; no other escaping path exists.
    pub async fn query_selector_shadow(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let node = self
            .node
            .evaluate_handle(&scripts::shadow_query_body(selector))
            .await
            .map_err(|err| {
                self.session
                    .fail(format!("shadow query for {:?} failed", selector), err)
            })?;
        Ok(node.map(|node| ElementHandle::new(self.session.clone(), node)))
    }
}
