//! Scriptable in-memory bridge for the test suite
//!
//! Implements all four bridge traits over plain mutex-guarded state. Pages
//! and nodes recognize the engine's standard scripts (outer HTML, page
//! height, visibility check, script click, dataset/option maps, value
//! assignment, property reads, shadow queries) and answer them from their
//! configured state; anything else falls back to registered stubs. Failures
//! are injected per page or per node so error-translation paths can be
//! exercised without a real transport.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::bridge::traits::{Browser, Launcher, RemoteNode, RemotePage};
use crate::bridge::types::{
    ClickOptions, CloseOptions, NavigateOptions, TransportError, TypeOptions, WaitCondition,
    WaitUntil,
};
use crate::config::LaunchConfig;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Minimal valid PNG signature, enough for byte-level assertions
pub const MOCK_PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Mock launcher recording every launch
#[derive(Debug, Default)]
pub struct MockLauncher {
    launches: Mutex<Vec<LaunchConfig>>,
    browser: Mutex<Option<Arc<MockBrowser>>>,
    fail_with: Mutex<Option<TransportError>>,
}

impl MockLauncher {
    /// Create a mock launcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next launch fail with `err`
    pub fn fail_with(&self, err: TransportError) {
        *lock(&self.fail_with) = Some(err);
    }

    /// Number of launches performed
    pub fn launch_count(&self) -> usize {
        lock(&self.launches).len()
    }

    /// Configuration of the most recent launch
    pub fn last_config(&self) -> Option<LaunchConfig> {
        lock(&self.launches).last().cloned()
    }

    /// The most recently launched browser
    pub fn browser(&self) -> Option<Arc<MockBrowser>> {
        lock(&self.browser).clone()
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(&self, config: &LaunchConfig) -> Result<Arc<dyn Browser>, TransportError> {
        if let Some(err) = lock(&self.fail_with).take() {
            return Err(err);
        }
        lock(&self.launches).push(config.clone());
        let browser = Arc::new(MockBrowser::new());
        *lock(&self.browser) = Some(Arc::clone(&browser));
        Ok(browser)
    }
}

/// Mock browser holding a liveness flag and the pages it opened
#[derive(Debug, Default)]
pub struct MockBrowser {
    alive: Mutex<bool>,
    pages: Mutex<Vec<Arc<MockPage>>>,
    page_stubs: Mutex<Vec<(String, Value)>>,
}

impl MockBrowser {
    /// Create a live mock browser
    pub fn new() -> Self {
        MockBrowser {
            alive: Mutex::new(true),
            pages: Mutex::new(Vec::new()),
            page_stubs: Mutex::new(Vec::new()),
        }
    }

    /// Register an eval stub applied to every page opened from now on.
    ///
    /// Lets tests script pages that only come into existence mid-call, such
    /// as the sibling tab a cross-origin download opens.
    pub fn stub_new_page_eval(&self, pattern: impl Into<String>, value: Value) {
        lock(&self.page_stubs).push((pattern.into(), value));
    }

    /// Pages opened so far, in creation order
    pub fn pages(&self) -> Vec<Arc<MockPage>> {
        lock(&self.pages).clone()
    }

    /// The `index`-th opened page
    pub fn page(&self, index: usize) -> Arc<MockPage> {
        lock(&self.pages)[index].clone()
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn new_page(&self) -> Result<Arc<dyn RemotePage>, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::target_closed("browser is closed"));
        }
        let page = Arc::new(MockPage::new());
        for (pattern, value) in lock(&self.page_stubs).iter() {
            page.stub_eval(pattern.clone(), value.clone());
        }
        lock(&self.pages).push(Arc::clone(&page));
        Ok(page)
    }

    async fn close(&self) -> Result<(), TransportError> {
        *lock(&self.alive) = false;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        *lock(&self.alive)
    }
}

/// Mock page answering the engine's standard scripts from configured state
#[derive(Debug)]
pub struct MockPage {
    url: Mutex<String>,
    html: Mutex<String>,
    height: Mutex<f64>,
    screenshot_png: Mutex<Vec<u8>>,
    nodes: Mutex<Vec<(String, Arc<MockNode>)>>,
    eval_stubs: Mutex<Vec<(String, Value)>>,
    eval_failures: Mutex<Vec<(String, TransportError)>>,
    viewports: Mutex<Vec<(u32, u32)>>,
    navigations: Mutex<Vec<(String, WaitUntil)>>,
    raw_commands: Mutex<Vec<(String, Value)>>,
    typed: Mutex<Vec<String>>,
    close_log: Mutex<Vec<bool>>,
    fail_all: Mutex<Option<TransportError>>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    /// Create a blank mock page
    pub fn new() -> Self {
        MockPage {
            url: Mutex::new("about:blank".to_string()),
            html: Mutex::new("<html><head></head><body></body></html>".to_string()),
            height: Mutex::new(800.0),
            screenshot_png: Mutex::new(MOCK_PNG.to_vec()),
            nodes: Mutex::new(Vec::new()),
            eval_stubs: Mutex::new(Vec::new()),
            eval_failures: Mutex::new(Vec::new()),
            viewports: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
            raw_commands: Mutex::new(Vec::new()),
            typed: Mutex::new(Vec::new()),
            close_log: Mutex::new(Vec::new()),
            fail_all: Mutex::new(None),
        }
    }

    /// Set the serialized HTML the page reports
    pub fn set_html(&self, html: impl Into<String>) {
        *lock(&self.html) = html.into();
    }

    /// Set the full scroll height the page reports
    pub fn set_height(&self, height: f64) {
        *lock(&self.height) = height;
    }

    /// Set the PNG bytes screenshots produce
    pub fn set_screenshot(&self, png: Vec<u8>) {
        *lock(&self.screenshot_png) = png;
    }

    /// Register a node as a match for `selector`
    pub fn add_node(&self, selector: impl Into<String>, node: Arc<MockNode>) {
        lock(&self.nodes).push((selector.into(), node));
    }

    /// Remove every node registered for `selector`
    pub fn clear_nodes(&self, selector: &str) {
        lock(&self.nodes).retain(|(s, _)| s != selector);
    }

    /// Answer any evaluated script containing `pattern` with `value`.
    ///
    /// Stubs are checked before the built-in script handling.
    pub fn stub_eval(&self, pattern: impl Into<String>, value: Value) {
        lock(&self.eval_stubs).push((pattern.into(), value));
    }

    /// Fail any evaluated script containing `pattern` with `err`, leaving
    /// other commands working
    pub fn fail_eval(&self, pattern: impl Into<String>, err: TransportError) {
        lock(&self.eval_failures).push((pattern.into(), err));
    }

    /// Make every subsequent command on this page fail with `err`, as a page
    /// whose browser went away would
    pub fn fail_all_with(&self, err: TransportError) {
        *lock(&self.fail_all) = Some(err);
    }

    /// Viewport sizes applied, in order
    pub fn viewports(&self) -> Vec<(u32, u32)> {
        lock(&self.viewports).clone()
    }

    /// Navigations performed, as `(url, wait_until)`
    pub fn navigations(&self) -> Vec<(String, WaitUntil)> {
        lock(&self.navigations).clone()
    }

    /// Raw protocol commands sent, as `(name, params)`
    pub fn raw_commands(&self) -> Vec<(String, Value)> {
        lock(&self.raw_commands).clone()
    }

    /// Text typed at page level
    pub fn typed(&self) -> Vec<String> {
        lock(&self.typed).clone()
    }

    /// `run_before_unload` flags of close calls received
    pub fn close_log(&self) -> Vec<bool> {
        lock(&self.close_log).clone()
    }

    fn check(&self) -> Result<(), TransportError> {
        match lock(&self.fail_all).as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn matches(&self, selector: &str) -> Vec<Arc<MockNode>> {
        lock(&self.nodes)
            .iter()
            .filter(|(s, _)| s == selector)
            .map(|(_, node)| Arc::clone(node))
            .collect()
    }
}

#[async_trait]
impl RemotePage for MockPage {
    fn url(&self) -> String {
        lock(&self.url).clone()
    }

    async fn goto(&self, url: &str, options: &NavigateOptions) -> Result<(), TransportError> {
        self.check()?;
        *lock(&self.url) = url.to_string();
        lock(&self.navigations).push((url.to_string(), options.wait_until));
        Ok(())
    }

    async fn reload(&self, options: &NavigateOptions) -> Result<(), TransportError> {
        self.check()?;
        let url = self.url();
        lock(&self.navigations).push((url, options.wait_until));
        Ok(())
    }

    async fn wait_for_navigation(&self, _options: &NavigateOptions) -> Result<(), TransportError> {
        self.check()
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), TransportError> {
        self.check()?;
        lock(&self.viewports).push((width, height));
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, TransportError> {
        self.check()?;
        if let Some((_, err)) = lock(&self.eval_failures)
            .iter()
            .find(|(pattern, _)| script.contains(pattern.as_str()))
        {
            return Err(err.clone());
        }
        if let Some((_, value)) = lock(&self.eval_stubs)
            .iter()
            .find(|(pattern, _)| script.contains(pattern.as_str()))
        {
            return Ok(value.clone());
        }
        if script == crate::scripts::OUTER_HTML {
            return Ok(Value::String(lock(&self.html).clone()));
        }
        if script == crate::scripts::PAGE_HEIGHT {
            return Ok(json!(*lock(&self.height)));
        }
        Ok(Value::Null)
    }

    async fn query_selector(
        &self,
        selector: &str,
    ) -> Result<Option<Arc<dyn RemoteNode>>, TransportError> {
        self.check()?;
        Ok(self
            .matches(selector)
            .into_iter()
            .next()
            .map(|node| node as Arc<dyn RemoteNode>))
    }

    async fn query_selector_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Arc<dyn RemoteNode>>, TransportError> {
        self.check()?;
        Ok(self
            .matches(selector)
            .into_iter()
            .map(|node| node as Arc<dyn RemoteNode>)
            .collect())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        condition: WaitCondition,
    ) -> Result<Option<Arc<dyn RemoteNode>>, TransportError> {
        self.check()?;
        let visible = self
            .matches(selector)
            .into_iter()
            .find(|node| node.is_visible());
        match (condition, visible) {
            (WaitCondition::Visible, Some(node)) => Ok(Some(node as Arc<dyn RemoteNode>)),
            (WaitCondition::Visible, None) => Err(TransportError::timeout(format!(
                "no visible match for {:?}",
                selector
            ))),
            (WaitCondition::Hidden, None) => Ok(None),
            (WaitCondition::Hidden, Some(_)) => Err(TransportError::timeout(format!(
                "{:?} still visible",
                selector
            ))),
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), TransportError> {
        self.check()?;
        let png = lock(&self.screenshot_png).clone();
        tokio::fs::write(path, png)
            .await
            .map_err(|err| TransportError::command(format!("screenshot write failed: {}", err)))
    }

    async fn type_text(&self, text: &str, _options: &TypeOptions) -> Result<(), TransportError> {
        self.check()?;
        lock(&self.typed).push(text.to_string());
        Ok(())
    }

    async fn send_raw_command(
        &self,
        name: &str,
        params: Value,
    ) -> Result<Value, TransportError> {
        self.check()?;
        lock(&self.raw_commands).push((name.to_string(), params));
        Ok(Value::Null)
    }

    async fn close(&self, options: &CloseOptions) -> Result<(), TransportError> {
        self.check()?;
        lock(&self.close_log).push(options.run_before_unload);
        Ok(())
    }
}

/// Mock node answering the engine's element scripts from configured state
#[derive(Debug, Default)]
pub struct MockNode {
    visible: Mutex<bool>,
    properties: Mutex<Map<String, Value>>,
    dataset: Mutex<Map<String, Value>>,
    options: Mutex<Vec<(String, String)>>,
    children: Mutex<Vec<(String, Arc<MockNode>)>>,
    shadow: Mutex<Vec<(String, Arc<MockNode>)>>,
    pointer_clicks: Mutex<Vec<u32>>,
    script_clicks: AtomicUsize,
    focus_calls: AtomicUsize,
    blur_calls: AtomicUsize,
    typed: Mutex<Vec<String>>,
    selections: Mutex<Vec<Vec<String>>>,
    files: Mutex<Vec<Vec<PathBuf>>>,
    fail_with: Mutex<Option<TransportError>>,
}

impl MockNode {
    /// Create a visible node
    pub fn new() -> Arc<Self> {
        let node = MockNode {
            visible: Mutex::new(true),
            ..Default::default()
        };
        Arc::new(node)
    }

    /// Create a hidden node
    pub fn hidden() -> Arc<Self> {
        Arc::new(MockNode::default())
    }

    /// Set the visibility the node reports
    pub fn set_visible(&self, visible: bool) {
        *lock(&self.visible) = visible;
    }

    /// Whether the node currently reports visible
    pub fn is_visible(&self) -> bool {
        *lock(&self.visible)
    }

    /// Set a named property
    pub fn set_property(&self, name: impl Into<String>, value: Value) {
        lock(&self.properties).insert(name.into(), value);
    }

    /// Set a custom-data attribute
    pub fn set_data(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.dataset).insert(name.into(), Value::String(value.into()));
    }

    /// Add an `<option>` descendant as `(value, label)`
    pub fn add_option(&self, value: impl Into<String>, label: impl Into<String>) {
        lock(&self.options).push((value.into(), label.into()));
    }

    /// Register a subtree match for `selector`
    pub fn add_child(&self, selector: impl Into<String>, child: Arc<MockNode>) {
        lock(&self.children).push((selector.into(), child));
    }

    /// Register a shadow-root match for `selector`
    pub fn add_shadow_child(&self, selector: impl Into<String>, child: Arc<MockNode>) {
        lock(&self.shadow).push((selector.into(), child));
    }

    /// Make every subsequent command on this node fail with `err`
    pub fn fail_all_with(&self, err: TransportError) {
        *lock(&self.fail_with) = Some(err);
    }

    /// Click counts of pointer clicks received, in order
    pub fn pointer_clicks(&self) -> Vec<u32> {
        lock(&self.pointer_clicks).clone()
    }

    /// Number of script-level clicks received
    pub fn script_clicks(&self) -> usize {
        self.script_clicks.load(Ordering::SeqCst)
    }

    /// Number of focus calls received
    pub fn focus_calls(&self) -> usize {
        self.focus_calls.load(Ordering::SeqCst)
    }

    /// Number of blur calls received
    pub fn blur_calls(&self) -> usize {
        self.blur_calls.load(Ordering::SeqCst)
    }

    /// Text typed into this node, in order
    pub fn typed(&self) -> Vec<String> {
        lock(&self.typed).clone()
    }

    /// Value lists passed to select, in order
    pub fn selections(&self) -> Vec<Vec<String>> {
        lock(&self.selections).clone()
    }

    /// File lists uploaded, in order
    pub fn files(&self) -> Vec<Vec<PathBuf>> {
        lock(&self.files).clone()
    }

    fn check(&self) -> Result<(), TransportError> {
        match lock(&self.fail_with).as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteNode for MockNode {
    async fn click(&self, options: &ClickOptions) -> Result<(), TransportError> {
        self.check()?;
        lock(&self.pointer_clicks).push(options.click_count);
        Ok(())
    }

    async fn type_text(&self, text: &str, _options: &TypeOptions) -> Result<(), TransportError> {
        self.check()?;
        lock(&self.typed).push(text.to_string());
        Ok(())
    }

    async fn focus(&self) -> Result<(), TransportError> {
        self.check()?;
        self.focus_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn select(&self, values: &[String]) -> Result<Vec<String>, TransportError> {
        self.check()?;
        lock(&self.selections).push(values.to_vec());
        let options = lock(&self.options);
        if options.is_empty() {
            return Ok(values.to_vec());
        }
        Ok(values
            .iter()
            .filter(|value| options.iter().any(|(v, _)| v == *value))
            .cloned()
            .collect())
    }

    async fn set_files(&self, paths: &[PathBuf]) -> Result<(), TransportError> {
        self.check()?;
        lock(&self.files).push(paths.to_vec());
        Ok(())
    }

    async fn property(&self, name: &str) -> Result<Value, TransportError> {
        self.check()?;
        Ok(lock(&self.properties)
            .get(name)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn evaluate(&self, body: &str) -> Result<Value, TransportError> {
        self.check()?;
        if body == crate::scripts::IS_VISIBLE_BODY {
            return Ok(Value::Bool(self.is_visible()));
        }
        if body == crate::scripts::SCRIPT_CLICK_BODY {
            self.script_clicks.fetch_add(1, Ordering::SeqCst);
            return Ok(Value::Null);
        }
        if body == crate::scripts::BLUR_BODY {
            self.blur_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(Value::Null);
        }
        if body == crate::scripts::DATASET_BODY {
            return Ok(Value::Object(lock(&self.dataset).clone()));
        }
        if body == crate::scripts::OPTION_MAP_BODY {
            let map: Map<String, Value> = lock(&self.options)
                .iter()
                .map(|(value, label)| (value.clone(), Value::String(label.clone())))
                .collect();
            return Ok(Value::Object(map));
        }
        if let Some(encoded) = body
            .strip_prefix("elem.value = ")
            .and_then(|rest| rest.strip_suffix(';'))
        {
            let value: Value = serde_json::from_str(encoded)
                .map_err(|err| TransportError::command(format!("bad value script: {}", err)))?;
            lock(&self.properties).insert("value".to_string(), value);
            return Ok(Value::Null);
        }
        Ok(Value::Null)
    }

    async fn evaluate_handle(
        &self,
        body: &str,
    ) -> Result<Option<Arc<dyn RemoteNode>>, TransportError> {
        self.check()?;
        if let Some(literal) = body
            .strip_prefix("return elem.shadowRoot.querySelector(")
            .and_then(|rest| rest.strip_suffix(");"))
        {
            let selector: String = serde_json::from_str(literal)
                .map_err(|err| TransportError::command(format!("bad shadow script: {}", err)))?;
            return Ok(lock(&self.shadow)
                .iter()
                .find(|(s, _)| *s == selector)
                .map(|(_, node)| Arc::clone(node) as Arc<dyn RemoteNode>));
        }
        Err(TransportError::command(format!(
            "unrecognized handle script: {}",
            body
        )))
    }

    async fn query_selector(
        &self,
        selector: &str,
    ) -> Result<Option<Arc<dyn RemoteNode>>, TransportError> {
        self.check()?;
        Ok(lock(&self.children)
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, node)| Arc::clone(node) as Arc<dyn RemoteNode>))
    }

    async fn query_selector_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Arc<dyn RemoteNode>>, TransportError> {
        self.check()?;
        Ok(lock(&self.children)
            .iter()
            .filter(|(s, _)| s == selector)
            .map(|(_, node)| Arc::clone(node) as Arc<dyn RemoteNode>)
            .collect())
    }
}
