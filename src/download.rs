//! Download capture
//!
//! The control protocol has no "download finished" signal, so completion is
//! inferred two ways. Fetch-based capture ([`Session::download`]) pulls the
//! bytes through an in-page fetch that resolves to a data-URI, decoded back
//! outside the page. Native capture ([`Session::trigger_download`]) redirects
//! the browser's download sink into a private temp directory and polls it
//! until exactly one new file appears. Both report failures as the download
//! error kind, distinct from session errors, because partial success (an
//! orphaned sibling tab, a half-restored sink) is real and callers must be
//! able to detect it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::json;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::bridge::CloseOptions;
use crate::error::DownloadError;
use crate::session::{Session, POLL_INTERVAL};
use crate::{scripts, Error, Result};

/// Browser spool suffix for a download still in progress
const SPOOL_EXTENSION: &str = "crdownload";

/// One captured download: the file's on-disk name and its contents.
///
/// Transient by design; nothing is persisted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Name the browser gave the file
    pub name: String,
    /// Raw file contents at the moment of capture
    pub bytes: Vec<u8>,
}

/// Explicit result of a download-triggering action.
///
/// A download cancels the in-page navigation it would have caused, so the
/// *expected* signal from a successful trigger is an aborted navigation.
/// Actions report which of the three things happened instead of the engine
/// guessing intent from a caught transport error;
/// [`from_result`](Self::from_result) does the conversion for actions that
/// are a single session call.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The browser cancelled in-page navigation because a download began
    NavigationAborted,
    /// The action completed without a navigation abort; a file may still
    /// have been produced
    Completed,
    /// The action genuinely failed; capture is aborted
    Failed(Box<Error>),
}

impl TriggerOutcome {
    /// Classify a session-call result as a trigger outcome.
    ///
    /// An error whose transport cause is an aborted navigation is the
    /// success signal, not a failure.
    pub fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => TriggerOutcome::Completed,
            Err(err) if err.is_navigation_aborted() => TriggerOutcome::NavigationAborted,
            Err(err) => TriggerOutcome::Failed(Box::new(err)),
        }
    }
}

impl Session {
    /// Redirect the browser's native download sink for this page to `path`
    /// and record it as the session's download directory.
    pub async fn set_download_path(&self, path: &Path) -> Result<()> {
        self.apply_download_behavior(Some(path)).await?;
        self.swap_download_dir(Some(path.to_path_buf()));
        Ok(())
    }

    /// Capture a native UI-triggered download.
    ///
    /// Creates a fresh exclusive temp directory, redirects the download sink
    /// there, runs `action`, then polls the directory once per second until a
    /// new file appears, bounded by `wait` (required; elapsing it is
    /// [`DownloadError::NoFile`]). Exactly one new file is read and returned
    /// with its on-disk name; more than one is the fatal ambiguity error.
    /// The previous download path is restored and the temp directory removed
    /// on every path out.
    ///
    /// No internal locking protects the sink save/restore pair; running two
    /// captures on one session concurrently is caller error.
    #[instrument(skip(self, action))]
    pub async fn trigger_download<Fut>(&self, action: Fut, wait: Duration) -> Result<DownloadedFile>
    where
        Fut: Future<Output = TriggerOutcome>,
    {
        let capture = tempfile::Builder::new()
            .prefix("tiller-download-")
            .tempdir()
            .map_err(DownloadError::Io)?;
        let previous = self.swap_download_dir(Some(capture.path().to_path_buf()));

        if let Err(err) = self.apply_download_behavior(Some(capture.path())).await {
            self.restore_sink(previous).await;
            return Err(err);
        }

        match action.await {
            TriggerOutcome::NavigationAborted => {
                debug!("Navigation aborted by download, polling for the file")
            }
            TriggerOutcome::Completed => {
                debug!("Trigger action completed normally, polling for the file")
            }
            TriggerOutcome::Failed(err) => {
                self.restore_sink(previous).await;
                return Err(wrap_trigger_failure(*err));
            }
        }

        let file = match self.poll_for_download(capture.path(), wait).await {
            Ok(file) => file,
            Err(err) => {
                self.restore_sink(previous).await;
                return Err(err);
            }
        };

        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.restore_sink(previous).await;
                return Err(DownloadError::Io(err).into());
            }
        };
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Restore is best-effort here too: the bytes are already in hand,
        // and the recorded directory must never be left pointing at the
        // capture directory, which is deleted when `capture` drops.
        self.restore_sink(previous).await;

        debug!(name = %name, bytes = bytes.len(), "Download captured");
        Ok(DownloadedFile { name, bytes })
    }

    /// Download `url` through an in-page fetch and return its bytes.
    ///
    /// Same-origin targets (scheme and host match the current page, port
    /// ignored) are fetched from this session's page. Cross-origin targets
    /// are fetched from a sibling tab opened at the target origin's *root* —
    /// never the full path, which could hand certain content types to a
    /// native viewer — and the sibling is closed afterwards. Every failure
    /// surfaces as the download error kind.
    #[instrument(skip(self))]
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let current_url = self.url();
        let current = Url::parse(&current_url).map_err(|err| {
            DownloadError::fetch(format!("current URL {:?} not parseable: {}", current_url, err))
        })?;
        let target = current.join(url).map_err(|err| {
            DownloadError::fetch(format!("target URL {:?} not resolvable: {}", url, err))
        })?;

        let same_origin =
            target.scheme() == current.scheme() && target.host_str() == current.host_str();
        if same_origin {
            return self.fetch_bytes(target.as_str()).await;
        }

        let root = format!(
            "{}://{}/",
            target.scheme(),
            target.host_str().unwrap_or_default()
        );
        debug!(root = %root, "Cross-origin download, opening sibling tab");
        let sibling = self.new_tab(&root).await.map_err(|err| {
            Error::from(DownloadError::fetch(format!(
                "opening sibling tab at {} failed: {}",
                root, err
            )))
        })?;

        let fetched = sibling.fetch_bytes(target.as_str()).await;
        let closed = sibling.close(&CloseOptions::default()).await;

        let bytes = fetched?;
        if let Err(err) = closed {
            return Err(DownloadError::fetch(format!("sibling tab left open: {}", err)).into());
        }
        Ok(bytes)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let value = self
            .page()
            .evaluate(&scripts::fetch_data_uri(url))
            .await
            .map_err(|err| {
                DownloadError::fetch(format!("in-page fetch of {} failed: {}", url, err))
            })?;
        let data_uri = value
            .as_str()
            .ok_or_else(|| DownloadError::decode("fetch resolved to a non-string"))?;
        decode_data_uri(data_uri)
    }

    async fn poll_for_download(&self, dir: &Path, wait: Duration) -> Result<PathBuf> {
        let start = Instant::now();
        loop {
            let mut files = completed_downloads(dir)?;
            match files.len() {
                0 => {}
                1 => return Ok(files.remove(0)),
                _ => {
                    let names = files
                        .iter()
                        .map(|f| f.file_name().unwrap_or_default().to_string_lossy().into_owned())
                        .collect();
                    return Err(DownloadError::ambiguous(names).into());
                }
            }
            if start.elapsed() >= wait {
                return Err(DownloadError::NoFile { waited: wait }.into());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn apply_download_behavior(&self, dir: Option<&Path>) -> Result<()> {
        let params = match dir {
            Some(dir) => json!({
                "behavior": "allow",
                "downloadPath": dir.display().to_string(),
            }),
            None => json!({ "behavior": "default" }),
        };
        self.page()
            .send_raw_command("Page.setDownloadBehavior", params)
            .await
            .map(|_| ())
            .map_err(|err| self.fail("setting download behavior failed", err))
    }

    /// Best-effort restore of the sink and the recorded directory.
    ///
    /// Every path out of a capture funnels through here so the session can
    /// never be left recording the soon-deleted capture directory. A failed
    /// restore command is logged, not raised; the capture result wins.
    async fn restore_sink(&self, previous: Option<PathBuf>) {
        if let Err(err) = self.apply_download_behavior(previous.as_deref()).await {
            warn!(error = %err, "Download sink not restored");
        }
        self.swap_download_dir(previous);
    }
}

fn wrap_trigger_failure(err: Error) -> Error {
    match err {
        Error::Session(session_err) => {
            DownloadError::Trigger(Box::new(session_err)).into()
        }
        other => other,
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (_, payload) = uri
        .split_once("base64,")
        .ok_or_else(|| DownloadError::decode(format!("not a base64 data URI: {:.32}…", uri)))?;
    STANDARD
        .decode(payload)
        .map_err(|err| DownloadError::decode(format!("base64 payload invalid: {}", err)).into())
}

fn completed_downloads(dir: &Path) -> std::result::Result<Vec<PathBuf>, DownloadError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        // Skip the browser's in-progress spool files
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SPOOL_EXTENSION))
        {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}
