//! Request-logging side channel
//!
//! After every logged navigation the session hands the page URL, a full-page
//! PNG screenshot, and the serialized HTML to a caller-supplied sink. The
//! trail exists for later debugging, independent of what the caller's own
//! flow does with the page. Nothing is persisted here; storage is entirely
//! the sink's concern.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::session::Session;
use crate::Result;

/// Width screenshots are captured at; height follows the page's full scroll
/// extent so nothing below the fold is cut off
const CAPTURE_WIDTH: u32 = 1280;

/// Request logger callback.
///
/// Receives `(url, screenshot_png, html)` synchronously after every logged
/// navigation. `html` is the empty string when HTML capture failed.
pub type RequestLogger = Arc<dyn Fn(&str, &[u8], &str) + Send + Sync>;

impl Session {
    /// Run the request-logging side channel.
    ///
    /// No-op when the session has no logger. Otherwise resizes the viewport
    /// to [`CAPTURE_WIDTH`] by the page's full scroll height, captures a
    /// screenshot and the document HTML, and invokes the logger. HTML
    /// capture is best-effort; screenshot failures propagate.
    pub async fn log_request(&self) -> Result<()> {
        let Some(logger) = self.logger() else {
            return Ok(());
        };

        let height = self.page_height().await?;
        self.set_viewport(CAPTURE_WIDTH, height).await?;

        let png = self.capture_screenshot().await?;
        let html = self.html().await.unwrap_or_default();
        let url = self.url();

        debug!(url = %url, png_bytes = png.len(), html_bytes = html.len(), "Invoking request logger");
        logger(&url, &png, &html);

        Ok(())
    }

    /// Capture a screenshot through a transient temp file.
    ///
    /// The file is removed as soon as it has been read (or failed to read);
    /// nothing is left on disk.
    async fn capture_screenshot(&self) -> Result<Vec<u8>> {
        let basename = format!(
            "{}-{}.png",
            chrono::Utc::now().timestamp(),
            uuid::Uuid::new_v4()
        );
        let path = std::env::temp_dir().join(basename);

        self.page()
            .screenshot(&path)
            .await
            .map_err(|err| self.fail("screenshot capture failed", err))?;

        let bytes = tokio::fs::read(&path).await;
        if let Err(err) = tokio::fs::remove_file(&path).await {
            warn!(error = %err, path = %path.display(), "Screenshot temp file not removed");
        }

        bytes.map_err(|err| self.fail_msg(format!("reading screenshot failed: {}", err)))
    }
}
