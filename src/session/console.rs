//! Interactive command loop for live debugging
//!
//! When a flow fails, the session inside the error is still open. The
//! command loop keeps it alive and evaluates JavaScript snippets dropped
//! into a watched file, so the state that produced the failure can be
//! inspected before the browser goes away. Outside the automated-test
//! contract; nothing in the engine calls this.

use std::path::Path;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::session::{Session, POLL_INTERVAL};
use crate::Result;

/// Trimmed command-file contents that end the loop
const EXIT_COMMAND: &str = "exit";

impl Session {
    /// Watch `script_path` and evaluate its contents in-page on change.
    ///
    /// The evaluation result (or the error text) is written next to the
    /// script with a `.result.json` suffix. Between commands the session is
    /// kept alive with a best-effort HTML capture once per second. A file
    /// whose trimmed contents equal `exit` ends the loop.
    ///
    /// Typical entry point: `err.session().await_commands(path)` from a
    /// [`SessionError`](crate::SessionError).
    pub async fn await_commands(&self, script_path: &Path) -> Result<()> {
        let result_path = script_path.with_extension("result.json");
        let mut last = tokio::fs::read_to_string(script_path)
            .await
            .unwrap_or_default();

        info!(path = %script_path.display(), "Awaiting commands");

        loop {
            let current = tokio::fs::read_to_string(script_path)
                .await
                .unwrap_or_default();

            if current != last {
                last = current.clone();
                let script = current.trim();

                if script == EXIT_COMMAND {
                    info!("Command loop ended");
                    return Ok(());
                }

                if !script.is_empty() {
                    info!(path = %script_path.display(), "Running changed command file");
                    let output = match self.evaluate(script).await {
                        Ok(value) => serde_json::to_string_pretty(&value)
                            .unwrap_or_else(|err| format!("\"unserializable result: {}\"", err)),
                        Err(err) => serde_json::json!({ "error": err.to_string() }).to_string(),
                    };
                    if let Err(err) = tokio::fs::write(&result_path, output).await {
                        warn!(error = %err, "Command result not written");
                    }
                }
            }

            // Keep the browser alive between commands.
            let _ = self.html().await;
            sleep(POLL_INTERVAL).await;
        }
    }
}
