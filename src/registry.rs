//! Shared browser process registry
//!
//! One browser process serves every session. The registry owns the slot it
//! lives in and serializes launch and reset so concurrent session creation
//! can never start two processes.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bridge::{Browser, Launcher};
use crate::config::LaunchConfig;
use crate::{Error, Result};

/// Holds the one browser process shared by every session.
///
/// Explicit and injectable: callers construct a registry over a [`Launcher`]
/// and hand it to [`Session::create`](crate::Session::create); tests
/// substitute a mock launcher.
#[derive(Debug)]
pub struct BrowserRegistry {
    launcher: Arc<dyn Launcher>,
    current: Mutex<Option<Arc<dyn Browser>>>,
}

impl BrowserRegistry {
    /// Create a registry over a launcher
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        BrowserRegistry {
            launcher,
            current: Mutex::new(None),
        }
    }

    /// Get the shared browser process, launching it on first call.
    ///
    /// First call wins: once a process exists, later calls return it and
    /// `config` is ignored even when it differs from what the process was
    /// launched with. Callers wanting different launch flags must
    /// [`reset`](Self::reset) first.
    pub async fn acquire(&self, config: &LaunchConfig) -> Result<Arc<dyn Browser>> {
        let mut slot = self.current.lock().await;

        if let Some(browser) = slot.as_ref() {
            debug!("Reusing running browser process");
            return Ok(Arc::clone(browser));
        }

        info!(
            headless = config.headless,
            sandbox = config.sandbox,
            "Launching browser process"
        );
        let browser = self.launcher.launch(config).await.map_err(Error::process)?;
        *slot = Some(Arc::clone(&browser));

        Ok(browser)
    }

    /// Terminate the current process, if any, and clear the slot so the
    /// next [`acquire`](Self::acquire) launches fresh.
    ///
    /// The slot is cleared even when termination fails, so a wedged process
    /// cannot block future launches.
    pub async fn reset(&self) -> Result<()> {
        let mut slot = self.current.lock().await;

        if let Some(browser) = slot.take() {
            info!("Resetting browser process");
            if let Err(err) = browser.close().await {
                warn!(error = %err, "Browser terminate reported failure");
                return Err(Error::process(err));
            }
        }

        Ok(())
    }

    /// Whether a live process is currently registered
    pub async fn is_running(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|browser| browser.is_alive())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::MockLauncher;
    use crate::bridge::TransportError;

    fn create_test_registry() -> (Arc<BrowserRegistry>, Arc<MockLauncher>) {
        let launcher = Arc::new(MockLauncher::new());
        let registry = Arc::new(BrowserRegistry::new(launcher.clone()));
        (registry, launcher)
    }

    #[tokio::test]
    async fn test_acquire_launches_once() {
        let (registry, launcher) = create_test_registry();

        let first = registry
            .acquire(&LaunchConfig::default())
            .await
            .expect("Failed to acquire browser");
        let second = registry
            .acquire(&LaunchConfig::default())
            .await
            .expect("Failed to acquire browser");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(launcher.launch_count(), 1);
    }

    #[tokio::test]
    async fn test_first_call_wins_over_config() {
        let (registry, launcher) = create_test_registry();

        registry
            .acquire(&LaunchConfig::default())
            .await
            .expect("Failed to acquire browser");
        // Different config is ignored once a process exists
        registry
            .acquire(&LaunchConfig::debug())
            .await
            .expect("Failed to acquire browser");

        assert_eq!(launcher.launch_count(), 1);
        assert_eq!(
            launcher.last_config().expect("no launch recorded").headless,
            true
        );
    }

    #[tokio::test]
    async fn test_reset_terminates_and_relaunches() {
        let (registry, launcher) = create_test_registry();

        let browser = registry
            .acquire(&LaunchConfig::default())
            .await
            .expect("Failed to acquire browser");
        assert!(registry.is_running().await);

        registry.reset().await.expect("Failed to reset");
        assert!(!browser.is_alive());
        assert!(!registry.is_running().await);

        registry
            .acquire(&LaunchConfig::default())
            .await
            .expect("Failed to acquire browser");
        assert_eq!(launcher.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_without_process_is_noop() {
        let (registry, launcher) = create_test_registry();

        registry.reset().await.expect("Failed to reset");
        assert_eq!(launcher.launch_count(), 0);
    }

    #[tokio::test]
    async fn test_launch_failure_surfaces_as_process_error() {
        let (registry, launcher) = create_test_registry();
        launcher.fail_with(TransportError::command("browser binary not found"));

        let err = registry
            .acquire(&LaunchConfig::default())
            .await
            .expect_err("launch failure must surface");
        assert!(matches!(err, Error::Process(_)));

        // The slot stays empty, so the next acquire launches normally
        assert!(!registry.is_running().await);
        registry
            .acquire(&LaunchConfig::default())
            .await
            .expect("Failed to acquire browser");
        assert_eq!(launcher.launch_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_launches_one_process() {
        let (registry, launcher) = create_test_registry();
        let mut handles = Vec::new();

        for _ in 0..10 {
            let registry_clone = registry.clone();
            handles.push(tokio::spawn(async move {
                registry_clone.acquire(&LaunchConfig::default()).await
            }));
        }

        for handle in handles {
            handle.await.unwrap().expect("Failed to acquire browser");
        }

        assert_eq!(launcher.launch_count(), 1);
    }
}
