use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::services::ocr::{HttpOcrClient, OcrError};

/// Delay between health checks while a launched server boots
const READY_POLL: Duration = Duration::from_millis(500);

/// OCR server manager
///
/// Makes sure the HTTP OCR server answers before monitoring starts. A server
/// launched here is killed again when the manager is dropped.
pub struct OcrServerManager {
    process: Option<Child>,
    base_url: String,
}

impl OcrServerManager {
    /// Use the running server, or start `command` and wait for it
    ///
    /// Fails when nothing answers and no command is configured.
    pub fn ensure_running(
        client: &HttpOcrClient,
        command: &[String],
        startup_timeout: Duration,
    ) -> Result<Self, OcrError> {
        let base_url = client.base_url().to_string();

        // Check if already running
        if client.health_check().is_ok() {
            debug!("OCR server already running at {}", base_url);
            return Ok(Self {
                process: None,
                base_url,
            });
        }

        let Some((program, args)) = command.split_first() else {
            return Err(OcrError::Unavailable(format!(
                "No OCR server answering at {} and no ocr.server_command configured to start one",
                base_url
            )));
        };

        info!("Starting OCR server: {}", command.join(" "));
        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| OcrError::Unavailable(format!("Failed to start OCR server '{}': {}", program, e)))?;

        // Dropping on error kills the child
        let mut manager = Self {
            process: Some(child),
            base_url,
        };
        manager.wait_for_ready(client, startup_timeout)?;
        Ok(manager)
    }

    fn wait_for_ready(&mut self, client: &HttpOcrClient, timeout: Duration) -> Result<(), OcrError> {
        let deadline = Instant::now() + timeout;

        for attempt in 1.. {
            if client.health_check().is_ok() {
                info!("OCR server ready after {} attempts", attempt);
                return Ok(());
            }

            if let Some(child) = self.process.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    self.process = None;
                    return Err(OcrError::Unavailable(format!(
                        "OCR server exited during startup ({})",
                        status
                    )));
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            debug!("Waiting for OCR server... (attempt {})", attempt);
            thread::sleep(READY_POLL.min(remaining));
        }

        Err(OcrError::Unavailable(format!(
            "OCR server at {} not ready within {:.1}s",
            self.base_url,
            timeout.as_secs_f64()
        )))
    }

    /// Whether this manager launched the server itself
    pub fn is_managed(&self) -> bool {
        self.process.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Kill a server started by this manager
    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            match child.kill().and_then(|_| child.wait()) {
                Ok(_) => info!("OCR server stopped"),
                Err(e) => warn!("Failed to stop OCR server: {}", e),
            }
        }
    }
}

impl Drop for OcrServerManager {
    fn drop(&mut self) {
        self.stop();
    }
}
