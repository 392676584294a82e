pub mod config;
pub mod probe;
pub mod regions;
pub mod run;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::models::config::{AppConfig, OcrBackend, OcrConfig};
use crate::services::config::ConfigManager;
use crate::services::ocr::{HttpOcrClient, OcrEngine};
use crate::services::ocr_server::OcrServerManager;
use crate::services::region_store::RegionStore;

/// Shared state every subcommand starts from
pub struct CommandContext {
    manager: ConfigManager,
}

impl CommandContext {
    /// Use `config_path` when given, the platform config file otherwise
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, String> {
        let manager = match config_path {
            Some(path) => ConfigManager::with_path(path),
            None => ConfigManager::new().map_err(|e| e.to_string())?,
        };
        debug!("Using config file {}", manager.config_file_path().display());
        Ok(Self { manager })
    }

    pub fn manager(&self) -> &ConfigManager {
        &self.manager
    }

    pub fn load_config(&self) -> Result<AppConfig, String> {
        self.manager.load().map_err(|e| e.to_string())
    }

    pub fn region_store(&self, config: &AppConfig) -> RegionStore {
        RegionStore::new(&config.regions_file)
    }
}

/// OCR backend plus the server it talks to, if this process started one
pub type OcrSetup = (Arc<dyn OcrEngine>, Option<OcrServerManager>);

/// Build the configured OCR backend
///
/// Must run on a blocking thread: the HTTP backend owns a blocking client.
/// Fails when the HTTP server neither answers nor can be started. Keep the
/// returned manager alive for as long as the engine is used.
pub fn build_engine(config: &OcrConfig) -> Result<OcrSetup, String> {
    match config.backend {
        OcrBackend::Http => {
            let client = HttpOcrClient::new(&config.server_url, Duration::from_millis(config.timeout_ms))
                .map_err(|e| e.to_string())?;
            let server = OcrServerManager::ensure_running(
                &client,
                &config.server_command,
                Duration::from_millis(config.server_startup_ms),
            )
            .map_err(|e| e.to_string())?;
            Ok((Arc::new(client), Some(server)))
        }
        #[cfg(feature = "tesseract")]
        OcrBackend::Tesseract => {
            let engine = crate::services::ocr::TesseractEngine::new(&config.language)
                .map_err(|e| e.to_string())?;
            Ok((Arc::new(engine), None))
        }
        #[cfg(not(feature = "tesseract"))]
        OcrBackend::Tesseract => {
            Err("Tesseract backend requested but this build lacks the `tesseract` feature".to_string())
        }
    }
}
