use image::GrayImage;
use tesseract::{PageSegMode as TessPsm, Tesseract};

use super::engine::{encode_png, OcrEngine, OcrError, PageSegMode, RecognitionConfig};

/// Tesseract OCR engine implementation
pub struct TesseractEngine {
    // Tesseract instance is created per-call for thread safety
    language: String,
}

impl TesseractEngine {
    /// Create a new engine after checking the language data is installed
    pub fn new(language: &str) -> Result<Self, OcrError> {
        if !Self::is_available(language) {
            return Err(OcrError::Unavailable(format!(
                "Tesseract with language '{}' not available on system",
                language
            )));
        }

        Ok(Self {
            language: language.to_string(),
        })
    }

    pub fn is_available(language: &str) -> bool {
        Tesseract::new(None, Some(language)).is_ok()
    }

    fn page_seg_mode(mode: PageSegMode) -> TessPsm {
        match mode {
            PageSegMode::SingleWord => TessPsm::PsmSingleWord,
            PageSegMode::SingleLine => TessPsm::PsmSingleLine,
            PageSegMode::SingleBlock => TessPsm::PsmSingleBlock,
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &GrayImage, config: &RecognitionConfig) -> Result<String, OcrError> {
        let png = encode_png(image)?;

        let mut tesseract = Tesseract::new(None, Some(&self.language))
            .map_err(|e| OcrError::Unavailable(format!("Failed to create Tesseract instance: {}", e)))?;

        tesseract.set_page_seg_mode(Self::page_seg_mode(config.mode));

        if let Some(whitelist) = config.whitelist() {
            tesseract = tesseract
                .set_variable("tessedit_char_whitelist", whitelist)
                .map_err(|e| OcrError::Recognition(format!("Failed to set whitelist: {}", e)))?;
        }

        let text = tesseract
            .set_image_from_mem(&png)
            .map_err(|e| OcrError::Recognition(format!("Failed to set image: {}", e)))?
            .get_text()
            .map_err(|e| OcrError::Recognition(format!("Failed to recognize text: {}", e)))?;

        Ok(text.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}
