use image::GrayImage;
use serde::Serialize;

/// Characters allowed when a pass is restricted to digits
pub const DIGIT_WHITELIST: &str = "0123456789";

/// Page layout hint passed to the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// Treat the image as a single word
    SingleWord,
    /// Treat the image as a single text line
    SingleLine,
    /// Treat the image as a uniform block of text
    SingleBlock,
}

impl PageSegMode {
    /// Numeric tesseract page segmentation mode
    pub fn psm(&self) -> u8 {
        match self {
            PageSegMode::SingleBlock => 6,
            PageSegMode::SingleLine => 7,
            PageSegMode::SingleWord => 8,
        }
    }
}

/// Options for one recognizer invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionConfig {
    pub mode: PageSegMode,
    pub digits_only: bool,
}

impl RecognitionConfig {
    pub const fn digits(mode: PageSegMode) -> Self {
        Self {
            mode,
            digits_only: true,
        }
    }

    pub const fn free_form(mode: PageSegMode) -> Self {
        Self {
            mode,
            digits_only: false,
        }
    }

    /// Short label for logs and candidate ids, e.g. `psm8` or `psm7-free`
    pub fn label(&self) -> String {
        if self.digits_only {
            format!("psm{}", self.mode.psm())
        } else {
            format!("psm{}-free", self.mode.psm())
        }
    }

    pub fn whitelist(&self) -> Option<&'static str> {
        self.digits_only.then_some(DIGIT_WHITELIST)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    Unavailable(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Recognition failed: {0}")]
    Recognition(String),
}

/// OCR Engine trait - abstraction for different OCR implementations
pub trait OcrEngine: Send + Sync {
    /// Recognize text in a prepared single-channel image
    fn recognize(&self, image: &GrayImage, config: &RecognitionConfig) -> Result<String, OcrError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Encode a grayscale image as PNG bytes for backends that take files
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, OcrError> {
    let mut bytes: Vec<u8> = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| OcrError::Encode(e.to_string()))?;
    Ok(bytes)
}
