pub mod engine;
pub mod extractor;
pub mod http_ocr;
pub mod parser;
pub mod preprocessing;
#[cfg(feature = "tesseract")]
pub mod tesseract;

// Re-export main types
pub use engine::{OcrEngine, OcrError, PageSegMode, RecognitionConfig};
pub use extractor::{majority_vote, NumberExtractor};
pub use http_ocr::HttpOcrClient;
pub use parser::{parse_value, parse_value_with_strategy, ParseStrategy};
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractEngine;
