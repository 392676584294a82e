use super::engine::{encode_png, OcrEngine, OcrError, RecognitionConfig};
use base64::{engine::general_purpose, Engine as _};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP OCR client that talks to a local OCR server
///
/// The server exposes `POST /ocr` taking a base64 PNG plus page segmentation
/// hints and answering with recognized text boxes. `OcrServerManager` starts
/// one when nothing answers on `GET /health`.
pub struct HttpOcrClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Serialize)]
struct OcrRequest<'a> {
    image_base64: String,
    psm: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    whitelist: Option<&'a str>,
}

/// Single text box with bounding box corner points
#[derive(Deserialize, Clone, Debug)]
struct TextBox {
    #[serde(rename = "box")]
    bbox: Vec<Vec<f64>>,
    text: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    boxes: Vec<TextBox>,
    #[serde(default)]
    raw_text: String,
}

impl TextBox {
    /// (x_min, y_min, x_max, y_max)
    fn rect(&self) -> (f64, f64, f64, f64) {
        let xs = self.bbox.iter().filter_map(|p| p.first().copied());
        let ys = self.bbox.iter().filter_map(|p| p.get(1).copied());

        let (x_min, x_max) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let (y_min, y_max) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

        (x_min, y_min, x_max, y_max)
    }

    fn left_x(&self) -> f64 {
        self.rect().0
    }

    fn area(&self) -> f64 {
        let (x_min, y_min, x_max, y_max) = self.rect();
        ((x_max - x_min) * (y_max - y_min)).max(0.0)
    }

    /// Intersection over union with another box
    fn iou(&self, other: &TextBox) -> f64 {
        let (ax0, ay0, ax1, ay1) = self.rect();
        let (bx0, by0, bx1, by1) = other.rect();

        let iw = (ax1.min(bx1) - ax0.max(bx0)).max(0.0);
        let ih = (ay1.min(by1) - ay0.max(by0)).max(0.0);
        let inter = iw * ih;
        let union = self.area() + other.area() - inter;

        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

impl HttpOcrClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OcrError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if server is reachable
    pub fn health_check(&self) -> Result<(), OcrError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| OcrError::Unavailable(format!("Health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(OcrError::Unavailable(format!(
                "Health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Drop boxes overlapping a larger one by more than `iou_threshold`
    fn filter_overlapping_boxes(mut boxes: Vec<TextBox>, iou_threshold: f64) -> Vec<TextBox> {
        // Largest last so pop() visits them first
        boxes.sort_by(|a, b| a.area().total_cmp(&b.area()));

        let mut kept: Vec<TextBox> = Vec::with_capacity(boxes.len());
        while let Some(current) = boxes.pop() {
            boxes.retain(|other| current.iou(other) <= iou_threshold);
            kept.push(current);
        }
        kept
    }

    /// Filter overlapping boxes, sort left-to-right and concatenate
    fn join_boxes(boxes: Vec<TextBox>) -> String {
        let mut filtered = Self::filter_overlapping_boxes(boxes, 0.3);
        filtered.sort_by(|a, b| a.left_x().total_cmp(&b.left_x()));
        filtered.iter().map(|b| b.text.trim()).collect::<Vec<_>>().join("")
    }

    fn text_from_response(data: OcrResponse) -> String {
        if data.boxes.is_empty() {
            data.raw_text.trim().to_string()
        } else {
            Self::join_boxes(data.boxes)
        }
    }
}

impl OcrEngine for HttpOcrClient {
    fn recognize(&self, image: &GrayImage, config: &RecognitionConfig) -> Result<String, OcrError> {
        let png = encode_png(image)?;
        let request = OcrRequest {
            image_base64: general_purpose::STANDARD.encode(&png),
            psm: config.mode.psm(),
            whitelist: config.whitelist(),
        };

        let url = format!("{}/ocr", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| OcrError::Recognition(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OcrError::Recognition(format!(
                "OCR server error: {}",
                error_text
            )));
        }

        let data: OcrResponse = response
            .json()
            .map_err(|e| OcrError::Recognition(format!("Failed to parse response: {}", e)))?;

        Ok(Self::text_from_response(data))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
