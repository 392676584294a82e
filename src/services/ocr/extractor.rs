use std::sync::Arc;

use image::{DynamicImage, GrayImage};
use tracing::debug;

use super::engine::{OcrEngine, PageSegMode, RecognitionConfig};
use super::parser::{digit_runs, parse_value};
use super::preprocessing::{
    prepare_all, scale, to_grayscale, Preprocessing, FALLBACK_METHODS, PRIMARY_METHODS,
};
use crate::models::reading::{CandidateReading, ExtractedValue, Extraction};
use crate::models::region::Region;
use crate::services::screen_capture::FrameSource;

/// Upscaling factors tried by the primary pass, smallest first
pub const UPSCALE_FACTORS: [u32; 3] = [3, 5, 8];

/// Recognizer configurations tried at every scale of the primary pass
pub const PRIMARY_CONFIGS: [RecognitionConfig; 3] = [
    RecognitionConfig::digits(PageSegMode::SingleWord),
    RecognitionConfig::digits(PageSegMode::SingleLine),
    RecognitionConfig::digits(PageSegMode::SingleBlock),
];

const FALLBACK_DIGITS: RecognitionConfig = RecognitionConfig::digits(PageSegMode::SingleWord);
const FALLBACK_FREE_FORM: RecognitionConfig = RecognitionConfig::free_form(PageSegMode::SingleLine);

/// Shortest digit run salvaged from free-form text
const MIN_SALVAGED_DIGITS: usize = 3;

/// Default sanity floor rejecting one and two digit noise
pub const DEFAULT_LOWER_BOUND: u32 = 100;

/// Outcome of running every scale/config of one preprocessing method
struct MethodPass {
    accepted: Option<u32>,
    raw_values: Vec<u32>,
}

/// Turns a captured frame into a voted metric value
pub struct NumberExtractor {
    engine: Arc<dyn OcrEngine>,
    lower_bound: u32,
}

impl NumberExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, lower_bound: u32) -> Self {
        Self {
            engine,
            lower_bound,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Capture a region and extract its value, re-capturing for the fallback pass
    ///
    /// Missing region and capture failures degrade to `Unknown`.
    pub fn read_region(
        &self,
        source: &dyn FrameSource,
        region: Option<&Region>,
        max_value: u32,
    ) -> Extraction {
        let Some(region) = region else {
            debug!("No region configured");
            return Extraction::default();
        };

        let frame = match source.capture(region) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Capture of {} failed: {}", region, e);
                return Extraction::default();
            }
        };

        let primary = self.extract(&frame, max_value);
        if primary.value.is_known() {
            return primary;
        }

        debug!("Primary pass found nothing, trying fallback strategies");
        let frame = match source.capture(region) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Fallback re-capture of {} failed: {}", region, e);
                return primary;
            }
        };

        let mut fallback = self.extract_fallback(&frame, max_value);
        let mut candidates = primary.candidates;
        candidates.append(&mut fallback.candidates);
        Extraction {
            value: fallback.value,
            candidates,
        }
    }

    /// Primary multi-method pass with voting
    ///
    /// Always returns `Unknown` or a value in `[1, max_value]`.
    pub fn extract(&self, frame: &DynamicImage, max_value: u32) -> Extraction {
        let mut candidates = Vec::new();
        if max_value == 0 || frame.width() == 0 || frame.height() == 0 {
            debug!("Nothing to extract (frame {}x{}, max {})", frame.width(), frame.height(), max_value);
            return Extraction::default();
        }

        let gray = to_grayscale(frame);
        let prepared = prepare_all(&gray, &PRIMARY_METHODS);

        let mut valid_results: Vec<u32> = Vec::new();
        let mut raw_results: Vec<u32> = Vec::new();

        for (method, image) in &prepared {
            let pass = self.run_method(*method, image, max_value, &mut candidates);
            raw_results.extend(pass.raw_values);

            if let Some(value) = pass.accepted.filter(|v| (1..=max_value).contains(v)) {
                debug!("{} accepted {}", method.id(), value);
                valid_results.push(value);

                if valid_results.len() >= 2 {
                    let voted = majority_vote(&valid_results);
                    debug!("Voting over {:?} -> {:?}", valid_results, voted);
                    return Extraction {
                        value: voted.into(),
                        candidates,
                    };
                }
            }
        }

        if let Some(&single) = valid_results.first() {
            debug!("Single valid result: {}", single);
            return Extraction {
                value: ExtractedValue::Known(single),
                candidates,
            };
        }

        let loose: Vec<u32> = raw_results
            .into_iter()
            .filter(|v| (self.lower_bound.max(1)..=max_value).contains(v))
            .collect();
        let value = majority_vote(&loose);
        debug!("No method accepted a value, raw vote -> {:?}", value);

        Extraction {
            value: value.into(),
            candidates,
        }
    }

    /// Minimal-preprocessing pass for frames the primary pass could not read
    pub fn extract_fallback(&self, frame: &DynamicImage, max_value: u32) -> Extraction {
        let mut candidates = Vec::new();
        if max_value == 0 || frame.width() == 0 || frame.height() == 0 {
            return Extraction::default();
        }

        let gray = to_grayscale(frame);
        let prepared = prepare_all(&gray, &FALLBACK_METHODS);

        for (method, image) in &prepared {
            let Some(text) = self.recognize(*method, image, &FALLBACK_DIGITS) else {
                continue;
            };
            let parsed = parse_value(&text, max_value);
            candidates.push(candidate(*method, &FALLBACK_DIGITS, parsed, text));

            if let Some(value) = parsed.filter(|v| (1..=max_value).contains(v)) {
                debug!("Fallback {} succeeded: {}", method.id(), value);
                return Extraction {
                    value: ExtractedValue::Known(value),
                    candidates,
                };
            }
        }

        for (method, image) in &prepared {
            let Some(text) = self.recognize(*method, image, &FALLBACK_FREE_FORM) else {
                continue;
            };
            let salvaged = digit_runs(&text, MIN_SALVAGED_DIGITS)
                .into_iter()
                .find(|v| (1..=max_value).contains(v));
            candidates.push(candidate(*method, &FALLBACK_FREE_FORM, salvaged, text));

            if let Some(value) = salvaged {
                debug!("Salvaged {} from corrupted text via {}", value, method.id());
                return Extraction {
                    value: ExtractedValue::Known(value),
                    candidates,
                };
            }
        }

        debug!("All fallback strategies failed");
        Extraction {
            value: ExtractedValue::Unknown,
            candidates,
        }
    }

    /// Every scale and config for one method, stopping at the first accepted value
    fn run_method(
        &self,
        method: Preprocessing,
        image: &GrayImage,
        max_value: u32,
        candidates: &mut Vec<CandidateReading>,
    ) -> MethodPass {
        let mut raw_values = Vec::new();

        for factor in UPSCALE_FACTORS {
            let scaled = scale(image, factor);
            for config in &PRIMARY_CONFIGS {
                let Some(text) = self.recognize(method, &scaled, config) else {
                    continue;
                };
                debug!("{} x{} {}: '{}'", method.id(), factor, config.label(), text);

                let parsed = parse_value(&text, max_value);
                candidates.push(CandidateReading {
                    method_id: format!("{}@x{}/{}", method.id(), factor, config.label()),
                    parsed_value: parsed,
                    raw_text: text,
                });

                let Some(value) = parsed else { continue };
                raw_values.push(value);
                if (self.lower_bound..=max_value).contains(&value) {
                    return MethodPass {
                        accepted: Some(value),
                        raw_values,
                    };
                }
            }
        }

        MethodPass {
            accepted: None,
            raw_values,
        }
    }

    /// One recognizer call; errors and empty text both yield `None`
    fn recognize(
        &self,
        method: Preprocessing,
        image: &GrayImage,
        config: &RecognitionConfig,
    ) -> Option<String> {
        match self.engine.recognize(image, config) {
            Ok(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Err(e) => {
                debug!("{} {} failed: {}", method.id(), config.label(), e);
                None
            }
        }
    }
}

fn candidate(
    method: Preprocessing,
    config: &RecognitionConfig,
    parsed_value: Option<u32>,
    raw_text: String,
) -> CandidateReading {
    CandidateReading {
        method_id: format!("{}/{}", method.id(), config.label()),
        parsed_value,
        raw_text,
    }
}

/// Most frequent value; ties go to the value seen first
pub fn majority_vote(values: &[u32]) -> Option<u32> {
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for &value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    // max_by_key keeps the last maximum, so walk the reversed list
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(value, _)| value)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::ocr::engine::OcrError;
    use crate::services::screen_capture::CaptureError;
    use image::{Luma, RgbImage};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fake engine answering with a script, one entry per call, then empty text
    pub(crate) struct ScriptedEngine {
        script: Mutex<VecDeque<Result<String, OcrError>>>,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedEngine {
        pub(crate) fn new(responses: Vec<&str>) -> Self {
            Self {
                script: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing(count: usize) -> Self {
            Self {
                script: Mutex::new(
                    (0..count)
                        .map(|_| Err(OcrError::Recognition("engine down".to_string())))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl OcrEngine for ScriptedEngine {
        fn recognize(&self, _image: &GrayImage, _config: &RecognitionConfig) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Fake source returning the same frame, or failing
    pub(crate) struct StaticSource {
        pub(crate) frame: Option<DynamicImage>,
        pub(crate) captures: AtomicUsize,
    }

    impl FrameSource for StaticSource {
        fn capture(&self, _region: &Region) -> Result<DynamicImage, CaptureError> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            self.frame
                .clone()
                .ok_or_else(|| CaptureError::Capture("no display".to_string()))
        }
    }

    pub(crate) fn digit_frame() -> DynamicImage {
        let img = RgbImage::from_fn(30, 10, |x, _| {
            if x % 4 == 0 {
                image::Rgb([230, 230, 230])
            } else {
                image::Rgb([20, 20, 20])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn extractor(engine: ScriptedEngine) -> (NumberExtractor, Arc<ScriptedEngine>) {
        let engine = Arc::new(engine);
        (NumberExtractor::new(engine.clone(), DEFAULT_LOWER_BOUND), engine)
    }

    /// Number of recognizer calls one primary method makes when nothing is accepted
    const CALLS_PER_METHOD: usize = UPSCALE_FACTORS.len() * PRIMARY_CONFIGS.len();

    // ============================================================
    // Voting
    // ============================================================

    #[test]
    fn test_majority_vote() {
        assert_eq!(majority_vote(&[520, 520, 300]), Some(520));
        assert_eq!(majority_vote(&[300, 520, 520]), Some(520));
        assert_eq!(majority_vote(&[]), None);
    }

    #[test]
    fn test_majority_vote_tie_goes_to_first_seen() {
        assert_eq!(majority_vote(&[300, 520]), Some(300));
        assert_eq!(majority_vote(&[520, 300, 300, 520]), Some(520));
    }

    #[test]
    fn test_two_agreeing_methods_return_early() {
        let (extractor, engine) = extractor(ScriptedEngine::new(vec!["520", "520", "300"]));
        let result = extractor.extract(&digit_frame(), 1000);

        assert_eq!(result.value, ExtractedValue::Known(520));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2, "third method never runs");
        assert_eq!(result.candidates.len(), 2);
    }

    #[test]
    fn test_disagreeing_pair_keeps_first() {
        let (extractor, _) = extractor(ScriptedEngine::new(vec!["300", "520"]));
        assert_eq!(extractor.extract(&digit_frame(), 1000).value, ExtractedValue::Known(300));
    }

    #[test]
    fn test_single_valid_method_is_returned() {
        // First method reads nothing at every scale/config, second reads 864
        let mut script = vec![""; CALLS_PER_METHOD];
        script.push("864");
        let (extractor, _) = extractor(ScriptedEngine::new(script));

        let result = extractor.extract(&digit_frame(), 1425);
        assert_eq!(result.value, ExtractedValue::Known(864));
    }

    #[test]
    fn test_method_stops_at_first_accepted_scale() {
        // 42 is below the sanity floor, the next config reads 1067
        let (extractor, _) = extractor(ScriptedEngine::new(vec!["42", "1067"]));
        let result = extractor.extract(&digit_frame(), 1425);

        assert_eq!(result.value, ExtractedValue::Known(1067));
        assert_eq!(result.candidates[0].raw_text, "42");
        assert_eq!(result.candidates[0].parsed_value, None);
        assert_eq!(result.candidates[1].parsed_value, Some(1067));
    }

    // ============================================================
    // Range invariant
    // ============================================================

    #[test]
    fn test_out_of_range_values_are_unknown() {
        let script = vec!["9999"; CALLS_PER_METHOD * PRIMARY_METHODS.len()];
        let (extractor, _) = extractor(ScriptedEngine::new(script));

        let result = extractor.extract(&digit_frame(), 1425);
        assert_eq!(result.value, ExtractedValue::Unknown);
        assert!(!result.candidates.is_empty(), "attempts are still reported");
    }

    #[test]
    fn test_result_always_in_range() {
        for text in ["S64", "86 4", "1500", "99", "0000", "HP 700/1000", "l23"] {
            let (extractor, _) = extractor(ScriptedEngine::new(vec![text; 64]));
            let result = extractor.extract(&digit_frame(), 1000);
            if let ExtractedValue::Known(v) = result.value {
                assert!((1..=1000).contains(&v), "{} produced {}", text, v);
            }
        }
    }

    #[test]
    fn test_engine_errors_degrade_to_unknown() {
        let (extractor, engine) = extractor(ScriptedEngine::failing(1000));
        let result = extractor.extract(&digit_frame(), 1425);

        assert_eq!(result.value, ExtractedValue::Unknown);
        assert_eq!(
            engine.calls.load(Ordering::SeqCst),
            CALLS_PER_METHOD * PRIMARY_METHODS.len()
        );
    }

    #[test]
    fn test_empty_frame_and_zero_max() {
        let (extractor, engine) = extractor(ScriptedEngine::new(vec!["500"]));
        let empty = DynamicImage::ImageLuma8(GrayImage::from_pixel(0, 0, Luma([0u8])));

        assert_eq!(extractor.extract(&empty, 1000).value, ExtractedValue::Unknown);
        assert_eq!(extractor.extract(&digit_frame(), 0).value, ExtractedValue::Unknown);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    // ============================================================
    // Fallback pass
    // ============================================================

    fn extractor_with(script: Vec<&str>) -> (NumberExtractor, Arc<ScriptedEngine>) {
        extractor(ScriptedEngine::new(script))
    }

    #[test]
    fn test_fallback_digit_pass() {
        let (extractor, _) = extractor_with(vec!["", "812"]);
        let result = extractor.extract_fallback(&digit_frame(), 1000);

        assert_eq!(result.value, ExtractedValue::Known(812));
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].method_id, "inv_midpoint/psm8");
    }

    #[test]
    fn test_fallback_has_no_sanity_floor() {
        let (extractor, _) = extractor_with(vec!["050"]);
        let result = extractor.extract_fallback(&digit_frame(), 1000);
        assert_eq!(result.value, ExtractedValue::Known(50));
    }

    #[test]
    fn test_fallback_salvages_digits_from_free_form_text() {
        // Three digit-only passes fail, then free-form text carries a usable run
        let (extractor, _) = extractor_with(vec!["", "", "", "HP ~ 12 / 745 ."]);
        let result = extractor.extract_fallback(&digit_frame(), 1000);

        assert_eq!(result.value, ExtractedValue::Known(745));
        let last = result.candidates.last().unwrap();
        assert_eq!(last.method_id, "midpoint/psm7-free");
    }

    #[test]
    fn test_fallback_salvage_respects_max() {
        let (extractor, _) = extractor_with(vec!["", "", "", "5000", "5000", "5000"]);
        let result = extractor.extract_fallback(&digit_frame(), 1000);
        assert_eq!(result.value, ExtractedValue::Unknown);
    }

    // ============================================================
    // Region reading
    // ============================================================

    #[test]
    fn test_read_region_without_region_is_unknown() {
        let (extractor, _) = extractor_with(vec!["500"]);
        let source = StaticSource {
            frame: Some(digit_frame()),
            captures: AtomicUsize::new(0),
        };

        let result = extractor.read_region(&source, None, 1000);
        assert_eq!(result.value, ExtractedValue::Unknown);
        assert_eq!(source.captures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_read_region_capture_failure_is_unknown() {
        let (extractor, _) = extractor_with(vec!["500"]);
        let source = StaticSource {
            frame: None,
            captures: AtomicUsize::new(0),
        };

        let region = Region::new(0, 0, 30, 10);
        assert_eq!(
            extractor.read_region(&source, Some(&region), 1000).value,
            ExtractedValue::Unknown
        );
    }

    #[test]
    fn test_read_region_recaptures_for_fallback() {
        // Primary pass reads nothing; fallback's first digit pass reads 640
        let mut script = vec![""; CALLS_PER_METHOD * PRIMARY_METHODS.len()];
        script.push("640");
        let (extractor, _) = extractor_with(script);
        let source = StaticSource {
            frame: Some(digit_frame()),
            captures: AtomicUsize::new(0),
        };

        let region = Region::new(0, 0, 30, 10);
        let result = extractor.read_region(&source, Some(&region), 1000);

        assert_eq!(result.value, ExtractedValue::Known(640));
        assert_eq!(source.captures.load(Ordering::SeqCst), 2);
        assert_eq!(result.candidates.len(), 1, "empty reads are not candidates");
    }
}
