use std::thread;
use std::time::Duration;

use super::{build_engine, CommandContext};
use crate::models::reading::{Extraction, Metric};
use crate::services::ocr::NumberExtractor;
use crate::services::region_store::region_for;
use crate::services::screen_capture::ScreenCapture;

/// Pause between probe samples
const SAMPLE_DELAY: Duration = Duration::from_millis(300);

/// Read a metric's region several times and print every attempt
pub async fn probe(context: &CommandContext, metric: Metric, samples: u32) -> Result<(), String> {
    let config = context.load_config()?;
    let metric_config = config.metric(metric);
    metric_config.validate(metric)?;
    let max_value = metric_config.max_value;

    let regions = context.region_store(&config).load().map_err(|e| e.to_string())?;
    let region = region_for(&regions, metric).copied().ok_or_else(|| {
        format!("No {} region configured; use `regions set {} ...` first", metric, metric)
    })?;

    println!("Probing {} region {} ({} samples, max {})", metric, region, samples, max_value);

    let detected = tokio::task::spawn_blocking(move || -> Result<u32, String> {
        let (engine, _server) = build_engine(&config.ocr)?;
        let source = ScreenCapture::open(config.capture.monitor_index).map_err(|e| e.to_string())?;
        let extractor = NumberExtractor::new(engine, config.ocr.lower_bound);

        let mut detected = 0;
        for sample in 1..=samples {
            let extraction = extractor.read_region(&source, Some(&region), max_value);
            if extraction.value.is_known() {
                detected += 1;
            }
            print!("{}", format_sample(sample, &extraction, max_value));

            if sample < samples {
                thread::sleep(SAMPLE_DELAY);
            }
        }
        Ok(detected)
    })
    .await
    .map_err(|e| format!("Probe thread failed: {}", e))??;

    println!("Detected a value in {}/{} samples", detected, samples);
    Ok(())
}

/// Render one sample with its candidate readings
fn format_sample(sample: u32, extraction: &Extraction, max_value: u32) -> String {
    let mut out = match extraction.value.known() {
        Some(value) => format!(
            "Sample {}: {} / {} ({:.1}%)\n",
            sample,
            value,
            max_value,
            value as f64 / max_value as f64 * 100.0
        ),
        None => format!("Sample {}: N/A\n", sample),
    };

    for candidate in &extraction.candidates {
        let parsed = candidate
            .parsed_value
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        out.push_str(&format!(
            "    {:<24} {:>6}  {:?}\n",
            candidate.method_id, parsed, candidate.raw_text
        ));
    }
    out
}
