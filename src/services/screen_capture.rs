use crate::models::region::Region;
use image::DynamicImage;
use tracing::debug;
use xcap::Monitor;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Monitor unavailable: {0}")]
    Monitor(String),
    #[error("Failed to capture screen: {0}")]
    Capture(String),
    #[error("Region {0} lies outside the screen")]
    OutOfBounds(Region),
}

/// Anything that can produce a frame for a screen region
pub trait FrameSource {
    fn capture(&self, region: &Region) -> Result<DynamicImage, CaptureError>;
}

/// Screen capture service using xcap
pub struct ScreenCapture {
    monitor: Monitor,
    scale_factor: f64,
}

impl ScreenCapture {
    /// Create a new screen capture instance using the primary monitor
    pub fn new() -> Result<Self, CaptureError> {
        let monitor = Monitor::all()
            .map_err(|e| CaptureError::Monitor(format!("Failed to get monitors: {}", e)))?
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .ok_or_else(|| CaptureError::Monitor("No primary monitor found".to_string()))?;

        Ok(Self::from_monitor(monitor))
    }

    /// Create screen capture for a specific monitor by index
    pub fn with_monitor(monitor_index: usize) -> Result<Self, CaptureError> {
        let monitor = Monitor::all()
            .map_err(|e| CaptureError::Monitor(format!("Failed to get monitors: {}", e)))?
            .into_iter()
            .nth(monitor_index)
            .ok_or_else(|| CaptureError::Monitor(format!("Monitor index {} not found", monitor_index)))?;

        Ok(Self::from_monitor(monitor))
    }

    /// Primary monitor unless an index is configured
    pub fn open(monitor_index: Option<usize>) -> Result<Self, CaptureError> {
        match monitor_index {
            Some(index) => Self::with_monitor(index),
            None => Self::new(),
        }
    }

    fn from_monitor(monitor: Monitor) -> Self {
        // xcap returns physical pixels; regions are stored in logical ones
        let scale_factor = monitor.scale_factor().unwrap_or(1.0) as f64;
        debug!(
            "Screen capture initialized: {}x{} physical, scale {}",
            monitor.width().unwrap_or(0),
            monitor.height().unwrap_or(0),
            scale_factor
        );

        Self {
            monitor,
            scale_factor,
        }
    }

    /// Capture a specific region of the screen
    /// Region coordinates are in logical pixels, automatically converted to physical pixels
    pub fn capture_region(&self, region: &Region) -> Result<DynamicImage, CaptureError> {
        let rgba_image = self
            .monitor
            .capture_image()
            .map_err(|e| CaptureError::Capture(e.to_string()))?;
        let image = DynamicImage::ImageRgba8(rgba_image);

        let (x, y, width, height) = physical_crop(region, self.scale_factor, image.width(), image.height())
            .ok_or(CaptureError::OutOfBounds(*region))?;

        debug!(
            "Capture {} -> physical ({}, {}, {}, {}) of {}x{}",
            region,
            x,
            y,
            width,
            height,
            image.width(),
            image.height()
        );

        Ok(image.crop_imm(x, y, width, height))
    }
}

impl FrameSource for ScreenCapture {
    fn capture(&self, region: &Region) -> Result<DynamicImage, CaptureError> {
        self.capture_region(region)
    }
}

/// Convert a logical region into a physical crop clamped to the screen
///
/// Returns `None` when nothing of the region is on screen.
pub fn physical_crop(
    region: &Region,
    scale_factor: f64,
    screen_width: u32,
    screen_height: u32,
) -> Option<(u32, u32, u32, u32)> {
    // On 125% scale: logical 100x100 -> physical 125x125
    let x = (region.left.max(0) as f64 * scale_factor) as u32;
    let y = (region.top.max(0) as f64 * scale_factor) as u32;
    let width = (region.width as f64 * scale_factor) as u32;
    let height = (region.height as f64 * scale_factor) as u32;

    let width = width.min(screen_width.saturating_sub(x));
    let height = height.min(screen_height.saturating_sub(y));

    (width > 0 && height > 0).then_some((x, y, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_crop_identity_scale() {
        let region = Region::new(10, 20, 30, 40);
        assert_eq!(physical_crop(&region, 1.0, 1920, 1080), Some((10, 20, 30, 40)));
    }

    #[test]
    fn test_physical_crop_hidpi() {
        let region = Region::new(100, 50, 80, 20);
        assert_eq!(physical_crop(&region, 2.0, 3840, 2160), Some((200, 100, 160, 40)));
        assert_eq!(physical_crop(&region, 1.25, 2400, 1350), Some((125, 62, 100, 25)));
    }

    #[test]
    fn test_physical_crop_clamped_to_screen() {
        let region = Region::new(1870, 1030, 200, 150);
        assert_eq!(physical_crop(&region, 1.0, 1920, 1080), Some((1870, 1030, 50, 50)));
    }

    #[test]
    fn test_physical_crop_off_screen_is_none() {
        let region = Region::new(2000, 0, 100, 100);
        assert_eq!(physical_crop(&region, 1.0, 1920, 1080), None);
        assert_eq!(physical_crop(&Region::new(0, 0, 0, 10), 1.0, 1920, 1080), None);
    }

    #[test]
    fn test_capture_region() {
        let capture = match ScreenCapture::new() {
            Ok(c) => c,
            Err(_) => {
                println!("Skipping test - no display available");
                return;
            }
        };

        let result = capture.capture_region(&Region::new(0, 0, 200, 150));
        if let Err(e) = &result {
            println!("Skipping test - capture not permitted: {}", e);
            return;
        }

        let image = result.unwrap();
        assert!(image.width() > 0);
        assert!(image.height() > 0);
    }
}
