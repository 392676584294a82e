use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::{self, otsu_level, ThresholdType};
use imageproc::filter::gaussian_blur_f32;
use rayon::prelude::*;

/// Cutoff used by the low-contrast fixed threshold
pub const LOW_CUTOFF: u8 = 100;
/// Cutoff used by the high-contrast fixed threshold
pub const HIGH_CUTOFF: u8 = 180;
/// Cutoff used by the fallback pass
pub const MID_CUTOFF: u8 = 127;

/// Gaussian sigma matching an 11px adaptive block
const ADAPTIVE_SIGMA: f32 = 2.0;
/// Offset subtracted from the local mean before comparing
const ADAPTIVE_OFFSET: i16 = 2;

/// Image preparation applied before a recognizer pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocessing {
    /// Global Otsu threshold
    Otsu,
    /// Otsu threshold with inverted polarity
    InvertedOtsu,
    /// Fixed cutoff for dim text
    LowContrast,
    /// Fixed cutoff for bright text
    HighContrast,
    /// Local threshold against a gaussian-weighted neighbourhood mean
    Adaptive,
    /// Fixed mid-gray cutoff
    Midpoint,
    /// Mid-gray cutoff with inverted polarity
    InvertedMidpoint,
    /// Intensity image as-is
    Grayscale,
}

/// Binarizations tried by the primary pass, in order
pub const PRIMARY_METHODS: [Preprocessing; 5] = [
    Preprocessing::Otsu,
    Preprocessing::InvertedOtsu,
    Preprocessing::LowContrast,
    Preprocessing::HighContrast,
    Preprocessing::Adaptive,
];

/// Minimal preparations tried by the fallback pass, in order
pub const FALLBACK_METHODS: [Preprocessing; 3] = [
    Preprocessing::Midpoint,
    Preprocessing::InvertedMidpoint,
    Preprocessing::Grayscale,
];

impl Preprocessing {
    /// Stable identifier used in candidate readings and logs
    pub fn id(&self) -> &'static str {
        match self {
            Preprocessing::Otsu => "otsu",
            Preprocessing::InvertedOtsu => "inv_otsu",
            Preprocessing::LowContrast => "low_contrast",
            Preprocessing::HighContrast => "high_contrast",
            Preprocessing::Adaptive => "adaptive",
            Preprocessing::Midpoint => "midpoint",
            Preprocessing::InvertedMidpoint => "inv_midpoint",
            Preprocessing::Grayscale => "grayscale",
        }
    }

    pub fn apply(&self, gray: &GrayImage) -> GrayImage {
        match self {
            Preprocessing::Otsu => threshold(gray, otsu_level(gray), false),
            Preprocessing::InvertedOtsu => threshold(gray, otsu_level(gray), true),
            Preprocessing::LowContrast => threshold(gray, LOW_CUTOFF, false),
            Preprocessing::HighContrast => threshold(gray, HIGH_CUTOFF, false),
            Preprocessing::Adaptive => adaptive_threshold(gray),
            Preprocessing::Midpoint => threshold(gray, MID_CUTOFF, false),
            Preprocessing::InvertedMidpoint => threshold(gray, MID_CUTOFF, true),
            Preprocessing::Grayscale => gray.clone(),
        }
    }
}

/// Convert a frame to a single-channel intensity image
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Run every preparation on the same intensity image in parallel
///
/// Output order matches `methods`.
pub fn prepare_all(gray: &GrayImage, methods: &[Preprocessing]) -> Vec<(Preprocessing, GrayImage)> {
    methods
        .par_iter()
        .map(|method| (*method, method.apply(gray)))
        .collect()
}

/// Upscale by an integer factor with cubic interpolation
pub fn scale(image: &GrayImage, factor: u32) -> GrayImage {
    let factor = factor.max(1);
    image::imageops::resize(
        image,
        image.width() * factor,
        image.height() * factor,
        FilterType::CatmullRom,
    )
}

/// Binary threshold: pixels strictly above `level` become white
pub fn threshold(gray: &GrayImage, level: u8, invert: bool) -> GrayImage {
    let kind = if invert {
        ThresholdType::BinaryInverted
    } else {
        ThresholdType::Binary
    };
    contrast::threshold(gray, level, kind)
}

/// Adaptive threshold against a gaussian-weighted local mean
pub fn adaptive_threshold(gray: &GrayImage) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, ADAPTIVE_SIGMA);
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let pixel = gray.get_pixel(x, y)[0] as i16;
        let mean = local_mean.get_pixel(x, y)[0] as i16;
        if pixel > mean - ADAPTIVE_OFFSET {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Helper: gradient RGB image
    fn create_test_rgb_image() -> DynamicImage {
        let img = RgbImage::from_fn(100, 50, |x, y| {
            let val = ((x + y) % 256) as u8;
            Rgb([val, val, val])
        });
        DynamicImage::ImageRgb8(img)
    }

    /// Helper: dark background with a bright block, like light-on-dark digits
    fn create_text_like_image() -> GrayImage {
        ImageBuffer::from_fn(40, 20, |x, y| {
            if (10..30).contains(&x) && (5..15).contains(&y) {
                Luma([220u8])
            } else {
                Luma([30u8])
            }
        })
    }

    fn is_binary(img: &GrayImage) -> bool {
        img.pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    #[test]
    fn test_grayscale_preserves_dimensions() {
        let rgb = create_test_rgb_image();
        let gray = to_grayscale(&rgb);
        assert_eq!(gray.dimensions(), (100, 50));
    }

    #[test]
    fn test_upscaling_3x() {
        let gray = create_text_like_image();
        let scaled = scale(&gray, 3);
        assert_eq!(scaled.dimensions(), (120, 60), "Should be tripled");
    }

    #[test]
    fn test_upscaling_zero_factor_keeps_size() {
        let gray = create_text_like_image();
        assert_eq!(scale(&gray, 0).dimensions(), gray.dimensions());
    }

    #[test]
    fn test_fixed_threshold_is_strict() {
        let gray: GrayImage = ImageBuffer::from_fn(3, 1, |x, _| Luma([[99u8, 100, 101][x as usize]]));
        let binary = threshold(&gray, 100, false);
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(1, 0)[0], 0, "equal to cutoff stays black");
        assert_eq!(binary.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_inverted_threshold_is_strict() {
        let gray: GrayImage = ImageBuffer::from_fn(3, 1, |x, _| Luma([[126u8, 127, 128][x as usize]]));
        let binary = threshold(&gray, MID_CUTOFF, true);
        assert_eq!(binary.get_pixel(0, 0)[0], 255);
        assert_eq!(binary.get_pixel(1, 0)[0], 255, "equal to cutoff counts as background");
        assert_eq!(binary.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn test_inverted_threshold_flips_polarity() {
        let gray = create_text_like_image();
        let normal = threshold(&gray, 127, false);
        let inverted = threshold(&gray, 127, true);
        for (a, b) in normal.pixels().zip(inverted.pixels()) {
            assert_eq!(a[0], 255 - b[0]);
        }
    }

    #[test]
    fn test_otsu_separates_text_from_background() {
        let gray = create_text_like_image();
        let binary = Preprocessing::Otsu.apply(&gray);
        assert!(is_binary(&binary));
        assert_eq!(binary.get_pixel(20, 10)[0], 255, "text pixel should be white");
        assert_eq!(binary.get_pixel(0, 0)[0], 0, "background should be black");

        let inverted = Preprocessing::InvertedOtsu.apply(&gray);
        assert_eq!(inverted.get_pixel(20, 10)[0], 0);
        assert_eq!(inverted.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_adaptive_threshold_is_binary() {
        let rgb = create_test_rgb_image();
        let gray = to_grayscale(&rgb);
        let binary = Preprocessing::Adaptive.apply(&gray);
        assert!(is_binary(&binary));
        assert_eq!(binary.dimensions(), gray.dimensions());
    }

    #[test]
    fn test_every_primary_method_is_binary() {
        let gray = create_text_like_image();
        for method in PRIMARY_METHODS {
            assert!(is_binary(&method.apply(&gray)), "{} not binary", method.id());
        }
    }

    #[test]
    fn test_grayscale_method_is_identity() {
        let gray = create_text_like_image();
        assert_eq!(Preprocessing::Grayscale.apply(&gray), gray);
    }

    #[test]
    fn test_prepare_all_keeps_order() {
        let gray = create_text_like_image();
        let prepared = prepare_all(&gray, &PRIMARY_METHODS);
        let order: Vec<_> = prepared.iter().map(|(m, _)| *m).collect();
        assert_eq!(order, PRIMARY_METHODS.to_vec());
    }

    #[test]
    fn test_method_ids_are_unique() {
        let mut ids: Vec<_> = PRIMARY_METHODS
            .iter()
            .chain(FALLBACK_METHODS.iter())
            .map(|m| m.id())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), PRIMARY_METHODS.len() + FALLBACK_METHODS.len());
    }
}
