//! 黑屏判定：统计区域内低亮度像素占比

use image::GrayImage;

use super::error::ZapError;
use super::frame::{AnalysisRegion, DecodedFrame};
use super::scan::{FrameSignal, TransitionDetector};
use crate::api::models::zapping::DetectionMethod;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackscreenConfig {
    /// 黑像素占比阈值，`ratio >= threshold` 即为黑屏
    pub threshold: f32,
    /// 亮度低于等于该值的像素视为黑色 (0-255)
    pub luma_cutoff: u8,
}

impl Default for BlackscreenConfig {
    fn default() -> Self {
        Self {
            threshold: 0.9,
            luma_cutoff: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackscreenOutcome {
    pub black_ratio: f32,
    pub is_black: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BlackscreenClassifier {
    config: BlackscreenConfig,
}

impl BlackscreenClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BlackscreenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BlackscreenConfig {
        &self.config
    }

    /// 区域需事先通过 `check_bounds`
    pub fn classify_luma(&self, luma: &GrayImage, region: &AnalysisRegion) -> BlackscreenOutcome {
        let total = region.pixel_count();
        if total == 0 {
            return BlackscreenOutcome {
                black_ratio: 0.0,
                is_black: false,
            };
        }

        let cutoff = self.config.luma_cutoff;
        let black = region.luma_values(luma).filter(|&v| v <= cutoff).count();
        let black_ratio = black as f32 / total as f32;

        BlackscreenOutcome {
            black_ratio,
            is_black: self.is_black(black_ratio),
        }
    }

    pub fn is_black(&self, black_ratio: f32) -> bool {
        black_ratio >= self.config.threshold
    }
}

impl TransitionDetector for BlackscreenClassifier {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Blackscreen
    }

    fn classify(
        &self,
        _previous: Option<&DecodedFrame>,
        current: &DecodedFrame,
        region: &AnalysisRegion,
    ) -> Result<FrameSignal, ZapError> {
        region.check_bounds(current.width(), current.height())?;
        let outcome = self.classify_luma(&current.luma, region);
        Ok(FrameSignal::verdict(outcome.is_black, outcome.black_ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn frame_with_black_columns(width: u32, height: u32, black_columns: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, _| {
            if x < black_columns {
                Luma([0u8])
            } else {
                Luma([180u8])
            }
        })
    }

    #[test]
    fn test_fully_black_frame() {
        let classifier = BlackscreenClassifier::new();
        let luma = frame_with_black_columns(20, 10, 20);
        let outcome = classifier.classify_luma(&luma, &AnalysisRegion::full(20, 10));
        assert_eq!(outcome.black_ratio, 1.0);
        assert!(outcome.is_black);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let classifier = BlackscreenClassifier::new();
        // 18 / 20 = 0.9
        let luma = frame_with_black_columns(20, 10, 18);
        let outcome = classifier.classify_luma(&luma, &AnalysisRegion::full(20, 10));
        assert!((outcome.black_ratio - 0.9).abs() < 1e-6);
        assert!(outcome.is_black);

        let luma = frame_with_black_columns(20, 10, 17);
        let outcome = classifier.classify_luma(&luma, &AnalysisRegion::full(20, 10));
        assert!(!outcome.is_black);
    }

    #[test]
    fn test_ratio_and_verdict_agree_for_any_threshold() {
        let luma = frame_with_black_columns(20, 10, 10);
        for step in 0..=20 {
            let threshold = step as f32 / 20.0;
            let classifier = BlackscreenClassifier::with_config(BlackscreenConfig {
                threshold,
                ..Default::default()
            });
            let outcome = classifier.classify_luma(&luma, &AnalysisRegion::full(20, 10));
            assert_eq!(outcome.black_ratio >= threshold, outcome.is_black);
        }
    }

    #[test]
    fn test_region_ignores_outside_pixels() {
        let classifier = BlackscreenClassifier::new();
        let luma = frame_with_black_columns(20, 10, 5);
        let outcome = classifier.classify_luma(&luma, &AnalysisRegion::new(0, 0, 5, 10));
        assert!(outcome.is_black);
        let outcome = classifier.classify_luma(&luma, &AnalysisRegion::new(5, 0, 15, 10));
        assert_eq!(outcome.black_ratio, 0.0);
    }

    #[test]
    fn test_luma_cutoff() {
        let luma: GrayImage = ImageBuffer::from_pixel(10, 10, Luma([25u8]));
        let region = AnalysisRegion::full(10, 10);
        assert!(!BlackscreenClassifier::new().classify_luma(&luma, &region).is_black);

        let lenient = BlackscreenClassifier::with_config(BlackscreenConfig {
            luma_cutoff: 30,
            ..Default::default()
        });
        assert!(lenient.classify_luma(&luma, &region).is_black);
    }
}
