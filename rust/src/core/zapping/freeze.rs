//! 冻结判定：相邻帧在分析区域内的平均绝对亮度差

use image::GrayImage;

use super::error::ZapError;
use super::frame::{AnalysisRegion, DecodedFrame};
use super::scan::{FrameSignal, TransitionDetector};
use crate::api::models::zapping::DetectionMethod;

/// 尺寸不一致时的差异值
const MAX_DIFF: f32 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreezeConfig {
    /// 平均亮度差 (0-255) 低于该值视为冻结
    pub threshold: f32,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self { threshold: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreezeOutcome {
    pub diff_score: f32,
    pub is_frozen: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FreezeClassifier {
    config: FreezeConfig,
}

impl FreezeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FreezeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FreezeConfig {
        &self.config
    }

    /// 当前帧相对前一帧是否冻结
    pub fn compare(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
        region: &AnalysisRegion,
    ) -> FreezeOutcome {
        let diff_score = Self::mean_abs_diff(previous, current, region);
        FreezeOutcome {
            diff_score,
            is_frozen: diff_score < self.config.threshold,
        }
    }

    /// 对连续帧窗口逐对比较，结果对应 `frames[1..]`
    pub fn classify_window(
        &self,
        frames: &[&GrayImage],
        region: &AnalysisRegion,
    ) -> Result<Vec<FreezeOutcome>, ZapError> {
        self.check_window(frames.len())?;

        Ok(frames
            .windows(2)
            .map(|pair| self.compare(pair[0], pair[1], region))
            .collect())
    }

    fn mean_abs_diff(a: &GrayImage, b: &GrayImage, region: &AnalysisRegion) -> f32 {
        if a.dimensions() != b.dimensions() {
            return MAX_DIFF;
        }
        let total = region.pixel_count();
        if total == 0 {
            return MAX_DIFF;
        }

        let sum: u64 = region
            .luma_values(a)
            .zip(region.luma_values(b))
            .map(|(p, q)| (p as i16 - q as i16).unsigned_abs() as u64)
            .sum();

        sum as f32 / total as f32
    }
}

impl TransitionDetector for FreezeClassifier {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Freeze
    }

    fn min_frames(&self) -> usize {
        2
    }

    /// 没有前驱的帧无法判定
    fn classify(
        &self,
        previous: Option<&DecodedFrame>,
        current: &DecodedFrame,
        region: &AnalysisRegion,
    ) -> Result<FrameSignal, ZapError> {
        region.check_bounds(current.width(), current.height())?;
        let Some(previous) = previous else {
            return Ok(FrameSignal::unknown());
        };

        let outcome = self.compare(&previous.luma, &current.luma, region);
        Ok(FrameSignal::verdict(outcome.is_frozen, outcome.diff_score))
    }
}
