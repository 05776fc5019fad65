use image::GrayImage;

use super::frame::AnalysisRegion;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BannerDetection {
    pub present: bool,
    pub confidence: f32,
}

impl BannerDetection {
    fn absent() -> Self {
        Self {
            present: false,
            confidence: 0.0,
        }
    }
}

/// 横幅预判：决定是否值得为该帧调用 AI
pub trait BannerDetector: Send + Sync {
    fn detect(&self, luma: &GrayImage, region: &AnalysisRegion) -> BannerDetection;
}

/// 基于对比度与水平边缘密度的横幅检测器
/// 频道横幅特点：
/// 1. 文字与底板对比度高
/// 2. 文字笔画带来密集的水平方向亮度跳变
pub struct EdgeDensityBannerDetector {
    /// 亮度标准差阈值
    contrast_threshold: f32,
    /// 水平边缘像素占比阈值
    edge_ratio_threshold: f32,
    /// 左右像素差超过该值视为边缘
    edge_step: i16,
}

impl EdgeDensityBannerDetector {
    pub fn new() -> Self {
        Self {
            contrast_threshold: 40.0,
            edge_ratio_threshold: 0.02,
            edge_step: 30,
        }
    }

    pub fn with_thresholds(contrast_threshold: f32, edge_ratio_threshold: f32) -> Self {
        Self {
            contrast_threshold,
            edge_ratio_threshold,
            ..Self::new()
        }
    }

    fn contrast(pixels: &[u8]) -> f32 {
        let mean = pixels.iter().map(|&p| p as u64).sum::<u64>() as f32 / pixels.len() as f32;
        let variance = pixels
            .iter()
            .map(|&p| {
                let diff = p as f32 - mean;
                diff * diff
            })
            .sum::<f32>()
            / pixels.len() as f32;
        variance.sqrt()
    }

    /// 检测水平方向的边缘（文字笔画特征）
    fn horizontal_edge_ratio(&self, pixels: &[u8], w: usize, h: usize) -> f32 {
        if w < 3 {
            return 0.0;
        }

        let mut edge_count = 0u32;
        let mut total = 0u32;
        for y in 0..h {
            let row = &pixels[y * w..(y + 1) * w];
            for x in 1..(w - 1) {
                let diff = (row[x + 1] as i16 - row[x - 1] as i16).abs();
                if diff > self.edge_step {
                    edge_count += 1;
                }
                total += 1;
            }
        }

        if total == 0 {
            0.0
        } else {
            edge_count as f32 / total as f32
        }
    }
}

impl Default for EdgeDensityBannerDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BannerDetector for EdgeDensityBannerDetector {
    fn detect(&self, luma: &GrayImage, region: &AnalysisRegion) -> BannerDetection {
        let pixels = region.crop_luma(luma);
        if pixels.is_empty() {
            return BannerDetection::absent();
        }

        let std_dev = Self::contrast(&pixels);
        let edge_ratio =
            self.horizontal_edge_ratio(&pixels, region.width as usize, region.height as usize);

        let present = std_dev > self.contrast_threshold && edge_ratio > self.edge_ratio_threshold;
        let confidence = if present {
            let contrast_score = (std_dev / 100.0).min(0.5);
            let edge_score = (edge_ratio * 5.0).min(0.5);
            (contrast_score + edge_score).min(1.0)
        } else {
            0.0
        };

        BannerDetection {
            present,
            confidence,
        }
    }
}
