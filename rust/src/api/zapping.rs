//! 换台检测器

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use log::{info, warn};

use crate::api::models::zapping::{ZappingResult, ZappingStatsSummary};
use crate::core::ai::{BannerParser, VisionError};
use crate::core::zapping::{
    AnalysisRegion, DirectoryFrameSource, LearnedMethod, ZapError, ZapRequest, ZappingConfig,
    ZappingController, ZappingStats,
};

/// 换台检测器 - 黑屏 / 冻结过渡 + 横幅频道识别
///
/// 每台被测设备对应一个实例，检测方式在首次成功后锁定。
///
/// ```no_run
/// use zap_lib::api::zapping::ZappingAnalyzer;
/// use zap_lib::core::zapping::AnalysisRegion;
///
/// let analyzer = ZappingAnalyzer::create();
/// let result = analyzer
///     .analyze_directory("/captures", 1700000000.0, AnalysisRegion::new(0, 0, 1280, 560), None, 10)
///     .unwrap();
/// println!("{}", result.transition_duration_seconds);
/// ```
pub struct ZappingAnalyzer {
    controller: Mutex<ZappingController>,
    stats: Mutex<ZappingStats>,
}

impl ZappingAnalyzer {
    /// 默认阈值，不启用 AI 频道识别
    pub fn create() -> Self {
        Self::with_config(ZappingConfig::default())
    }

    pub fn with_config(config: ZappingConfig) -> Self {
        info!("🎬 ZappingAnalyzer: created");
        Self::from_controller(ZappingController::with_config(config))
    }

    /// 从环境变量读取视觉模型配置并启用频道识别
    pub fn create_with_vision() -> Result<Self, VisionError> {
        let parser = BannerParser::from_env()?;
        Ok(Self::create().with_banner_parser(parser))
    }

    pub fn from_controller(controller: ZappingController) -> Self {
        Self {
            controller: Mutex::new(controller),
            stats: Mutex::new(ZappingStats::new()),
        }
    }

    pub fn with_banner_parser(mut self, parser: BannerParser) -> Self {
        let controller = self.controller.get_mut().unwrap_or_else(|e| e.into_inner());
        *controller = std::mem::take(controller).with_banner_parser(parser);
        self
    }

    /// 分析一次换台并计入统计
    pub fn analyze(&self, request: &ZapRequest<'_>) -> Result<ZappingResult, ZapError> {
        let mut controller = self.lock_controller();
        let result = match controller.analyze(request) {
            Ok(result) => result,
            Err(e) if e.is_fatal() => {
                warn!("⛔ Zapping analysis rejected: {}", e);
                return Err(e);
            }
            Err(e) => {
                warn!("⚠️ Zapping analysis failed: {}", e);
                self.lock_stats().record_failure();
                return Err(e);
            }
        };

        let mut stats = self.lock_stats();
        stats.record(&result);
        stats.set_learned_method(controller.learned_method());
        Ok(result)
    }

    /// 分析抓帧目录中按键释放之后的帧
    pub fn analyze_directory(
        &self,
        dir: impl Into<PathBuf>,
        key_release_timestamp: f64,
        analysis_rect: AnalysisRegion,
        banner_region: Option<AnalysisRegion>,
        max_images: usize,
    ) -> Result<ZappingResult, ZapError> {
        let source = DirectoryFrameSource::new(dir);
        let mut request = ZapRequest::new(&source, key_release_timestamp, analysis_rect)
            .with_max_images(max_images);
        if let Some(region) = banner_region {
            request = request.with_banner_region(region);
        }
        self.analyze(&request)
    }

    pub fn learned_method(&self) -> LearnedMethod {
        self.lock_controller().learned_method()
    }

    /// 获取统计摘要
    pub fn stats(&self) -> ZappingStatsSummary {
        self.lock_stats().summary()
    }

    /// 清空统计；已学到的检测方式保留
    pub fn reset_stats(&self) {
        let learned = self.lock_controller().learned_method();
        let mut stats = self.lock_stats();
        stats.reset();
        stats.set_learned_method(learned);
    }

    fn lock_controller(&self) -> MutexGuard<'_, ZappingController> {
        self.controller.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_stats(&self) -> MutexGuard<'_, ZappingStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ZappingAnalyzer {
    fn default() -> Self {
        Self::create()
    }
}

impl Drop for ZappingAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ ZappingAnalyzer: released");
    }
}
