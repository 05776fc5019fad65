//! 换台会话控制器
//!
//! 核心流程：
//! 1. 从按键释放时刻起加载帧（最多 `max_images` 张），并行解码
//! 2. 选择检测方式：已学习则只用该方式；未学习时先黑屏，失败再冻结
//! 3. 顺序扫描定位过渡起止，同时按横幅预判调用 AI 识别频道信息
//! 4. 过渡结束且拿到频道名后提前终止
//! 5. 首次成功后锁定检测方式，之后不再尝试另一种

use std::collections::HashSet;

use log::{debug, info, warn};
use rayon::prelude::*;

use super::banner::{BannerDetector, EdgeDensityBannerDetector};
use super::blackscreen::{BlackscreenClassifier, BlackscreenConfig};
use super::error::ZapError;
use super::frame::{AnalysisRegion, DecodedFrame, Frame, FrameSource};
use super::freeze::{FreezeClassifier, FreezeConfig};
use super::scan::{Boundaries, BoundaryScanner, DetectionOutcome, TransitionDetector};
use crate::api::models::zapping::{ChannelInfo, DetectionMethod, ZappingResult};
use crate::core::ai::BannerParser;

pub const DEFAULT_MAX_IMAGES: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct ZappingConfig {
    pub blackscreen: BlackscreenConfig,
    pub freeze: FreezeConfig,
}

/// 控制器学到的检测方式，只写一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LearnedMethod {
    #[default]
    Unset,
    Blackscreen,
    Freeze,
}

impl LearnedMethod {
    pub fn is_set(&self) -> bool {
        *self != LearnedMethod::Unset
    }

    pub fn as_detection_method(&self) -> DetectionMethod {
        match self {
            LearnedMethod::Unset => DetectionMethod::None,
            LearnedMethod::Blackscreen => DetectionMethod::Blackscreen,
            LearnedMethod::Freeze => DetectionMethod::Freeze,
        }
    }

    fn from_detection_method(method: DetectionMethod) -> Self {
        match method {
            DetectionMethod::Blackscreen => LearnedMethod::Blackscreen,
            DetectionMethod::Freeze => LearnedMethod::Freeze,
            DetectionMethod::None => LearnedMethod::Unset,
        }
    }
}

/// 单次换台分析的输入
pub struct ZapRequest<'a> {
    pub source: &'a dyn FrameSource,
    /// 换台按键释放时刻（秒）
    pub key_release_timestamp: f64,
    pub analysis_rect: AnalysisRegion,
    pub banner_region: Option<AnalysisRegion>,
    pub max_images: usize,
}

impl<'a> ZapRequest<'a> {
    pub fn new(
        source: &'a dyn FrameSource,
        key_release_timestamp: f64,
        analysis_rect: AnalysisRegion,
    ) -> Self {
        Self {
            source,
            key_release_timestamp,
            analysis_rect,
            banner_region: None,
            max_images: DEFAULT_MAX_IMAGES,
        }
    }

    pub fn with_banner_region(mut self, region: AnalysisRegion) -> Self {
        self.banner_region = Some(region);
        self
    }

    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }
}

/// 一条检测路径的扫描结果
struct PathScan {
    method: DetectionMethod,
    outcomes: Vec<DetectionOutcome>,
    boundaries: Boundaries,
    stopped_early: bool,
}

impl PathScan {
    fn skipped(method: DetectionMethod) -> Self {
        Self {
            method,
            outcomes: Vec::new(),
            boundaries: Boundaries::default(),
            stopped_early: false,
        }
    }

    fn analyzed(&self) -> usize {
        self.outcomes.len()
    }

    fn is_success(&self) -> bool {
        self.boundaries.is_complete()
    }
}

/// 会话内的横幅识别状态：每帧最多调用一次 AI，保留最完整的结果
struct BannerTracker<'a> {
    parser: Option<&'a BannerParser>,
    detector: &'a dyn BannerDetector,
    region: Option<AnalysisRegion>,
    queried: HashSet<usize>,
    best: Option<ChannelInfo>,
}

impl<'a> BannerTracker<'a> {
    fn new(
        parser: Option<&'a BannerParser>,
        detector: &'a dyn BannerDetector,
        region: Option<AnalysisRegion>,
    ) -> Self {
        Self {
            parser,
            detector,
            region,
            queried: HashSet::new(),
            best: None,
        }
    }

    fn has_channel_name(&self) -> bool {
        self.best.as_ref().is_some_and(|info| info.has_channel_name())
    }

    /// 返回该帧横幅是否存在
    fn inspect(&mut self, frame: &DecodedFrame) -> bool {
        let (Some(parser), Some(region)) = (self.parser, self.region) else {
            return false;
        };
        if region.check_bounds(frame.width(), frame.height()).is_err() {
            return false;
        }

        let detection = self.detector.detect(&frame.luma, &region);
        if !detection.present {
            return false;
        }
        if self.has_channel_name() || !self.queried.insert(frame.frame.index) {
            return true;
        }

        debug!(
            "🪧 Banner on frame {} (confidence {:.2}), querying AI",
            frame.frame.identifier, detection.confidence
        );
        let info = parser.extract(&frame.image, &region);
        self.offer(info);
        true
    }

    fn offer(&mut self, info: ChannelInfo) {
        if info.is_empty() {
            return;
        }
        match &self.best {
            Some(best) if best.field_count() >= info.field_count() => {}
            _ => self.best = Some(info),
        }
    }

    fn into_best(self) -> Option<ChannelInfo> {
        self.best
    }
}

/// 换台检测控制器；每台设备持有独立实例，学到的检测方式不跨设备共享
pub struct ZappingController {
    learned: LearnedMethod,
    blackscreen: Box<dyn TransitionDetector>,
    freeze: Box<dyn TransitionDetector>,
    banner_detector: Box<dyn BannerDetector>,
    banner_parser: Option<BannerParser>,
}

impl ZappingController {
    pub fn new() -> Self {
        Self::with_config(ZappingConfig::default())
    }

    pub fn with_config(config: ZappingConfig) -> Self {
        Self {
            learned: LearnedMethod::Unset,
            blackscreen: Box::new(BlackscreenClassifier::with_config(config.blackscreen)),
            freeze: Box::new(FreezeClassifier::with_config(config.freeze)),
            banner_detector: Box::new(EdgeDensityBannerDetector::new()),
            banner_parser: None,
        }
    }

    pub fn with_detectors(
        mut self,
        blackscreen: Box<dyn TransitionDetector>,
        freeze: Box<dyn TransitionDetector>,
    ) -> Self {
        self.blackscreen = blackscreen;
        self.freeze = freeze;
        self
    }

    pub fn with_banner_detector(mut self, detector: Box<dyn BannerDetector>) -> Self {
        self.banner_detector = detector;
        self
    }

    pub fn with_banner_parser(mut self, parser: BannerParser) -> Self {
        self.banner_parser = Some(parser);
        self
    }

    pub fn learned_method(&self) -> LearnedMethod {
        self.learned
    }

    /// 分析一次换台；只有配置错误（目录不可读、区域非法）会返回 Err
    pub fn analyze(&mut self, request: &ZapRequest<'_>) -> Result<ZappingResult, ZapError> {
        request.analysis_rect.validate_shape()?;
        if let Some(region) = &request.banner_region {
            region.validate_shape()?;
        }

        let batch = request
            .source
            .frames_since(request.key_release_timestamp, request.max_images)?;
        info!(
            "🎬 Zapping analysis: {} frames since key release, analyzing up to {}",
            batch.available,
            batch.frames.len()
        );
        if batch.is_empty() {
            info!("📭 No frames after key release");
            return Ok(ZappingResult::not_detected(0, batch.available));
        }

        let frames = Self::decode_frames(request.source, &batch.frames);
        let Some(first) = frames.first() else {
            warn!("⚠️ None of the {} frames could be decoded", batch.frames.len());
            return Ok(ZappingResult::not_detected(0, batch.available));
        };
        request.analysis_rect.check_bounds(first.width(), first.height())?;
        if let Some(region) = &request.banner_region {
            region.check_bounds(first.width(), first.height())?;
        }

        let mut banner = BannerTracker::new(
            self.banner_parser.as_ref(),
            self.banner_detector.as_ref(),
            request.banner_region,
        );

        let (scan, analyzed) = match self.learned {
            LearnedMethod::Blackscreen => {
                let scan = Self::scan_path(self.blackscreen.as_ref(), &frames, request, &mut banner);
                let analyzed = scan.analyzed();
                (scan, analyzed)
            }
            LearnedMethod::Freeze => {
                let scan = Self::scan_path(self.freeze.as_ref(), &frames, request, &mut banner);
                let analyzed = scan.analyzed();
                (scan, analyzed)
            }
            LearnedMethod::Unset => {
                let first = Self::scan_path(self.blackscreen.as_ref(), &frames, request, &mut banner);
                if first.is_success() {
                    let analyzed = first.analyzed();
                    (first, analyzed)
                } else {
                    info!("🔁 No blackscreen transition, falling back to freeze detection");
                    let second = Self::scan_path(self.freeze.as_ref(), &frames, request, &mut banner);
                    let analyzed = first.analyzed().max(second.analyzed());
                    (second, analyzed)
                }
            }
        };

        let channel_info = banner.into_best();
        let result = Self::build_result(&scan, request, channel_info, analyzed, batch.available);

        if result.transition_detected && !self.learned.is_set() {
            self.learned = LearnedMethod::from_detection_method(scan.method);
            info!("🧠 Learned detection method: {:?}", self.learned);
        }

        info!(
            "✅ Zapping result: method={:?} detected={} duration={:.3}s analyzed={}/{} early={}",
            result.detection_method,
            result.transition_detected,
            result.transition_duration_seconds,
            result.analyzed_frame_count,
            result.available_frame_count,
            result.stopped_early
        );
        Ok(result)
    }

    /// 并行解码，保持帧顺序；解码失败的帧被剔除
    fn decode_frames(source: &dyn FrameSource, frames: &[Frame]) -> Vec<DecodedFrame> {
        let decoded: Vec<_> = frames
            .par_iter()
            .map(|frame| {
                source
                    .load(frame)
                    .map(|image| DecodedFrame::new(frame.clone(), image))
            })
            .collect();

        decoded
            .into_iter()
            .filter_map(|result| match result {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!("⚠️ Frame excluded: {}", e);
                    None
                }
            })
            .collect()
    }

    fn scan_path(
        detector: &dyn TransitionDetector,
        frames: &[DecodedFrame],
        request: &ZapRequest<'_>,
        banner: &mut BannerTracker<'_>,
    ) -> PathScan {
        let method = detector.method();
        if let Err(e) = detector.check_window(frames.len()) {
            info!("⏭️ {:?} detection not applicable: {}", method, e);
            return PathScan::skipped(method);
        }

        let mut scanner = BoundaryScanner::new();
        let mut outcomes = Vec::with_capacity(frames.len());
        let mut previous: Option<&DecodedFrame> = None;
        let mut stopped_early = false;

        for (position, frame) in frames.iter().enumerate() {
            let signal = match detector.classify(previous, frame, &request.analysis_rect) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(
                        "⚠️ Frame {} excluded from {:?} scan: {}",
                        frame.frame.identifier, method, e
                    );
                    continue;
                }
            };
            previous = Some(frame);

            let mut outcome = DetectionOutcome::from_signal(frame.frame.to_ref(), method, signal);
            outcome.banner_present = banner.inspect(frame);
            debug!("🖼️ {:?}", outcome);

            scanner.push_signal(signal.active);
            outcomes.push(outcome);

            if scanner.is_complete() && banner.has_channel_name() {
                stopped_early = position + 1 < frames.len();
                break;
            }
        }

        PathScan {
            method,
            outcomes,
            boundaries: scanner.boundaries(),
            stopped_early,
        }
    }

    fn build_result(
        scan: &PathScan,
        request: &ZapRequest<'_>,
        channel_info: Option<ChannelInfo>,
        analyzed: usize,
        available: usize,
    ) -> ZappingResult {
        let Some(end_position) = scan.boundaries.end else {
            return ZappingResult {
                channel_info,
                ..ZappingResult::not_detected(analyzed, available)
            };
        };

        let end = scan.outcomes[end_position].frame.clone();
        let start = scan
            .boundaries
            .start
            .map(|position| scan.outcomes[position].frame.clone());

        let duration = match &start {
            Some(start) => end.timestamp - start.timestamp,
            None => end.timestamp - request.key_release_timestamp,
        };

        ZappingResult {
            detection_method: scan.method,
            transition_detected: true,
            transition_duration_seconds: duration.max(0.0),
            boundary_start_frame: start,
            boundary_end_frame: Some(end),
            channel_info,
            analyzed_frame_count: analyzed,
            available_frame_count: available,
            stopped_early: scan.stopped_early,
        }
    }
}

impl Default for ZappingController {
    fn default() -> Self {
        Self::new()
    }
}
