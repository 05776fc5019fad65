//! 换台过渡检测
//!
//! - `blackscreen` / `freeze`: 单帧判定
//! - `scan`: 边界定位
//! - `banner`: 横幅预判
//! - `controller`: 会话编排与检测方式学习
//! - `stats`: 多次换台统计

mod banner;
mod blackscreen;
mod controller;
mod error;
mod frame;
mod freeze;
mod scan;
mod stats;

pub use banner::{BannerDetection, BannerDetector, EdgeDensityBannerDetector};
pub use blackscreen::{BlackscreenClassifier, BlackscreenConfig, BlackscreenOutcome};
pub use controller::{
    LearnedMethod, ZapRequest, ZappingConfig, ZappingController, DEFAULT_MAX_IMAGES,
};
pub use error::ZapError;
pub use frame::{
    parse_timestamp, AnalysisRegion, DecodedFrame, DirectoryFrameSource, Frame, FrameBatch,
    FrameSource, InMemoryFrameSource,
};
pub use freeze::{FreezeClassifier, FreezeConfig, FreezeOutcome};
pub use scan::{find_boundaries, Boundaries, BoundaryScanner, DetectionOutcome, FrameSignal, TransitionDetector};
pub use stats::ZappingStats;
