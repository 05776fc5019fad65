use serde::{Deserialize, Serialize};

/// 检测方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// 黑屏过渡
    Blackscreen,
    /// 画面冻结过渡
    Freeze,
    /// 未检测到过渡
    #[default]
    None,
}

/// 帧引用（结果中只保留轻量副本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRef {
    pub identifier: String,
    pub timestamp: f64,
    pub index: usize,
}

/// 横幅上识别出的频道信息，字段均可为空
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub program_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl ChannelInfo {
    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    /// 已识别字段数，用于挑选最完整的一次识别
    pub fn field_count(&self) -> usize {
        [
            &self.channel_name,
            &self.program_name,
            &self.start_time,
            &self.end_time,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }

    pub fn has_channel_name(&self) -> bool {
        self.channel_name.is_some()
    }
}

/// 单次换台分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZappingResult {
    pub detection_method: DetectionMethod,
    pub transition_detected: bool,
    pub transition_duration_seconds: f64,
    pub boundary_start_frame: Option<FrameRef>,
    pub boundary_end_frame: Option<FrameRef>,
    pub channel_info: Option<ChannelInfo>,
    pub analyzed_frame_count: usize,
    pub available_frame_count: usize,
    pub stopped_early: bool,
}

impl ZappingResult {
    /// 没有可分析帧或未检测到过渡时的结果
    pub fn not_detected(analyzed_frame_count: usize, available_frame_count: usize) -> Self {
        Self {
            detection_method: DetectionMethod::None,
            transition_detected: false,
            transition_duration_seconds: 0.0,
            boundary_start_frame: None,
            boundary_end_frame: None,
            channel_info: None,
            analyzed_frame_count,
            available_frame_count,
            stopped_early: false,
        }
    }
}

/// 一轮测试的统计汇总，供报告层读取
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZappingStatsSummary {
    pub total_zaps: u64,
    pub blackscreen_successes: u64,
    pub freeze_successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub min_duration_seconds: Option<f64>,
    pub max_duration_seconds: Option<f64>,
    pub avg_duration_seconds: Option<f64>,
    pub learned_method: DetectionMethod,
    pub channel_info_count: u64,
}
