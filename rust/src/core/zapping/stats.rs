use super::controller::LearnedMethod;
use crate::api::models::zapping::{DetectionMethod, ZappingResult, ZappingStatsSummary};

/// 一轮测试内的换台统计
#[derive(Debug, Clone, Default)]
pub struct ZappingStats {
    blackscreen_successes: u64,
    freeze_successes: u64,
    failures: u64,
    channel_info_count: u64,
    durations: Vec<f64>,
    learned_method: LearnedMethod,
}

impl ZappingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &ZappingResult) {
        match (result.transition_detected, result.detection_method) {
            (true, DetectionMethod::Blackscreen) => self.blackscreen_successes += 1,
            (true, DetectionMethod::Freeze) => self.freeze_successes += 1,
            _ => self.failures += 1,
        }

        if result.transition_detected {
            self.durations.push(result.transition_duration_seconds);
        }
        if result.channel_info.is_some() {
            self.channel_info_count += 1;
        }
    }

    /// 分析中途出错（非配置错误）的换台计为失败
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// 记录控制器当前学到的检测方式
    pub fn set_learned_method(&mut self, method: LearnedMethod) {
        self.learned_method = method;
    }

    pub fn total(&self) -> u64 {
        self.blackscreen_successes + self.freeze_successes + self.failures
    }

    pub fn blackscreen_successes(&self) -> u64 {
        self.blackscreen_successes
    }

    pub fn freeze_successes(&self) -> u64 {
        self.freeze_successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn learned_method(&self) -> LearnedMethod {
        self.learned_method
    }

    pub fn min_duration(&self) -> Option<f64> {
        self.durations.iter().copied().reduce(f64::min)
    }

    pub fn max_duration(&self) -> Option<f64> {
        self.durations.iter().copied().reduce(f64::max)
    }

    pub fn avg_duration(&self) -> Option<f64> {
        if self.durations.is_empty() {
            return None;
        }
        Some(self.durations.iter().sum::<f64>() / self.durations.len() as f64)
    }

    pub fn summary(&self) -> ZappingStatsSummary {
        let total = self.total();
        let successes = self.blackscreen_successes + self.freeze_successes;
        ZappingStatsSummary {
            total_zaps: total,
            blackscreen_successes: self.blackscreen_successes,
            freeze_successes: self.freeze_successes,
            failures: self.failures,
            success_rate: if total == 0 {
                0.0
            } else {
                successes as f64 / total as f64
            },
            min_duration_seconds: self.min_duration(),
            max_duration_seconds: self.max_duration(),
            avg_duration_seconds: self.avg_duration(),
            learned_method: self.learned_method.as_detection_method(),
            channel_info_count: self.channel_info_count,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::zapping::ChannelInfo;

    fn result(method: DetectionMethod, detected: bool, duration: f64) -> ZappingResult {
        ZappingResult {
            detection_method: method,
            transition_detected: detected,
            transition_duration_seconds: duration,
            ..ZappingResult::not_detected(5, 5)
        }
    }

    #[test]
    fn test_empty_stats() {
        let stats = ZappingStats::new();
        let summary = stats.summary();
        assert_eq!(summary.total_zaps, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.avg_duration_seconds.is_none());
        assert_eq!(summary.learned_method, DetectionMethod::None);
    }

    #[test]
    fn test_counts_and_durations() {
        let mut stats = ZappingStats::new();
        stats.record(&result(DetectionMethod::Blackscreen, true, 1.0));
        stats.record(&result(DetectionMethod::Blackscreen, true, 3.0));
        stats.record(&result(DetectionMethod::Freeze, true, 2.0));
        stats.record(&result(DetectionMethod::None, false, 0.0));
        stats.set_learned_method(LearnedMethod::Blackscreen);

        assert_eq!(stats.blackscreen_successes(), 2);
        assert_eq!(stats.freeze_successes(), 1);
        assert_eq!(stats.failures(), 1);
        assert_eq!(stats.min_duration(), Some(1.0));
        assert_eq!(stats.max_duration(), Some(3.0));
        assert_eq!(stats.avg_duration(), Some(2.0));

        let summary = stats.summary();
        assert_eq!(summary.total_zaps, 4);
        assert_eq!(summary.success_rate, 0.75);
        assert_eq!(summary.learned_method, DetectionMethod::Blackscreen);
    }

    #[test]
    fn test_channel_info_counted() {
        let mut stats = ZappingStats::new();
        let mut with_info = result(DetectionMethod::Freeze, true, 0.5);
        with_info.channel_info = Some(ChannelInfo {
            channel_name: Some("ARD".into()),
            ..Default::default()
        });
        stats.record(&with_info);
        assert_eq!(stats.summary().channel_info_count, 1);

        stats.record_failure();
        assert_eq!(stats.failures(), 1);
        assert_eq!(stats.summary().channel_info_count, 1);

        stats.reset();
        assert_eq!(stats.total(), 0);
    }
}
