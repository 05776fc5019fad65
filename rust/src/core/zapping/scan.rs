//! 逐帧扫描：检测器接口、单帧结果与边界定位

use super::error::ZapError;
use super::frame::{AnalysisRegion, DecodedFrame};
use crate::api::models::zapping::{DetectionMethod, FrameRef};

/// 单帧判定信号
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSignal {
    /// 是否处于过渡态（黑屏 / 冻结）；`None` 表示无法判定（冻结判定的首帧）
    pub active: Option<bool>,
    /// 黑像素占比或帧差
    pub score: Option<f32>,
}

impl FrameSignal {
    pub fn verdict(active: bool, score: f32) -> Self {
        Self {
            active: Some(active),
            score: Some(score),
        }
    }

    pub fn unknown() -> Self {
        Self {
            active: None,
            score: None,
        }
    }
}

/// 过渡检测器：黑屏和冻结各一个实现
pub trait TransitionDetector: Send + Sync {
    fn method(&self) -> DetectionMethod;

    /// 该方式可用所需的最少帧数
    fn min_frames(&self) -> usize {
        1
    }

    /// 帧数不足时返回 `InsufficientData`，调用方视为该方式不适用
    fn check_window(&self, frame_count: usize) -> Result<(), ZapError> {
        let needed = self.min_frames();
        if frame_count < needed {
            return Err(ZapError::InsufficientData {
                needed,
                got: frame_count,
            });
        }
        Ok(())
    }

    /// `previous` 为扫描中上一个有效帧
    fn classify(
        &self,
        previous: Option<&DecodedFrame>,
        current: &DecodedFrame,
        region: &AnalysisRegion,
    ) -> Result<FrameSignal, ZapError>;
}

/// 单帧检测结果（仅在一次会话内存在）
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    pub frame: FrameRef,
    pub is_black: bool,
    pub black_ratio: Option<f32>,
    pub is_frozen: bool,
    pub diff_score: Option<f32>,
    pub banner_present: bool,
}

impl DetectionOutcome {
    pub fn from_signal(frame: FrameRef, method: DetectionMethod, signal: FrameSignal) -> Self {
        let mut outcome = Self {
            frame,
            is_black: false,
            black_ratio: None,
            is_frozen: false,
            diff_score: None,
            banner_present: false,
        };
        match method {
            DetectionMethod::Blackscreen => {
                outcome.is_black = signal.active.unwrap_or(false);
                outcome.black_ratio = signal.score;
            }
            DetectionMethod::Freeze => {
                outcome.is_frozen = signal.active.unwrap_or(false);
                outcome.diff_score = signal.score;
            }
            DetectionMethod::None => {}
        }
        outcome
    }

    pub fn is_active(&self) -> bool {
        self.is_black || self.is_frozen
    }
}

/// 过渡边界，值为扫描结果中的位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boundaries {
    /// 首个 false→true；首帧即处于过渡态时为空
    pub start: Option<usize>,
    /// 随后的 true→false
    pub end: Option<usize>,
}

impl Boundaries {
    pub fn is_complete(&self) -> bool {
        self.end.is_some()
    }
}

/// 按帧顺序消费判定结果，定位过渡起止
#[derive(Debug, Default)]
pub struct BoundaryScanner {
    position: usize,
    seen_inactive: bool,
    in_transition: bool,
    boundaries: Boundaries,
}

impl BoundaryScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, active: bool) {
        let position = self.position;
        self.position += 1;

        if self.boundaries.end.is_some() {
            return;
        }

        match (active, self.in_transition) {
            (true, false) => {
                self.in_transition = true;
                if self.seen_inactive {
                    self.boundaries.start = Some(position);
                }
            }
            (false, true) => self.boundaries.end = Some(position),
            (false, false) => self.seen_inactive = true,
            (true, true) => {}
        }
    }

    /// 无法判定的帧：占一个位置，不影响过渡状态
    pub fn skip(&mut self) {
        self.position += 1;
    }

    pub fn push_signal(&mut self, active: Option<bool>) {
        match active {
            Some(active) => self.push(active),
            None => self.skip(),
        }
    }

    pub fn boundaries(&self) -> Boundaries {
        self.boundaries
    }

    pub fn is_complete(&self) -> bool {
        self.boundaries.is_complete()
    }
}

/// 对一串判定结果定位边界
pub fn find_boundaries(states: impl IntoIterator<Item = bool>) -> Boundaries {
    let mut scanner = BoundaryScanner::new();
    for active in states {
        scanner.push(active);
    }
    scanner.boundaries()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_in_the_middle() {
        let b = find_boundaries([false, false, true, true, true, false, false, false]);
        assert_eq!(b.start, Some(2));
        assert_eq!(b.end, Some(5));
    }

    #[test]
    fn test_transition_already_underway() {
        let b = find_boundaries([true, true, false, false]);
        assert_eq!(b.start, None);
        assert_eq!(b.end, Some(2));
    }

    #[test]
    fn test_transition_never_ends() {
        let b = find_boundaries([false, true, true]);
        assert_eq!(b.start, Some(1));
        assert!(!b.is_complete());
    }

    #[test]
    fn test_only_first_transition_counts() {
        let b = find_boundaries([false, true, false, true, false]);
        assert_eq!(b, Boundaries { start: Some(1), end: Some(2) });
    }

    #[test]
    fn test_no_transition() {
        assert_eq!(find_boundaries([false; 4]), Boundaries::default());
        assert_eq!(find_boundaries(Vec::new()), Boundaries::default());
    }

    #[test]
    fn test_unknown_leading_frame_keeps_start_open() {
        let mut scanner = BoundaryScanner::new();
        for active in [None, Some(true), Some(true), Some(false)] {
            scanner.push_signal(active);
        }
        assert_eq!(scanner.boundaries(), Boundaries { start: None, end: Some(3) });

        let mut scanner = BoundaryScanner::new();
        for active in [None, Some(false), Some(true), Some(false)] {
            scanner.push_signal(active);
        }
        assert_eq!(scanner.boundaries(), Boundaries { start: Some(2), end: Some(3) });
    }

    #[test]
    fn test_outcome_from_signal() {
        let frame = FrameRef {
            identifier: "f".into(),
            timestamp: 1.0,
            index: 0,
        };
        let outcome = DetectionOutcome::from_signal(
            frame,
            DetectionMethod::Freeze,
            FrameSignal::verdict(true, 0.2),
        );
        assert!(outcome.is_frozen);
        assert!(!outcome.is_black);
        assert_eq!(outcome.diff_score, Some(0.2));
        assert!(outcome.is_active());
    }
}
