//! 错误类型 (Error taxonomy)
//!
//! 每个协作方调用点对应一个变体, `phase()` 将其归入三类:
//! 初始化致命 / 循环内致命 / 降级(可吸收)

use thiserror::Error;

/// 错误所属阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    /// 主循环开始前失败, 直接退出
    Init,
    /// 主循环内失败, 进入 SHUTDOWN 后退出
    Loop,
    /// 不是错误: 渲染退化为"新特征"样式
    Degraded,
}

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("could not initialize feature detector: {0}")]
    DetectorInit(String),

    #[error("could not open capture device {index}: {reason}")]
    CaptureOpen { index: usize, reason: String },

    #[error("could not retrieve frame")]
    FrameUnavailable,

    #[error("frame is {width}x{height}, detector was set up for {expected_width}x{expected_height}")]
    FrameSize {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("feature detection failed: {0}")]
    Detection(String),

    #[error("feature tracking failed: {0}")]
    Tracking(String),

    #[error("display failed: {0}")]
    Display(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TrackError {
    pub fn phase(&self) -> ErrorPhase {
        match self {
            TrackError::DetectorInit(_) | TrackError::CaptureOpen { .. } | TrackError::Config(_) => {
                ErrorPhase::Init
            }
            TrackError::FrameUnavailable
            | TrackError::FrameSize { .. }
            | TrackError::Detection(_)
            | TrackError::Display(_) => ErrorPhase::Loop,
            TrackError::Tracking(_) => ErrorPhase::Degraded,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.phase() != ErrorPhase::Degraded
    }
}

pub type Result<T, E = TrackError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_mapping() {
        assert_eq!(TrackError::DetectorInit("x".into()).phase(), ErrorPhase::Init);
        assert_eq!(
            TrackError::CaptureOpen { index: 0, reason: "busy".into() }.phase(),
            ErrorPhase::Init
        );
        assert_eq!(TrackError::FrameUnavailable.phase(), ErrorPhase::Loop);
        assert_eq!(TrackError::Detection("x".into()).phase(), ErrorPhase::Loop);
        assert_eq!(TrackError::Display("x".into()).phase(), ErrorPhase::Loop);
        let size = TrackError::FrameSize {
            width: 176,
            height: 144,
            expected_width: 352,
            expected_height: 288,
        };
        assert_eq!(size.phase(), ErrorPhase::Loop);
        assert!(size.is_fatal());
        assert_eq!(TrackError::Config("x".into()).phase(), ErrorPhase::Init);
        assert_eq!(TrackError::Tracking("x".into()).phase(), ErrorPhase::Degraded);
        assert!(!TrackError::Tracking("x".into()).is_fatal());
        assert!(TrackError::FrameUnavailable.is_fatal());
    }

    #[test]
    fn test_operator_message() {
        assert_eq!(TrackError::FrameUnavailable.to_string(), "could not retrieve frame");
    }
}
