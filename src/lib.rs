// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 配置参数 (JSON + 命令行)
pub mod detection; // 特征检测与跟踪
pub mod error; // 错误类型
pub mod history; // 两帧历史缓冲
pub mod input; // 视频输入系统
pub mod pipeline; // 跟踪主循环
pub mod renderer; // 特征标注与显示

pub use crate::config::{Args, Source, TrackerConfig};
pub use crate::detection::{
    CensureConfig, CensureDetector, DetectionResult, Detections, Feature, FeatureDetector,
    FilterKind, MatchTable, PixelAccessor,
};
pub use crate::error::{ErrorPhase, Result, TrackError};
pub use crate::history::FrameHistory;
pub use crate::input::{gray_intensity, CaptureDevice, PatternCapture};
pub use crate::pipeline::{ExitReason, LoopStats, RunOutcome, TrackingLoop};
pub use crate::renderer::{Annotator, FrameSink, Palette};
