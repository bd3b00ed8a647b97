//! 跟踪主循环 (Tracking Loop)
//!
//! 单线程同步循环, 每次迭代:
//! 采集 → 灰度转换 → 检测 → 跟踪 → 标注 → 显示 → 角色翻转 → 检查退出键
//!
//! 循环独占所有运行期资源 (检测器、采集设备、灰度缓冲、两帧历史、匹配表),
//! 无论正常退出还是出错, `shutdown` 都按依赖顺序释放它们
use std::time::{Duration, Instant};

use image::GrayImage;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::detection::{Detections, FeatureDetector, FilterKind, MatchTable};
use crate::error::{ErrorPhase, Result, TrackError};
use crate::history::FrameHistory;
use crate::input::{convert_to_gray, gray_intensity, CaptureDevice};
use crate::renderer::{resolve_track, Annotator, FrameSink};

/// 正常退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// 按下退出键 (或关闭窗口)
    ExitKey,
    /// 达到 `--max-frames`
    FrameLimit,
}

/// 运行统计
#[derive(Clone, Debug, Default)]
pub struct LoopStats {
    pub iterations: u64,
    pub features: u64,
    pub tracked: u64,
    pub new: u64,
    pub current_fps: f64,
    window_start: Option<Instant>,
    window_frames: u64,
    window_features: u64,
    window_tracked: u64,
}

impl LoopStats {
    /// 记录一次完成的迭代, 每秒输出一行吞吐统计
    ///
    /// `tracked` 超过 `features` 时按 `features` 计
    pub fn record(&mut self, features: usize, tracked: usize) {
        let tracked = tracked.min(features);
        let (features, tracked) = (features as u64, tracked as u64);
        self.iterations += 1;
        self.features += features;
        self.tracked += tracked;
        self.new += features - tracked;

        self.window_frames += 1;
        self.window_features += features;
        self.window_tracked += tracked;

        let start = *self.window_start.get_or_insert_with(Instant::now);
        let elapsed = start.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.current_fps = self.window_frames as f64 / elapsed;
            let frames = self.window_frames.max(1);
            info!(
                "📊 {:.1}fps | 特征{} | 跟踪{} | 新{}",
                self.current_fps,
                self.window_features / frames,
                self.window_tracked / frames,
                (self.window_features - self.window_tracked) / frames
            );
            self.window_start = Some(Instant::now());
            self.window_frames = 0;
            self.window_features = 0;
            self.window_tracked = 0;
        }
    }
}

/// `run` 的正常结果
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub exit: ExitReason,
    pub stats: LoopStats,
}

pub struct TrackingLoop<D: FeatureDetector, C: CaptureDevice> {
    config: TrackerConfig,
    annotator: Annotator,
    detector: Option<D>,
    capture: Option<C>,
    /// 灰度缓冲: 首帧到达时按帧尺寸分配, 之后复用
    gray: Option<GrayImage>,
    history: FrameHistory<D::Detection>,
    table: Option<MatchTable>,
    stats: LoopStats,
    max_frames: u64,
}

impl<D: FeatureDetector, C: CaptureDevice> TrackingLoop<D, C> {
    /// 初始化: 检测器 → 采集设备 → 设置分辨率
    ///
    /// 任一步失败时, 已获得的资源在返回错误前释放
    pub fn init<FD, FC>(
        config: TrackerConfig,
        annotator: Annotator,
        init_detector: FD,
        open_capture: FC,
    ) -> Result<Self>
    where
        FD: FnOnce(FilterKind, u32, u32) -> Result<D>,
        FC: FnOnce(usize) -> Result<C>,
    {
        let (width, height) = (config.capture.width, config.capture.height);
        let detector = init_detector(config.detector.filter, width, height)?;

        let mut tracking = Self {
            config,
            annotator,
            detector: Some(detector),
            capture: None,
            gray: None,
            history: FrameHistory::new(),
            table: None,
            stats: LoopStats::default(),
            max_frames: 0,
        };

        // 出错时 tracking 被 drop, 检测器和采集设备随之释放
        let capture = tracking
            .capture
            .insert(open_capture(tracking.config.capture.device)?);
        match capture.configure(width, height) {
            Ok(()) => {}
            // 设备没能启动: 继续只会在第一帧报 FrameUnavailable
            Err(e) if e.phase() == ErrorPhase::Init => return Err(e),
            // 设备可能不支持该分辨率; 实际帧尺寸在采集时检查
            Err(e) => warn!("⚠️ 设置采集分辨率 {}x{} 失败: {}", width, height, e),
        }
        info!("✅ 初始化完成: {}x{}", width, height);
        Ok(tracking)
    }

    /// 处理n帧后以 `FrameLimit` 退出 (0 = 不限)
    pub fn with_frame_limit(mut self, max_frames: u64) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn history(&self) -> &FrameHistory<D::Detection> {
        &self.history
    }

    pub fn table(&self) -> Option<&MatchTable> {
        self.table.as_ref()
    }

    /// 所有资源均已释放
    pub fn is_released(&self) -> bool {
        self.detector.is_none()
            && self.capture.is_none()
            && self.gray.is_none()
            && self.table.is_none()
            && self.history.is_empty()
    }

    /// 执行一次完整迭代
    ///
    /// 返回 `Some(ExitKey)` 表示应当退出; 错误均为致命错误
    pub fn step<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<Option<ExitReason>> {
        let Self {
            config,
            annotator,
            detector,
            capture,
            gray,
            history,
            table,
            stats,
            ..
        } = self;

        let detector = detector
            .as_mut()
            .ok_or_else(|| TrackError::Detection("detector already released".to_string()))?;

        // CAPTURE
        let frame = capture
            .as_mut()
            .and_then(|c| c.query_frame())
            .ok_or(TrackError::FrameUnavailable)?;

        let (width, height) = frame.dimensions();
        let (expected_width, expected_height) = detector.dimensions();
        if (width, height) != (expected_width, expected_height) {
            return Err(TrackError::FrameSize {
                width,
                height,
                expected_width,
                expected_height,
            });
        }

        // DETECT
        let gray = gray.get_or_insert_with(|| {
            info!("🩶 分配灰度缓冲: {}x{}", width, height);
            GrayImage::new(width, height)
        });
        convert_to_gray(frame, gray);
        let result = detector.detect(gray_intensity, &*gray)?;
        history.store_current(result);

        let (current, past) = history.split_mut();
        let current = current
            .ok_or_else(|| TrackError::Detection("current slot is empty".to_string()))?;

        // TRACK: 失败不致命, 本帧按未匹配显示
        if let Err(e) = detector.track(current, past, table) {
            warn!("⚠️ 跟踪失败, 本帧全部按新特征显示: {}", e);
        }

        // ANNOTATE: 匹配表必须是针对这一个上一帧建立的
        let (past_features, match_table) = match past {
            Some(p) => (
                Some(p.features()),
                table
                    .as_ref()
                    .filter(|t| t.past_sequence() == p.sequence()),
            ),
            None => (None, None),
        };
        let tracked = current
            .features()
            .iter()
            .filter(|f| resolve_track(f, past_features, match_table).is_some())
            .count();
        let feature_count = current.features().len();
        annotator.mark_all(
            frame,
            current.features(),
            past_features,
            match_table,
            config.render.radius,
            current.extents(),
        );

        // DISPLAY
        sink.show(frame)?;

        // ADVANCE: 两帧前的结果在这里释放
        drop(history.advance());
        stats.record(feature_count, tracked);

        let key = sink.poll_key(Duration::from_millis(config.display.poll_ms));
        match key {
            Some(k) if (k & 255) == config.display.exit_key => Ok(Some(ExitReason::ExitKey)),
            _ => Ok(None),
        }
    }

    /// 运行到退出键 / 帧数上限 / 致命错误, 然后释放全部资源
    pub fn run<S: FrameSink + ?Sized>(mut self, sink: &mut S) -> Result<RunOutcome> {
        info!("🚀 开始实时跟踪 (按 ESC 退出)");
        let result = loop {
            if self.max_frames > 0 && self.stats.iterations >= self.max_frames {
                break Ok(ExitReason::FrameLimit);
            }
            match self.step(sink) {
                Ok(Some(exit)) => break Ok(exit),
                Ok(None) => {}
                Err(e) => break Err(e),
            }
        };

        self.shutdown();

        match result {
            Ok(exit) => {
                info!(
                    "👋 跟踪结束 ({:?}): {}帧, 跟踪{} / 新{}",
                    exit, self.stats.iterations, self.stats.tracked, self.stats.new
                );
                Ok(RunOutcome {
                    exit,
                    stats: self.stats.clone(),
                })
            }
            Err(e) => {
                error!(
                    "❌ 第{}帧出错 ({:?}): {}",
                    self.stats.iterations + 1,
                    e.phase(),
                    e
                );
                Err(e)
            }
        }
    }

    /// 按依赖顺序释放: 匹配表 → 两帧结果 → 检测器 → 灰度缓冲 → 采集设备
    ///
    /// 可重复调用; 已释放的资源跳过
    pub fn shutdown(&mut self) {
        if self.table.take().is_some() {
            debug!("释放匹配表");
        }
        let released = self.history.clear();
        if released > 0 {
            debug!("释放检测结果: {}个", released);
        }
        if let Some(detector) = self.detector.take() {
            drop(detector);
            debug!("释放检测器");
        }
        if self.gray.take().is_some() {
            debug!("释放灰度缓冲");
        }
        if let Some(capture) = self.capture.take() {
            drop(capture);
            debug!("释放采集设备");
        }
    }
}

impl<D: FeatureDetector, C: CaptureDevice> Drop for TrackingLoop<D, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = LoopStats::default();
        stats.record(10, 0);
        stats.record(12, 7);
        stats.record(9, 9);

        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.features, 31);
        assert_eq!(stats.tracked, 16);
        assert_eq!(stats.new, 15);
    }

    #[test]
    fn test_stats_tracked_never_exceeds_features() {
        let mut stats = LoopStats::default();
        stats.record(2, 5);
        assert_eq!(stats.new, 0);
        assert_eq!(stats.tracked, 2);
    }

    #[test]
    fn test_stats_window_report_with_overcounted_tracks() {
        let mut stats = LoopStats::default();
        stats.record(3, 1);
        // 让下一次记录触发每秒统计输出
        stats.window_start = Some(Instant::now() - Duration::from_secs(2));
        stats.record(1, 4);

        assert_eq!(stats.tracked, 2);
        assert_eq!(stats.new, 2);
        assert!(stats.current_fps > 0.0);
        assert_eq!(stats.window_frames, 0);
        assert_eq!(stats.window_tracked, 0);
    }
}
