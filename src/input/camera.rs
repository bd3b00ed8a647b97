//! 摄像头输入模块 - 本地摄像头采集设备
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)
//! FFmpeg 在自己的线程中解码, 帧通过有界通道交给主循环

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::core::scheduler::ffmpeg_scheduler::{FfmpegScheduler, Running};
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::decode_filter::DecodeFilter;
use super::CaptureDevice;
use crate::error::{Result, TrackError};

/// 等待一帧的最长时间, 超时视为采集失败
const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// 摄像头采集设备
pub struct CameraCapture {
    device_index: usize,
    device_name: String,
    scheduler: Option<FfmpegScheduler<Running>>,
    rx: Option<Receiver<RgbImage>>,
    current: Option<RgbImage>,
}

impl CameraCapture {
    /// 打开摄像头 (解码在 `configure` 后开始)
    pub fn open(device_index: usize) -> Result<Self> {
        let devices = get_camera_devices();
        let device_name = match devices.iter().find(|(i, _)| *i == device_index) {
            Some((_, name)) => name.clone(),
            None if devices.is_empty() && cfg!(target_os = "linux") => {
                // v4l2 设备枚举可能为空, 直接检查设备节点
                let node = format!("/dev/video{}", device_index);
                if !std::path::Path::new(&node).exists() {
                    return Err(TrackError::CaptureOpen {
                        index: device_index,
                        reason: format!("{} does not exist", node),
                    });
                }
                node
            }
            None => {
                return Err(TrackError::CaptureOpen {
                    index: device_index,
                    reason: format!("{} video devices found", devices.len()),
                });
            }
        };

        info!("📷 设备索引: {}", device_index);
        info!("📷 设备名称: {}", device_name);

        Ok(Self {
            device_index,
            device_name,
            scheduler: None,
            rx: None,
            current: None,
        })
    }

    /// 格式化摄像头URL - 根据平台选择
    fn format_camera_url(index: usize, name: &str) -> String {
        #[cfg(target_os = "windows")]
        {
            let _ = index;
            format!("video={}", name)
        }
        #[cfg(target_os = "macos")]
        {
            let _ = name;
            format!("{}", index)
        }
        #[cfg(target_os = "linux")]
        {
            let _ = name;
            format!("/dev/video{}", index)
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            let _ = name;
            format!("{}", index)
        }
    }

    fn input_format() -> &'static str {
        #[cfg(target_os = "windows")]
        let format = "dshow"; // DirectShow

        #[cfg(target_os = "macos")]
        let format = "avfoundation"; // AVFoundation

        #[cfg(target_os = "linux")]
        let format = "v4l2"; // Video4Linux2

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        let format = "video4linux2"; // 默认

        format
    }

    fn start(&mut self, width: u32, height: u32) -> Result<()> {
        let camera_url = Self::format_camera_url(self.device_index, &self.device_name);
        let format = Self::input_format();
        info!("🔍 使用格式: {}, 输入: {}", format, camera_url);

        // 容量2: 主循环跟不上时丢弃新帧
        let (tx, rx) = crossbeam_channel::bounded(2);
        let filter = DecodeFilter::new(tx, width, height);

        // 构建帧处理管线
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let size = format!("{}x{}", width, height);
        let input = Input::new(camera_url)
            .set_format(format)
            .set_input_opts([("framerate", "30"), ("video_size", size.as_str())].into());

        // 摄像头不一定支持请求的分辨率, 由 scale 滤镜保证输出尺寸
        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_desc(format!("scale={}:{},format=yuv420p", width, height))
            .output(out)
            .build()
            .map_err(|e| TrackError::CaptureOpen {
                index: self.device_index,
                reason: e.to_string(),
            })?;

        let scheduler = ctx.start().map_err(|e| TrackError::CaptureOpen {
            index: self.device_index,
            reason: e.to_string(),
        })?;

        info!("✅ 摄像头连接成功,开始解码!");
        self.scheduler = Some(scheduler);
        self.rx = Some(rx);
        Ok(())
    }
}

impl CaptureDevice for CameraCapture {
    fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.abort();
            self.rx = None;
        }
        self.start(width, height)
    }

    fn query_frame(&mut self) -> Option<&mut RgbImage> {
        let rx = self.rx.as_ref()?;
        match rx.recv_timeout(FRAME_TIMEOUT) {
            Ok(frame) => {
                self.current = Some(frame);
                self.current.as_mut()
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("⚠️ {}秒内未收到摄像头帧", FRAME_TIMEOUT.as_secs());
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("❌ 摄像头解码已结束");
                None
            }
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        // 先断开通道, 解码线程的下一次发送会失败并退出
        self.rx = None;
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.abort();
        }
        debug!("📹 摄像头已释放: {}", self.device_name);
    }
}

/// 获取可用的摄像头设备列表
pub fn get_camera_devices() -> Vec<(usize, String)> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices.into_iter().enumerate().collect(),
        Err(e) => {
            warn!("⚠️ 获取摄像头列表失败: {}", e);
            vec![]
        }
    }
}
