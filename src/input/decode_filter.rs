/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info, warn};

/// FFmpeg解码过滤器: 摄像头 YUV420P 帧 → RgbImage → 主循环
#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<RgbImage>,
    width: u32,
    height: u32,
    pub count: usize,
    pub last: Instant,
    pub current_fps: f64,
    pub dropped_frames: usize, // 丢弃的帧数 (损坏/主循环来不及取)
    pub total_frames: usize,   // 总帧数
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbImage>, width: u32, height: u32) -> Self {
        Self {
            tx,
            width,
            height,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
            dropped_frames: 0,
            total_frames: 0,
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ 摄像头解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        self.total_frames += 1;

        unsafe {
            // 基本检查：空帧或损坏帧
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;

            // scale 滤镜保证输出尺寸, 不一致说明滤镜链异常
            if w != self.width || h != self.height {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    warn!("⚠️ 丢弃帧 #{}: 尺寸 {}x{} (期望 {}x{})", self.total_frames, w, h, self.width, self.height);
                }
                return Ok(None);
            }

            // YUV420P数据指针
            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.dropped_frames += 1;
                return Ok(None);
            }
            if y_stride < w as usize || uv_stride < (w as usize / 2) {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let mut rgb = RgbImage::new(w, h);
            yuv420p_to_rgb(
                y_plane,
                u_plane,
                v_plane,
                y_stride,
                uv_stride,
                &mut rgb,
            );

            match self.tx.try_send(rgb) {
                Ok(()) => self.count += 1,
                // 主循环来不及取: 丢弃该帧, 保持实时
                Err(TrySendError::Full(_)) => self.dropped_frames += 1,
                Err(TrySendError::Disconnected(_)) => {
                    return Err("capture receiver dropped".to_string());
                }
            }
        }

        // 计算FPS
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            self.current_fps = self.count as f64 / elapsed;
            debug!(
                "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                self.current_fps, self.total_frames, self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!("✅ 摄像头解码线程退出");
    }
}

/// YUV420P → RGB (BT.601, 定点)
#[inline]
unsafe fn yuv420p_to_rgb(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    out: &mut RgbImage,
) {
    let (width, height) = out.dimensions();
    let buffer: &mut [u8] = out;
    let mut out_idx = 0;
    for y in 0..height as usize {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width as usize {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
}
