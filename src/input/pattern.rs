//! 合成测试图案 - 不依赖摄像头的采集设备
//!
//! 随机纹理方块在暗背景上匀速漂移, 相同种子生成相同序列

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::CaptureDevice;
use crate::error::Result;

const BACKGROUND: Rgb<u8> = Rgb([30, 30, 30]);
/// 每帧位移 (像素)
const DRIFT: (i32, i32) = (2, 1);

#[derive(Clone, Debug)]
struct Blob {
    x: i32,
    y: i32,
    half: u32,
    color: Rgb<u8>,
}

pub struct PatternCapture {
    seed: u64,
    blob_count: usize,
    blobs: Vec<Blob>,
    frame: RgbImage,
    frames: u64,
    frame_limit: Option<u64>,
}

impl PatternCapture {
    pub fn new(seed: u64, width: u32, height: u32) -> Self {
        let mut capture = Self {
            seed,
            blob_count: 24,
            blobs: Vec::new(),
            frame: RgbImage::new(width, height),
            frames: 0,
            frame_limit: None,
        };
        capture.scatter();
        capture
    }

    /// 采集 `limit` 帧后返回 None (模拟设备断开)
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames
    }

    fn scatter(&mut self) {
        let (w, h) = self.frame.dimensions();
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.blobs = (0..self.blob_count)
            .map(|_| Blob {
                x: rng.gen_range(0..w.max(1)) as i32,
                y: rng.gen_range(0..h.max(1)) as i32,
                half: rng.gen_range(3..=8),
                color: Rgb([
                    rng.gen_range(120..=255),
                    rng.gen_range(120..=255),
                    rng.gen_range(120..=255),
                ]),
            })
            .collect();
    }

    fn render(&mut self) {
        let (w, h) = self.frame.dimensions();
        let t = self.frames as i32;
        for p in self.frame.pixels_mut() {
            *p = BACKGROUND;
        }
        for blob in &self.blobs {
            let cx = (blob.x + DRIFT.0 * t).rem_euclid(w as i32);
            let cy = (blob.y + DRIFT.1 * t).rem_euclid(h as i32);
            let side = 2 * blob.half + 1;
            let rect = Rect::at(cx - blob.half as i32, cy - blob.half as i32).of_size(side, side);
            draw_filled_rect_mut(&mut self.frame, rect, blob.color);
        }
    }
}

impl CaptureDevice for PatternCapture {
    fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        if self.frame.dimensions() != (width, height) {
            self.frame = RgbImage::new(width, height);
            self.scatter();
        }
        info!("🎨 测试图案: {}x{}, 种子 {}", width, height, self.seed);
        Ok(())
    }

    fn query_frame(&mut self) -> Option<&mut RgbImage> {
        if self.frame_limit.is_some_and(|limit| self.frames >= limit) {
            return None;
        }
        self.render();
        self.frames += 1;
        Some(&mut self.frame)
    }
}

impl Drop for PatternCapture {
    fn drop(&mut self) {
        debug!("测试图案释放 (共{}帧)", self.frames);
    }
}
