//! 预览窗口
//!
//! `poll_key` 在等待按键的同时为主循环限速

use std::time::Duration;

use image::RgbImage;

use crate::error::Result;

/// ESC 键码
pub const KEY_ESC: u32 = 27;

/// 显示输出
pub trait FrameSink {
    /// 显示一帧
    fn show(&mut self, frame: &RgbImage) -> Result<()>;

    /// 最多阻塞 `timeout` 等待按键, 返回键码
    fn poll_key(&mut self, timeout: Duration) -> Option<u32>;
}

#[cfg(feature = "display")]
pub use self::minifb_window::MinifbWindow;

#[cfg(feature = "display")]
mod minifb_window {
    use std::time::{Duration, Instant};

    use image::RgbImage;
    use minifb::{Key, KeyRepeat, Window, WindowOptions};
    use tracing::{debug, info};

    use super::{FrameSink, KEY_ESC};
    use crate::error::{Result, TrackError};

    /// minifb 预览窗口, 首帧到达时按帧尺寸创建
    pub struct MinifbWindow {
        name: String,
        window: Option<Window>,
        /// 0RGB 像素缓冲 (复用)
        buffer: Vec<u32>,
        size: (usize, usize),
    }

    impl MinifbWindow {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                window: None,
                buffer: Vec::new(),
                size: (0, 0),
            }
        }

        fn ensure_window(&mut self, width: usize, height: usize) -> Result<&mut Window> {
            if self.window.is_none() || self.size != (width, height) {
                let window = Window::new(&self.name, width, height, WindowOptions::default())
                    .map_err(|e| TrackError::Display(e.to_string()))?;
                info!("🖼️ 窗口创建: {} ({}x{})", self.name, width, height);
                self.window = Some(window);
                self.size = (width, height);
            }
            self.window
                .as_mut()
                .ok_or_else(|| TrackError::Display("window not created".to_string()))
        }
    }

    fn key_code(key: Key) -> u32 {
        match key {
            Key::Escape => KEY_ESC,
            Key::Enter => 13,
            Key::Space => 32,
            Key::Tab => 9,
            Key::Backspace => 8,
            _ => 0,
        }
    }

    impl FrameSink for MinifbWindow {
        fn show(&mut self, frame: &RgbImage) -> Result<()> {
            let (w, h) = (frame.width() as usize, frame.height() as usize);
            self.buffer.clear();
            self.buffer.extend(
                frame
                    .pixels()
                    .map(|p| ((p.0[0] as u32) << 16) | ((p.0[1] as u32) << 8) | p.0[2] as u32),
            );

            let buffer = std::mem::take(&mut self.buffer);
            let result = self
                .ensure_window(w, h)
                .and_then(|window| {
                    window
                        .update_with_buffer(&buffer, w, h)
                        .map_err(|e| TrackError::Display(e.to_string()))
                });
            self.buffer = buffer;
            result
        }

        fn poll_key(&mut self, timeout: Duration) -> Option<u32> {
            let window = self.window.as_mut()?;
            let deadline = Instant::now() + timeout;
            loop {
                window.update();
                // 关闭窗口等同于退出键
                if !window.is_open() {
                    return Some(KEY_ESC);
                }
                if let Some(&key) = window.get_keys_pressed(KeyRepeat::No).first() {
                    return Some(key_code(key));
                }
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                std::thread::sleep((deadline - now).min(Duration::from_millis(1)));
            }
        }
    }

    impl Drop for MinifbWindow {
        fn drop(&mut self) {
            if self.window.take().is_some() {
                debug!("窗口关闭: {}", self.name);
            }
        }
    }
}
