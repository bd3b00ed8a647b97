/// 视频输入系统 (Video Input System)
///
/// 负责帧采集与灰度转换
/// - CaptureDevice:  采集设备统一接口
/// - CameraCapture:  本地摄像头 (DirectShow/AVFoundation/V4L2, 需要 `camera` 特性)
/// - PatternCapture: 合成测试图案 (无需硬件)
/// - gray_intensity: 交给检测器的像素读取回调
#[cfg(feature = "camera")]
pub mod camera;
#[cfg(feature = "camera")]
pub mod decode_filter;
pub mod pattern;

#[cfg(feature = "camera")]
pub use camera::{get_camera_devices, CameraCapture};
pub use pattern::PatternCapture;

use image::{GrayImage, RgbImage};

use crate::error::Result;

/// 采集设备
///
/// 释放由 `Drop` 完成
pub trait CaptureDevice {
    /// 请求采集分辨率
    fn configure(&mut self, width: u32, height: u32) -> Result<()>;

    /// 取下一帧
    ///
    /// 返回的帧借用自设备, 只在本次迭代内有效; None 表示采集失败
    fn query_frame(&mut self) -> Option<&mut RgbImage>;
}

/// 像素读取回调: 灰度图 (x, y) 处的亮度
///
/// 坐标由检测器按初始化尺寸给出, 不做越界检查之外的处理
#[inline]
pub fn gray_intensity(image: &GrayImage, x: u32, y: u32) -> u32 {
    image.get_pixel(x, y).0[0] as u32
}

/// RGB → 灰度 (BT.601, 定点)
///
/// 写入已分配的缓冲, 尺寸必须一致
pub fn convert_to_gray(src: &RgbImage, dst: &mut GrayImage) {
    debug_assert_eq!(src.dimensions(), dst.dimensions());
    for (s, d) in src.pixels().zip(dst.pixels_mut()) {
        let [r, g, b] = s.0;
        // 0.299, 0.587, 0.114 乘以 2^14
        let luma = (4899 * r as u32 + 9617 * g as u32 + 1868 * b as u32 + (1 << 13)) >> 14;
        d.0[0] = luma.min(255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_convert_to_gray_weights() {
        let mut src = RgbImage::new(4, 1);
        src.put_pixel(0, 0, Rgb([255, 255, 255]));
        src.put_pixel(1, 0, Rgb([255, 0, 0]));
        src.put_pixel(2, 0, Rgb([0, 255, 0]));
        src.put_pixel(3, 0, Rgb([0, 0, 255]));
        let mut dst = GrayImage::new(4, 1);

        convert_to_gray(&src, &mut dst);

        assert_eq!(dst.get_pixel(0, 0), &Luma([255]));
        assert_eq!(dst.get_pixel(1, 0), &Luma([76]));
        assert_eq!(dst.get_pixel(2, 0), &Luma([150]));
        assert_eq!(dst.get_pixel(3, 0), &Luma([29]));
    }

    #[test]
    fn test_gray_intensity() {
        let mut img = GrayImage::new(3, 2);
        img.put_pixel(2, 1, Luma([200]));
        assert_eq!(gray_intensity(&img, 2, 1), 200);
        assert_eq!(gray_intensity(&img, 0, 0), 0);
    }
}
