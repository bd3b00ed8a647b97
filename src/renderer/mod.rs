/// 渲染系统 (Rendering System)
///
/// - Annotator:  在视频帧上标注特征 (新特征 / 已跟踪 + 运动线)
/// - FrameSink:  显示窗口统一接口
/// - MinifbWindow: 预览窗口 (需要 `display` 特性)
pub mod window;

pub use window::FrameSink;
#[cfg(feature = "display")]
pub use window::MinifbWindow;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use serde::{Deserialize, Serialize};

use crate::detection::{Feature, MatchTable};

/// 标注颜色 (RGB)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// 新出现的特征
    pub new: [u8; 3],
    /// 已跟踪的特征
    pub tracked: [u8; 3],
    /// 运动线
    pub motion: [u8; 3],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            new: [0, 0, 255],
            tracked: [0, 255, 0],
            motion: [255, 0, 0],
        }
    }
}

/// 查找特征在上一帧中的对应点
///
/// 上一帧或匹配表缺失时一律视为新特征, 即使 `mtable_id` 有效
pub fn resolve_track<'a>(
    feature: &Feature,
    past: Option<&'a [Feature]>,
    table: Option<&MatchTable>,
) -> Option<&'a Feature> {
    let past = past?;
    let table = table?;
    let id = feature.mtable_id?;
    table.resolve(id, past.len()).map(|index| &past[index])
}

/// 特征标注器
#[derive(Clone, Debug, Default)]
pub struct Annotator {
    palette: Palette,
}

impl Annotator {
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    /// 标记半径: 显式半径优先, 为0时取该尺度的范围
    pub fn marker_radius(feature: &Feature, radius: u32, extents: &[u32]) -> u32 {
        if radius != 0 {
            radius
        } else {
            extents.get(feature.scale).copied().unwrap_or(0)
        }
    }

    /// 圆圈 + 指向正上方的短线
    pub fn mark_feature(image: &mut RgbImage, feature: &Feature, radius: u32, color: Rgb<u8>) {
        let (x, y) = feature.point();
        let r = radius as i32;
        draw_hollow_circle_mut(image, (x, y), r, color);
        draw_line_segment_mut(image, (x as f32, y as f32), (x as f32, (y - r) as f32), color);
    }

    /// 标注当前帧的全部特征
    ///
    /// 已匹配的特征用跟踪颜色并画出到上一帧位置的运动线, 其余用新特征颜色
    pub fn mark_all(
        &self,
        image: &mut RgbImage,
        current: &[Feature],
        past: Option<&[Feature]>,
        table: Option<&MatchTable>,
        radius: u32,
        extents: &[u32],
    ) {
        let new = Rgb(self.palette.new);
        let tracked = Rgb(self.palette.tracked);
        let motion = Rgb(self.palette.motion);

        for f in current {
            let r = Self::marker_radius(f, radius, extents);
            match resolve_track(f, past, table) {
                Some(prev) => {
                    Self::mark_feature(image, f, r, tracked);
                    let (x0, y0) = f.point();
                    let (x1, y1) = prev.point();
                    draw_line_segment_mut(
                        image,
                        (x0 as f32, y0 as f32),
                        (x1 as f32, y1 as f32),
                        motion,
                    );
                }
                None => Self::mark_feature(image, f, r, new),
            }
        }
    }
}
