/// 检测系统 (Detection System)
///
/// 特征检测与跨帧跟踪的协作方接口:
/// - FeatureDetector: 检测 + 跟踪统一接口
/// - CensureDetector: 中心-环绕极值检测器 (参考实现)
/// - Matcher:         描述子最近邻匹配 (参考实现)
pub mod censure;
pub mod matcher;
pub mod types;

pub use censure::{CensureConfig, CensureDetector};
pub use matcher::{Matcher, MatcherConfig};
pub use types::{Detections, DetectionResult, Feature, FilterKind, MatchTable, DESCRIPTOR_LEN};

use crate::error::Result;

/// 像素读取回调: (图像, x, y) → 灰度值
///
/// 检测器只通过这个回调读取像素, 不依赖图像的具体类型
pub type PixelAccessor<I> = fn(&I, u32, u32) -> u32;

/// 特征检测/跟踪协作方
///
/// 初始化由实现者自己的构造函数完成 (滤波器类型 + 图像尺寸);
/// 释放由 `Drop` 完成
pub trait FeatureDetector {
    /// 单帧检测结果类型
    type Detection: Detections;

    /// 配置的图像尺寸 (宽, 高)
    fn dimensions(&self) -> (u32, u32);

    /// 检测一帧, 返回新的检测结果
    fn detect<I: ?Sized>(&mut self, pixel: PixelAccessor<I>, image: &I) -> Result<Self::Detection>;

    /// 将当前帧特征与上一帧特征关联
    ///
    /// 写入 `current` 中每个特征的 `mtable_id`, 并创建或刷新 `table`。
    /// `past` 为 None 时所有特征均为未匹配。
    fn track(
        &mut self,
        current: &mut Self::Detection,
        past: Option<&Self::Detection>,
        table: &mut Option<MatchTable>,
    ) -> Result<()>;
}
