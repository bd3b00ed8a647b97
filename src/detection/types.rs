/// 特征检测数据结构定义
/// Data structures for feature detection and tracking
use serde::{Deserialize, Serialize};

// ========== 公共常量 ==========

/// 描述子维度 (4x4子区域 × 4个Haar统计量)
pub const DESCRIPTOR_LEN: usize = 64;

// ========== 枚举类型 ==========

/// 中心-环绕滤波器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// 方形 (Difference of Boxes)
    #[value(name = "box")]
    Box,
    /// 八边形 (更接近圆形的响应)
    #[value(name = "oct")]
    #[serde(rename = "oct")]
    Octagon,
}

impl Default for FilterKind {
    fn default() -> Self {
        FilterKind::Octagon
    }
}

// ========== 数据结构 ==========

/// 单个特征点
///
/// 检测后不可变; `mtable_id` 是唯一由跟踪阶段写入的字段
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub x: u32,
    pub y: u32,
    /// 尺度索引 (对应 `DetectionResult::extents`)
    pub scale: usize,
    /// 中心-环绕响应值 (带符号)
    pub response: f32,
    /// 当前匹配表中的行号, None 表示未匹配
    pub mtable_id: Option<usize>,
    pub descriptor: [f32; DESCRIPTOR_LEN],
}

impl Feature {
    pub fn new(x: u32, y: u32, scale: usize) -> Self {
        Self {
            x,
            y,
            scale,
            response: 0.0,
            mtable_id: None,
            descriptor: [0.0; DESCRIPTOR_LEN],
        }
    }

    pub fn point(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }

    /// 描述子平方距离
    pub fn distance_sq(&self, other: &Feature) -> f32 {
        self.descriptor
            .iter()
            .zip(other.descriptor.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// 单帧检测结果 (特征 + 各尺度的标记半径)
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// 检测序号 (单调递增)
    pub sequence: u64,
    pub features: Vec<Feature>,
    pub extents: Vec<u32>,
}

impl DetectionResult {
    pub fn new(sequence: u64, features: Vec<Feature>, extents: Vec<u32>) -> Self {
        Self {
            sequence,
            features,
            extents,
        }
    }
}

/// 检测结果的只读/可写视图
///
/// 检测器可以返回自己的结果类型, 只要能暴露特征序列和尺度半径
pub trait Detections {
    fn sequence(&self) -> u64;
    fn features(&self) -> &[Feature];
    fn features_mut(&mut self) -> &mut [Feature];
    fn extents(&self) -> &[u32];
}

impl Detections for DetectionResult {
    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }

    fn features_mut(&mut self) -> &mut [Feature] {
        &mut self.features
    }

    fn extents(&self) -> &[u32] {
        &self.extents
    }
}

/// 跨帧匹配表: `mtable_id` → 上一帧特征序号
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchTable {
    /// 构建时所对应的上一帧检测序号
    past_sequence: u64,
    rows: Vec<usize>,
}

impl MatchTable {
    pub fn new(past_sequence: u64) -> Self {
        Self {
            past_sequence,
            rows: Vec::new(),
        }
    }

    /// 清空并重新绑定到另一帧 (保留已分配的内存)
    pub fn reset(&mut self, past_sequence: u64) {
        self.past_sequence = past_sequence;
        self.rows.clear();
    }

    /// 追加一行, 返回新的 mtable_id
    pub fn push(&mut self, past_index: usize) -> usize {
        self.rows.push(past_index);
        self.rows.len() - 1
    }

    pub fn past_sequence(&self) -> u64 {
        self.past_sequence
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 查找 `mtable_id` 对应的上一帧特征序号, 越界返回 None
    pub fn resolve(&self, mtable_id: usize, past_len: usize) -> Option<usize> {
        self.rows
            .get(mtable_id)
            .copied()
            .filter(|&index| index < past_len)
    }
}
