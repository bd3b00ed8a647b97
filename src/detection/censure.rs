//! CenSurE 中心-环绕极值检测器 (Center Surround Extremas)
//!
//! 参考: Agrawal, Konolige, Blas — "CenSurE: Center Surround Extremas for
//! Realtime Feature Detection and Matching" (ECCV 2008)
//!
//! ## 流程
//! ```text
//! 像素回调 → 积分图 → 7个尺度的中心-环绕响应 → 3x3x3 极值抑制
//!          → 按响应强度截断 → SURF式64维描述子
//! ```
//! 积分图和响应体在初始化时按配置尺寸一次性分配, 每帧复用

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::matcher::{Matcher, MatcherConfig};
use super::types::{DetectionResult, Feature, FilterKind, MatchTable, DESCRIPTOR_LEN};
use super::{FeatureDetector, PixelAccessor};
use crate::error::{Result, TrackError};

/// 尺度数量
pub const NUM_SCALES: usize = 7;

/// 各尺度内核半径 (外核半径为其2倍)
const INNER: [u32; NUM_SCALES] = [1, 2, 3, 4, 6, 8, 10];

/// 检测器参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CensureConfig {
    pub filter: FilterKind,
    /// |响应| 最小值 (灰度均值差)
    pub response_threshold: f32,
    /// 每帧最多保留的特征数
    pub max_features: usize,
}

impl Default for CensureConfig {
    fn default() -> Self {
        Self {
            filter: FilterKind::Octagon,
            response_threshold: 12.0,
            max_features: 300,
        }
    }
}

/// 单个尺度的几何参数
#[derive(Clone, Copy, Debug)]
struct ScaleGeometry {
    inner: u32,
    outer: u32,
    /// 描述子采样步长 (偶数)
    step: u32,
    /// 检测时距图像边缘的最小距离
    border: u32,
}

impl ScaleGeometry {
    fn new(inner: u32) -> Self {
        let outer = inner * 2;
        let step = ((outer + 3) / 4).max(1) * 2;
        let border = outer.max(4 * step) + 1;
        Self {
            inner,
            outer,
            step,
            border,
        }
    }
}

pub struct CensureDetector {
    config: CensureConfig,
    width: u32,
    height: u32,
    scales: [ScaleGeometry; NUM_SCALES],
    extents: Vec<u32>,
    /// (h+1) x (w+1) 积分图
    integral: Array2<i64>,
    /// 尺度 x 高 x 宽 响应体
    responses: Array3<f32>,
    matcher: Matcher,
    sequence: u64,
}

impl CensureDetector {
    /// 按滤波器类型和图像尺寸初始化, 其余参数取默认值
    pub fn initialize(kind: FilterKind, width: u32, height: u32) -> Result<Self> {
        let config = CensureConfig {
            filter: kind,
            ..Default::default()
        };
        Self::new(config, MatcherConfig::default(), width, height)
    }

    pub fn new(config: CensureConfig, matcher: MatcherConfig, width: u32, height: u32) -> Result<Self> {
        let scales = INNER.map(ScaleGeometry::new);
        let max_border = scales.iter().map(|s| s.border).max().unwrap_or(0);
        let min_side = 2 * max_border + 2;

        if width < min_side || height < min_side {
            return Err(TrackError::DetectorInit(format!(
                "image {}x{} is smaller than the {}x{} minimum",
                width, height, min_side, min_side
            )));
        }
        if config.response_threshold <= 0.0 || config.max_features == 0 {
            return Err(TrackError::DetectorInit(
                "response threshold and max features must be positive".to_string(),
            ));
        }

        let (w, h) = (width as usize, height as usize);
        info!(
            "✅ CenSurE 初始化: {:?} {}x{}, {}个尺度",
            config.filter, width, height, NUM_SCALES
        );

        Ok(Self {
            config,
            width,
            height,
            extents: scales.iter().map(|s| s.outer).collect(),
            scales,
            integral: Array2::zeros((h + 1, w + 1)),
            responses: Array3::zeros((NUM_SCALES, h, w)),
            matcher: Matcher::new(matcher),
            sequence: 0,
        })
    }

    /// 各尺度的标记半径
    fn build_integral<I: ?Sized>(&mut self, pixel: PixelAccessor<I>, image: &I) {
        let (w, h) = (self.width as usize, self.height as usize);
        for y in 0..h {
            let mut row_sum = 0i64;
            for x in 0..w {
                row_sum += pixel(image, x as u32, y as u32) as i64;
                self.integral[[y + 1, x + 1]] = self.integral[[y, x + 1]] + row_sum;
            }
        }
    }

    /// 半开区间 [x0, x1) x [y0, y1) 的像素和
    #[inline]
    fn box_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> i64 {
        let ii = &self.integral;
        ii[[y1, x1]] - ii[[y0, x1]] - ii[[y1, x0]] + ii[[y0, x0]]
    }

    /// 以 (x, y) 为中心, 半径 r 的形状的 (像素和, 面积)
    fn shape_sum(&self, x: usize, y: usize, r: usize) -> (i64, i64) {
        let side = 2 * r as i64 + 1;
        match self.config.filter {
            FilterKind::Box => (self.box_sum(x - r, y - r, x + r + 1, y + r + 1), side * side),
            FilterKind::Octagon => {
                // 横竖两个矩形的并集, 四角各切去 r/3
                let c = r / 3;
                let k = r - c;
                let short = 2 * k as i64 + 1;
                let horizontal = self.box_sum(x - r, y - k, x + r + 1, y + k + 1);
                let vertical = self.box_sum(x - k, y - r, x + k + 1, y + r + 1);
                let center = self.box_sum(x - k, y - k, x + k + 1, y + k + 1);
                (horizontal + vertical - center, 2 * side * short - short * short)
            }
        }
    }

    fn compute_responses(&mut self) {
        self.responses.fill(0.0);
        let (w, h) = (self.width as usize, self.height as usize);

        for s in 0..NUM_SCALES {
            let geo = self.scales[s];
            let b = geo.border as usize;
            for y in b..h - b {
                for x in b..w - b {
                    let (inner_sum, inner_area) = self.shape_sum(x, y, geo.inner as usize);
                    let (outer_sum, outer_area) = self.shape_sum(x, y, geo.outer as usize);
                    let ring_area = outer_area - inner_area;
                    let response = inner_sum as f32 / inner_area as f32
                        - (outer_sum - inner_sum) as f32 / ring_area as f32;
                    self.responses[[s, y, x]] = response;
                }
            }
        }
    }

    fn is_extremum(&self, s: usize, y: usize, x: usize, value: f32) -> bool {
        let s_lo = s.saturating_sub(1);
        let s_hi = (s + 1).min(NUM_SCALES - 1);
        for ns in s_lo..=s_hi {
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    if ns == s && ny == y && nx == x {
                        continue;
                    }
                    let other = self.responses[[ns, ny, nx]];
                    if (value > 0.0 && other >= value) || (value < 0.0 && other <= value) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// (|响应|, x, y, 尺度, 响应)
    fn find_extrema(&self) -> Vec<(f32, u32, u32, usize, f32)> {
        let (w, h) = (self.width as usize, self.height as usize);
        let threshold = self.config.response_threshold;
        let mut found = Vec::new();

        for s in 0..NUM_SCALES {
            let b = self.scales[s].border as usize;
            for y in b..h - b {
                for x in b..w - b {
                    let v = self.responses[[s, y, x]];
                    if v.abs() >= threshold && self.is_extremum(s, y, x, v) {
                        found.push((v.abs(), x as u32, y as u32, s, v));
                    }
                }
            }
        }

        // 稳定排序: 强度相同保持扫描顺序
        found.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        found.truncate(self.config.max_features);
        found
    }

    /// 4x4 子区域, 每个子区域 2x2 个 Haar 采样: (Σdx, Σdy, Σ|dx|, Σ|dy|)
    fn describe(&self, x: u32, y: u32, scale: usize) -> [f32; DESCRIPTOR_LEN] {
        let step = self.scales[scale].step as usize;
        let half = step / 2;
        let x0 = x as usize - 4 * step;
        let y0 = y as usize - 4 * step;
        let mut desc = [0.0f32; DESCRIPTOR_LEN];

        for i in 0..4 {
            for j in 0..4 {
                let base = (i * 4 + j) * 4;
                for a in 0..2 {
                    for b in 0..2 {
                        let sx = x0 + (2 * j + b) * step;
                        let sy = y0 + (2 * i + a) * step;
                        let dx = self.box_sum(sx + half, sy, sx + step, sy + step)
                            - self.box_sum(sx, sy, sx + half, sy + step);
                        let dy = self.box_sum(sx, sy + half, sx + step, sy + step)
                            - self.box_sum(sx, sy, sx + step, sy + half);
                        let (dx, dy) = (dx as f32, dy as f32);
                        desc[base] += dx;
                        desc[base + 1] += dy;
                        desc[base + 2] += dx.abs();
                        desc[base + 3] += dy.abs();
                    }
                }
            }
        }

        let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 1e-6 {
            desc.iter_mut().for_each(|v| *v /= norm);
        }
        desc
    }
}

impl FeatureDetector for CensureDetector {
    type Detection = DetectionResult;

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn detect<I: ?Sized>(&mut self, pixel: PixelAccessor<I>, image: &I) -> Result<DetectionResult> {
        self.build_integral(pixel, image);
        self.compute_responses();

        let features: Vec<Feature> = self
            .find_extrema()
            .into_iter()
            .map(|(_, x, y, scale, response)| Feature {
                x,
                y,
                scale,
                response,
                mtable_id: None,
                descriptor: self.describe(x, y, scale),
            })
            .collect();

        self.sequence += 1;
        debug!("检测 #{}: {}个特征", self.sequence, features.len());
        Ok(DetectionResult::new(self.sequence, features, self.extents.clone()))
    }

    fn track(
        &mut self,
        current: &mut DetectionResult,
        past: Option<&DetectionResult>,
        table: &mut Option<MatchTable>,
    ) -> Result<()> {
        self.matcher.track(current, past, table);
        Ok(())
    }
}
