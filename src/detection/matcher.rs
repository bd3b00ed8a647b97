//! 跨帧特征匹配 (Cross-frame feature matcher)
//!
//! 在空间邻域 + 相邻尺度内做描述子最近邻搜索, 比值检验后按距离贪心分配,
//! 保证每个上一帧特征最多被匹配一次

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{Detections, MatchTable};

/// 匹配参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// 搜索半径 (像素)
    pub search_radius: f32,
    /// 最大描述子距离 (L2, 描述子已归一化)
    pub max_distance: f32,
    /// 最近/次近距离比值阈值
    pub ratio: f32,
    /// 允许的最大尺度差
    pub max_scale_diff: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            search_radius: 32.0,
            max_distance: 0.5,
            ratio: 0.8,
            max_scale_diff: 1,
        }
    }
}

/// 候选匹配: (描述子距离, 当前帧序号, 上一帧序号)
type Candidate = (f32, usize, usize);

pub struct Matcher {
    config: MatcherConfig,
    // 以下缓冲每帧复用
    candidates: Vec<Candidate>,
    past_used: Vec<bool>,
    assigned: Vec<Option<usize>>,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            candidates: Vec::new(),
            past_used: Vec::new(),
            assigned: Vec::new(),
        }
    }

    /// 关联当前帧与上一帧, 返回匹配数量
    ///
    /// 已存在的匹配表会被复用 (清空后重新填充), 否则新建
    pub fn track<D: Detections>(
        &mut self,
        current: &mut D,
        past: Option<&D>,
        table: &mut Option<MatchTable>,
    ) -> usize {
        for f in current.features_mut() {
            f.mtable_id = None;
        }

        let past = match past {
            Some(p) => p,
            None => {
                if let Some(t) = table.as_mut() {
                    t.reset(0);
                }
                return 0;
            }
        };

        self.collect_candidates(&*current, past);
        // 稳定排序: 距离相同时保持当前帧顺序
        self.candidates
            .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        self.past_used.clear();
        self.past_used.resize(past.features().len(), false);
        self.assigned.clear();
        self.assigned.resize(current.features().len(), None);

        for &(_, i, j) in &self.candidates {
            if !self.past_used[j] && self.assigned[i].is_none() {
                self.past_used[j] = true;
                self.assigned[i] = Some(j);
            }
        }

        let t = table.get_or_insert_with(|| MatchTable::new(past.sequence()));
        t.reset(past.sequence());

        let features = current.features_mut();
        for (i, slot) in self.assigned.iter().enumerate() {
            if let Some(j) = *slot {
                features[i].mtable_id = Some(t.push(j));
            }
        }

        debug!(
            "匹配: 当前{} 上一帧{} 候选{} 成功{}",
            features.len(),
            past.features().len(),
            self.candidates.len(),
            t.len()
        );
        t.len()
    }

    fn collect_candidates<D: Detections>(&mut self, current: &D, past: &D) {
        self.candidates.clear();
        let radius_sq = self.config.search_radius * self.config.search_radius;

        for (i, f) in current.features().iter().enumerate() {
            let mut best: Option<(f32, usize)> = None;
            let mut second: Option<f32> = None;

            for (j, g) in past.features().iter().enumerate() {
                if f.scale.abs_diff(g.scale) > self.config.max_scale_diff {
                    continue;
                }
                let dx = f.x as f32 - g.x as f32;
                let dy = f.y as f32 - g.y as f32;
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }

                let d = f.distance_sq(g).sqrt();
                match best {
                    Some((d1, _)) if d >= d1 => {
                        if second.map_or(true, |d2| d < d2) {
                            second = Some(d);
                        }
                    }
                    _ => {
                        second = best.map(|(d1, _)| d1);
                        best = Some((d, j));
                    }
                }
            }

            if let Some((d1, j)) = best {
                let distinct = second.map_or(true, |d2| d1 < self.config.ratio * d2);
                if d1 <= self.config.max_distance && distinct {
                    self.candidates.push((d1, i, j));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::{DetectionResult, Feature, DESCRIPTOR_LEN};

    fn feature(x: u32, y: u32, scale: usize, hot: usize) -> Feature {
        let mut f = Feature::new(x, y, scale);
        f.descriptor = [0.0; DESCRIPTOR_LEN];
        f.descriptor[hot] = 1.0;
        f
    }

    #[test]
    fn test_no_past_clears_ids() {
        let mut matcher = Matcher::new(MatcherConfig::default());
        let mut current = DetectionResult::new(2, vec![feature(10, 10, 0, 0)], vec![2]);
        current.features[0].mtable_id = Some(7);
        let mut table = Some(MatchTable::new(1));

        assert_eq!(matcher.track(&mut current, None, &mut table), 0);
        assert_eq!(current.features[0].mtable_id, None);
        assert!(table.unwrap().is_empty());
    }

    #[test]
    fn test_matches_nearest_descriptor() {
        let mut matcher = Matcher::new(MatcherConfig::default());
        let past = DetectionResult::new(
            1,
            vec![feature(50, 50, 2, 3), feature(52, 50, 2, 9)],
            vec![2; 7],
        );
        let mut current = DetectionResult::new(
            2,
            vec![feature(60, 55, 2, 9), feature(200, 200, 2, 3)],
            vec![2; 7],
        );
        let mut table = None;

        assert_eq!(matcher.track(&mut current, Some(&past), &mut table), 1);
        let table = table.unwrap();
        assert_eq!(table.past_sequence(), 1);
        let id = current.features[0].mtable_id.unwrap();
        assert_eq!(table.resolve(id, past.features.len()), Some(1));
        // 超出搜索半径
        assert_eq!(current.features[1].mtable_id, None);
    }

    #[test]
    fn test_past_feature_matched_once() {
        let mut matcher = Matcher::new(MatcherConfig::default());
        let past = DetectionResult::new(1, vec![feature(40, 40, 1, 5)], vec![2; 7]);
        let mut current = DetectionResult::new(
            2,
            vec![feature(41, 40, 1, 5), feature(42, 40, 1, 5)],
            vec![2; 7],
        );
        let mut table = None;

        assert_eq!(matcher.track(&mut current, Some(&past), &mut table), 1);
        let matched = current.features.iter().filter(|f| f.mtable_id.is_some()).count();
        assert_eq!(matched, 1);
    }

    #[test]
    fn test_scale_gap_rejected() {
        let mut matcher = Matcher::new(MatcherConfig::default());
        let past = DetectionResult::new(1, vec![feature(40, 40, 0, 5)], vec![2; 7]);
        let mut current = DetectionResult::new(2, vec![feature(40, 40, 4, 5)], vec![2; 7]);
        let mut table = None;

        assert_eq!(matcher.track(&mut current, Some(&past), &mut table), 0);
    }

    #[test]
    fn test_table_reused() {
        let mut matcher = Matcher::new(MatcherConfig::default());
        let past = DetectionResult::new(4, vec![feature(40, 40, 1, 5)], vec![2; 7]);
        let mut current = DetectionResult::new(5, vec![feature(41, 41, 1, 5)], vec![2; 7]);
        let mut table = Some(MatchTable::new(3));
        for i in 0..16 {
            table.as_mut().unwrap().push(i);
        }

        matcher.track(&mut current, Some(&past), &mut table);
        let table = table.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.past_sequence(), 4);
    }
}
