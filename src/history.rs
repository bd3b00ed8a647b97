//! 两帧历史缓冲 (Frame history)
//!
//! 两个固定存储格 + 一个角色位: 每次迭代只翻转角色, 不移动数据。
//! 翻转后成为 CURRENT 的格子里是两帧前的旧结果, 立即释放,
//! 保证下一次检测永远写入空格。

#[derive(Debug)]
pub struct FrameHistory<T> {
    slot_a: Option<T>,
    slot_b: Option<T>,
    current_is_a: bool,
}

impl<T> Default for FrameHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameHistory<T> {
    pub fn new() -> Self {
        Self {
            slot_a: None,
            slot_b: None,
            current_is_a: true,
        }
    }

    pub fn current(&self) -> Option<&T> {
        if self.current_is_a {
            self.slot_a.as_ref()
        } else {
            self.slot_b.as_ref()
        }
    }

    pub fn past(&self) -> Option<&T> {
        if self.current_is_a {
            self.slot_b.as_ref()
        } else {
            self.slot_a.as_ref()
        }
    }

    /// 同时借出 (CURRENT 可写, PAST 只读)
    pub fn split_mut(&mut self) -> (Option<&mut T>, Option<&T>) {
        if self.current_is_a {
            (self.slot_a.as_mut(), self.slot_b.as_ref())
        } else {
            (self.slot_b.as_mut(), self.slot_a.as_ref())
        }
    }

    /// 写入 CURRENT
    ///
    /// 正常流程中 CURRENT 在 `advance` 后已为空; 若仍有值则先释放再写入
    pub fn store_current(&mut self, value: T) -> &mut T {
        let slot = if self.current_is_a {
            &mut self.slot_a
        } else {
            &mut self.slot_b
        };
        drop(slot.take());
        slot.insert(value)
    }

    /// 翻转角色, 返回被淘汰的旧结果 (调用方负责释放)
    ///
    /// 翻转后 PAST 持有本次迭代的结果, CURRENT 为空
    pub fn advance(&mut self) -> Option<T> {
        self.current_is_a = !self.current_is_a;
        if self.current_is_a {
            self.slot_a.take()
        } else {
            self.slot_b.take()
        }
    }

    /// 释放两个格子, 与角色无关; 空格跳过
    pub fn clear(&mut self) -> usize {
        usize::from(self.slot_a.take().is_some()) + usize::from(self.slot_b.take().is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.slot_a.is_none() && self.slot_b.is_none()
    }
}
