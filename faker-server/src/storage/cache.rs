//! 最近小票缓存
//!
//! 固定容量的 FIFO 队列，满了之后淘汰最早的一条。多个会话 worker 并发写入，
//! 由内部互斥锁串行化。

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::receipt::Receipt;

pub const DEFAULT_CACHE_CAPACITY: usize = 500;

#[derive(Debug)]
pub struct RecentCache {
    capacity: usize,
    items: Mutex<VecDeque<Receipt>>,
}

impl RecentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 追加一条，返回被淘汰的小票
    ///
    /// 缓存不保存原始字节。
    pub fn push(&self, receipt: &Receipt) -> Option<Receipt> {
        let entry = Receipt {
            raw: Vec::new(),
            ..receipt.clone()
        };

        let mut items = self.items.lock();
        let evicted = if items.len() >= self.capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(entry);
        evicted
    }

    /// 最近 `limit` 条，最新的在前
    pub fn recent(&self, limit: usize) -> Vec<Receipt> {
        self.items.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// 启动时用存储中的最近记录预热，`newest_first` 为最新在前
    pub fn warm(&self, newest_first: Vec<Receipt>) {
        for receipt in newest_first.iter().take(self.capacity).rev() {
            self.push(receipt);
        }
    }

    /// 更新同步标记
    pub fn mark_synced(&self, id: &str) {
        if let Some(item) = self.items.lock().iter_mut().find(|r| r.id == id) {
            item.synced = true;
        }
    }

    /// 移除 `cutoff` (Unix millis) 之前创建的条目，返回移除数
    pub fn retain_newer_than(&self, cutoff: i64) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|r| r.created_at >= cutoff);
        before - items.len()
    }
}

impl Default for RecentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
