//! 会话槽位池
//!
//! 固定数量的槽位限制并发会话。获取槽位有超时，超时的连接直接关闭。
//! 槽位随 [`PoolSlot`] 释放，无论会话如何结束。

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub active: usize,
    pub max: usize,
    pub available: usize,
}

#[derive(Debug, Clone)]
pub struct ConnectionPool {
    semaphore: Arc<Semaphore>,
    max: usize,
}

/// 持有期间占用一个槽位
#[derive(Debug)]
pub struct PoolSlot {
    _permit: OwnedSemaphorePermit,
}

impl ConnectionPool {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// 立即获取槽位，没有空闲时返回 None
    pub fn try_acquire(&self) -> Option<PoolSlot> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| PoolSlot { _permit: permit })
    }

    /// 在 `timeout` 内获取槽位
    pub async fn acquire(&self, timeout: Duration) -> Option<PoolSlot> {
        match tokio::time::timeout(timeout, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Some(PoolSlot { _permit: permit }),
            _ => None,
        }
    }

    pub fn status(&self) -> PoolStatus {
        let available = self.semaphore.available_permits();
        PoolStatus {
            active: self.max - available.min(self.max),
            max: self.max,
            available,
        }
    }
}
