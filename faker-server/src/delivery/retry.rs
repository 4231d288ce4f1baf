//! 重试队列与退避策略
//!
//! 下游失败的小票进入有界队列，由单个重试工作者按各自的退避时间重新处理。
//! 退避从 seed 开始每次失败翻倍，封顶 cap；在封顶延迟下再次失败则丢弃。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::orders::DeliveryProgress;
use crate::receipt::Receipt;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("retry queue is full ({0} items)")]
    Full(usize),

    #[error("retry queue is closed")]
    Closed,
}

/// 指数退避: `min(seed * 2^attempt, cap)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub seed: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn new(seed: Duration, cap: Duration) -> Self {
        Self {
            seed,
            cap: cap.max(seed),
        }
    }

    /// 第 `attempt` 次重试前的等待时间 (从 0 开始)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.seed.saturating_mul(factor).min(self.cap)
    }

    /// 新的重试项，等待 seed 之后可以处理
    pub fn first_item(&self, receipt: Receipt, progress: DeliveryProgress) -> RetryItem {
        RetryItem {
            receipt,
            progress,
            attempts: 0,
            delay: self.seed,
            next_eligible: Instant::now() + self.seed,
        }
    }

    /// 记录一次失败的重试
    ///
    /// 等待时间已经达到 cap 的重试再次失败时丢弃。
    pub fn record_failure(&self, item: &mut RetryItem) -> RetryDecision {
        if item.delay >= self.cap {
            return RetryDecision::Drop;
        }
        item.attempts += 1;
        item.delay = self.delay_for(item.attempts);
        // 下次可处理时间只增不减
        item.next_eligible = item.next_eligible.max(Instant::now() + item.delay);
        RetryDecision::Requeue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Requeue,
    Drop,
}

#[derive(Debug, Clone)]
pub struct RetryItem {
    pub receipt: Receipt,
    /// 已成功的下游写入，重试时跳过
    pub progress: DeliveryProgress,
    /// 已失败的重试次数
    pub attempts: u32,
    /// 本轮等待时间
    pub delay: Duration,
    pub next_eligible: Instant,
}

/// 重试队列的发送端
///
/// 容量按未完成的条目计算: 包括通道里和工作者手上等待的条目。
#[derive(Debug, Clone)]
pub struct RetryQueue {
    tx: mpsc::Sender<RetryItem>,
    policy: RetryPolicy,
    capacity: usize,
    outstanding: Arc<AtomicUsize>,
}

/// 重试队列的接收端，由重试工作者持有
#[derive(Debug)]
pub struct RetryReceiver {
    rx: mpsc::Receiver<RetryItem>,
    policy: RetryPolicy,
    outstanding: Arc<AtomicUsize>,
}

impl RetryQueue {
    pub fn new(capacity: usize, policy: RetryPolicy) -> (Self, RetryReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let outstanding = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                policy,
                capacity,
                outstanding: outstanding.clone(),
            },
            RetryReceiver {
                rx,
                policy,
                outstanding,
            },
        )
    }

    /// 放入重试队列，队列满时立即拒绝
    pub fn try_enqueue(
        &self,
        receipt: Receipt,
        progress: DeliveryProgress,
    ) -> Result<(), EnqueueError> {
        let reserved = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .is_ok();
        if !reserved {
            return Err(EnqueueError::Full(self.capacity));
        }

        self.tx
            .try_send(self.policy.first_item(receipt, progress))
            .map_err(|e| {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                match e {
                    mpsc::error::TrySendError::Full(_) => EnqueueError::Full(self.capacity),
                    mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
                }
            })
    }

    /// 未完成的条目数
    pub fn len(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl RetryReceiver {
    pub async fn recv(&mut self) -> Option<RetryItem> {
        self.rx.recv().await
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 条目处理完毕 (成功或丢弃)，释放容量
    pub fn finish(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(5), Duration::from_secs(300))
    }

    fn receipt() -> Receipt {
        Receipt::new("1".into(), "t".into(), "x".into(), vec![], "s".into())
    }

    fn enqueue(queue: &RetryQueue) -> Result<(), EnqueueError> {
        queue.try_enqueue(receipt(), DeliveryProgress::default())
    }

    #[test]
    fn test_delay_sequence_is_capped() {
        let delays: Vec<u64> = (0..9).map(|k| policy().delay_for(k).as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 300, 300, 300]);
        assert_eq!(policy().delay_for(64), Duration::from_secs(300));
    }

    #[test]
    fn test_dropped_after_failing_at_cap() {
        let policy = policy();
        let mut item = policy.first_item(receipt(), DeliveryProgress::default());
        let mut waits = vec![item.delay.as_secs()];
        let mut last_eligible = item.next_eligible;

        while policy.record_failure(&mut item) == RetryDecision::Requeue {
            assert!(item.next_eligible >= last_eligible);
            last_eligible = item.next_eligible;
            waits.push(item.delay.as_secs());
        }
        assert_eq!(waits, vec![5, 10, 20, 40, 80, 160, 300]);
        assert_eq!(item.attempts, 6);
    }

    #[tokio::test]
    async fn test_queue_full_is_rejected() {
        let (queue, mut receiver) = RetryQueue::new(2, policy());
        enqueue(&queue).unwrap();
        enqueue(&queue).unwrap();
        assert_eq!(enqueue(&queue), Err(EnqueueError::Full(2)));

        // 取出后仍未完成，容量不释放
        let item = receiver.recv().await.unwrap();
        assert_eq!(item.attempts, 0);
        assert_eq!(enqueue(&queue), Err(EnqueueError::Full(2)));

        receiver.finish();
        assert!(enqueue(&queue).is_ok());
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, receiver) = RetryQueue::new(2, policy());
        drop(receiver);
        assert_eq!(enqueue(&queue), Err(EnqueueError::Closed));
        assert!(queue.is_empty());
    }
}
