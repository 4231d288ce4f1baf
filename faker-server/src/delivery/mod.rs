//! 投递重试
//!
//! - [`retry`] - 退避策略与有界重试队列
//! - [`worker`] - 单个重试工作者

pub mod retry;
pub mod worker;

pub use retry::{EnqueueError, RetryDecision, RetryItem, RetryPolicy, RetryQueue, RetryReceiver};
pub use worker::RetryWorker;
