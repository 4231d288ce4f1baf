//! 小票存储
//!
//! - [`ReceiptStore`] - redb 持久化存储 (先写)
//! - [`RecentCache`] - 最近 N 条的内存缓存 (后写)
//! - [`cleanup`] - 按保留期定时清理

pub mod cache;
pub mod cleanup;
pub mod store;

pub use cache::{DEFAULT_CACHE_CAPACITY, RecentCache};
pub use store::{ReceiptStore, ReceiptStoreError, ReceiptStoreResult, StoreStats};
