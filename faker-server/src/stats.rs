//! 运行统计

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    status_queries: AtomicU64,
    parse_errors: AtomicU64,
    processed: AtomicU64,
    downstream_errors: AtomicU64,
    retries_dropped: AtomicU64,
    last_receipt_at: Mutex<Option<String>>,
}

/// 某一时刻的统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub status_queries: u64,
    pub parse_errors: u64,
    pub processed: u64,
    pub downstream_errors: u64,
    pub retries_dropped: u64,
    pub last_receipt_at: Option<String>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
        *self.last_receipt_at.lock() = Some(chrono::Local::now().to_rfc3339());
    }

    pub fn record_status_query(&self) {
        self.status_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_downstream_error(&self) {
        self.downstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_dropped(&self) {
        self.retries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            status_queries: self.status_queries.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            downstream_errors: self.downstream_errors.load(Ordering::Relaxed),
            retries_dropped: self.retries_dropped.load(Ordering::Relaxed),
            last_receipt_at: self.last_receipt_at.lock().clone(),
        }
    }
}
