use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

use crate::core::{Config, Result};
use crate::delivery::{RetryPolicy, RetryQueue, RetryReceiver};
use crate::downstream::{OrderStore, SupabaseStore};
use crate::events::{AxiomSink, EventSink, NoopSink};
use crate::listener::{ConnectionPool, PoolStatus};
use crate::orders::OrderProcessor;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::storage::{RecentCache, ReceiptStore, StoreStats};

/// 流水线上下文 - 持有所有组件的共享引用
///
/// 启动时构建一次，克隆后传给监听循环、会话工作者、重试工作者和清理任务。
/// 所有字段都是 Arc 或内部 Arc，克隆成本很低。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | store | redb 小票存储 |
/// | cache | 最近小票缓存 |
/// | pool | 会话槽位池 |
/// | processor | 订单处理 |
/// | retry | 重试队列发送端 |
/// | stats | 运行统计 |
/// | events | 监控事件 |
/// | jobs | 打印任务处理和等待槽位的连接 |
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Config,
    pub store: ReceiptStore,
    pub cache: Arc<RecentCache>,
    pub pool: ConnectionPool,
    pub processor: Arc<OrderProcessor>,
    pub retry: RetryQueue,
    pub stats: Arc<PipelineStats>,
    pub events: Arc<dyn EventSink>,
    /// 会话之外的短任务，关闭时等待它们结束
    pub jobs: TaskTracker,
}

/// 服务状态快照 (供外部查询层使用)
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub stats: StatsSnapshot,
    pub pool: PoolStatus,
    pub cache_size: usize,
    pub cache_capacity: usize,
    pub retry_pending: usize,
    pub stored_total: u64,
    pub stored_unsynced: u64,
    pub downstream_configured: bool,
}

impl PipelineContext {
    /// 按配置初始化
    ///
    /// 1. 工作目录
    /// 2. redb 存储，并用最近记录预热缓存
    /// 3. 下游订单库 (Supabase，未配置时不投递)
    /// 4. 监控事件 (Axiom，未配置时为空实现)
    ///
    /// 返回的 [`RetryReceiver`] 交给重试工作者。
    pub fn initialize(config: &Config) -> Result<(Self, RetryReceiver)> {
        let store: Option<Arc<dyn OrderStore>> =
            match (&config.supabase_url, &config.supabase_key) {
                (Some(url), Some(key)) => Some(Arc::new(SupabaseStore::new(url, key)?)),
                _ => {
                    tracing::warn!("Downstream order store not configured, orders will not be delivered");
                    None
                }
            };

        let events: Arc<dyn EventSink> = match &config.axiom_token {
            Some(token) => match AxiomSink::new(token, &config.axiom_dataset) {
                Ok(sink) => Arc::new(sink),
                Err(e) => {
                    tracing::warn!(error = %e, "Monitoring client unavailable, events disabled");
                    Arc::new(NoopSink)
                }
            },
            None => Arc::new(NoopSink),
        };

        Self::build(config, store, events)
    }

    /// 使用指定的下游订单库和事件接收端构建
    pub fn build(
        config: &Config,
        order_store: Option<Arc<dyn OrderStore>>,
        events: Arc<dyn EventSink>,
    ) -> Result<(Self, RetryReceiver)> {
        std::fs::create_dir_all(&config.work_dir)?;
        if let Some(parent) = Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let store = ReceiptStore::open(&config.database_path)?;
        let cache = Arc::new(RecentCache::new(config.cache_capacity));
        cache.warm(store.recent(cache.capacity())?);
        tracing::info!(
            path = %config.database_path,
            cached = cache.len(),
            "Receipt store opened"
        );

        let policy = RetryPolicy::new(
            Duration::from_secs(config.retry_seed_secs),
            Duration::from_secs(config.retry_cap_secs),
        );
        let (retry, receiver) = RetryQueue::new(config.retry_queue_size, policy);

        let processor = Arc::new(OrderProcessor::new(
            order_store,
            events.clone(),
            config.restaurant_id.clone(),
        ));

        let ctx = Self {
            config: config.clone(),
            store,
            cache,
            pool: ConnectionPool::new(config.max_connections),
            processor,
            retry,
            stats: Arc::new(PipelineStats::new()),
            events,
            jobs: TaskTracker::new(),
        };
        Ok((ctx, receiver))
    }

    pub fn status(&self) -> ServiceStatus {
        let stored = self.store.stats().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read store stats");
            StoreStats::default()
        });

        ServiceStatus {
            stats: self.stats.snapshot(),
            pool: self.pool.status(),
            cache_size: self.cache.len(),
            cache_capacity: self.cache.capacity(),
            retry_pending: self.retry.len(),
            stored_total: stored.total,
            stored_unsynced: stored.unsynced,
            downstream_configured: self.processor.is_configured(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::Receipt;

    #[test]
    fn test_build_warms_cache_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path().join("nested").to_string_lossy());

        {
            let (ctx, _rx) = PipelineContext::build(&config, None, Arc::new(NoopSink)).unwrap();
            let receipt = Receipt::new("1".into(), "t".into(), "x".into(), vec![], "s".into());
            ctx.store.save(&receipt).unwrap();
        }

        let (ctx, _rx) = PipelineContext::initialize(&config).unwrap();
        let status = ctx.status();
        assert_eq!(status.cache_size, 1);
        assert_eq!(status.stored_total, 1);
        assert_eq!(status.pool.max, config.max_connections);
        assert!(!status.downstream_configured);
    }
}
