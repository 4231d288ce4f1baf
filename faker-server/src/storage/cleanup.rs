//! 过期小票清理

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::store::MILLIS_PER_DAY;
use crate::core::PipelineContext;

/// 删除保留期之前的记录，返回持久化存储中删除的条数
pub fn sweep(ctx: &PipelineContext) -> usize {
    let days = ctx.config.retention_days;
    let cutoff = chrono::Utc::now().timestamp_millis() - days * MILLIS_PER_DAY;

    let evicted = ctx.cache.retain_newer_than(cutoff);
    match ctx.store.cleanup_before(cutoff) {
        Ok(removed) => {
            if removed > 0 || evicted > 0 {
                info!(removed, evicted, retention_days = days, "Expired receipts cleaned up");
            }
            removed
        }
        Err(e) => {
            error!(error = %e, "Receipt cleanup failed");
            0
        }
    }
}

/// 定时清理，启动时先执行一次
pub async fn run(ctx: PipelineContext, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(ctx.config.cleanup_interval());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                sweep(&ctx);
            }
        }
    }
}
