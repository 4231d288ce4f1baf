//! 后台任务管理
//!
//! 监听循环、会话工作者、重试工作者和清理任务都在这里注册，
//! 共享一个取消令牌，关闭时统一等待退出。
//!
//! # 任务类型
//!
//! - [`TaskKind::Listener`] - 连接监听循环
//! - [`TaskKind::Worker`] - 长期运行的工作者 (会话、重试)
//! - [`TaskKind::Periodic`] - 定时任务 (过期清理)

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Listener,
    Worker,
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Listener => "Listener",
            TaskKind::Worker => "Worker",
            TaskKind::Periodic => "Periodic",
        };
        f.write_str(name)
    }
}

struct RegisteredTask {
    name: String,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// 后台任务管理器
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// let token = tasks.shutdown_token();
/// tasks.spawn("retry_worker", TaskKind::Worker, async move {
///     worker.run(token).await;
/// });
///
/// tasks.shutdown(Duration::from_secs(5)).await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// 使用外部取消令牌 (例如由 main 的 Ctrl-C 处理持有)
    pub fn with_token(shutdown: CancellationToken) -> Self {
        Self {
            tasks: Vec::new(),
            shutdown,
        }
    }

    /// 获取取消令牌（用于任务内部监听 shutdown 信号）
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 注册并启动一个后台任务
    ///
    /// panic 会被捕获并记录，不会拖垮其他任务。
    /// 在取消之前退出的任务会被记录为异常退出。
    pub fn spawn<F>(&mut self, name: impl Into<String>, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();
        let token = self.shutdown.clone();

        let wrapped = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if token.is_cancelled() => {
                    tracing::debug!(task = %task_name, kind = %kind, "Background task stopped");
                }
                Ok(()) => {
                    tracing::warn!(task = %task_name, kind = %kind, "Background task exited before shutdown");
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(task = %task_name, kind = %kind, panic = %panic_msg, "Background task panicked");
                }
            }
        };

        let handle = tokio::spawn(wrapped);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 指定类型的任务数量
    pub fn count(&self, kind: TaskKind) -> usize {
        self.tasks.iter().filter(|t| t.kind == kind).count()
    }

    /// 打印任务摘要
    pub fn log_summary(&self) {
        tracing::info!(
            total = self.tasks.len(),
            listeners = self.count(TaskKind::Listener),
            workers = self.count(TaskKind::Worker),
            periodic = self.count(TaskKind::Periodic),
            "Background tasks registered"
        );
    }

    /// 已经结束的任务数量 (运行期间应为 0)
    pub fn finished_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.handle.is_finished()).count()
    }

    /// Graceful shutdown - 发送取消信号并等待所有任务退出
    ///
    /// 超过 `timeout` 仍未退出的任务会被强制中止。
    pub async fn shutdown(self, timeout: Duration) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());
        self.shutdown.cancel();

        for task in self.tasks {
            let abort = task.handle.abort_handle();
            match tokio::time::timeout(timeout, task.handle).await {
                Ok(Ok(())) => tracing::debug!(task = %task.name, "Task completed"),
                Ok(Err(e)) if e.is_cancelled() => {
                    tracing::debug!(task = %task.name, "Task cancelled")
                }
                Ok(Err(e)) => tracing::error!(task = %task.name, error = ?e, "Task failed"),
                Err(_) => {
                    tracing::warn!(task = %task.name, "Task did not stop in time, aborting");
                    abort.abort();
                }
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_shutdown_cancels_workers() {
        let mut tasks = BackgroundTasks::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let token = tasks.shutdown_token();
        let flag = stopped.clone();
        tasks.spawn("waiter", TaskKind::Worker, async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        assert_eq!(tasks.count(TaskKind::Worker), 1);
        tasks.shutdown(Duration::from_secs(1)).await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("boom", TaskKind::Periodic, async {
            panic!("boom");
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(tasks.finished_count(), 1);
        tasks.shutdown(Duration::from_secs(1)).await;
    }
}
