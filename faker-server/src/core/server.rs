//! Server Implementation
//!
//! 打印端口监听、会话工作者、重试工作者和清理任务的启动与关闭

use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, PipelineContext, Result};
use crate::delivery::{RetryReceiver, RetryWorker};
use crate::listener::{PrinterListener, connection_channel, session_worker};
use crate::storage::cleanup;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Virtual printer server
pub struct Server {
    config: Config,
    state: Option<(PipelineContext, RetryReceiver)>,
    shutdown: CancellationToken,
}

/// 已启动的服务
pub struct RunningServer {
    pub ctx: PipelineContext,
    pub local_addr: SocketAddr,
    tasks: BackgroundTasks,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Create server with existing state (tests inject their own downstream store)
    pub fn with_state(config: Config, ctx: PipelineContext, receiver: RetryReceiver) -> Self {
        Self {
            config,
            state: Some((ctx, receiver)),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 绑定端口并启动所有后台任务
    ///
    /// 只有绑定失败和存储初始化失败会返回错误。
    pub async fn start(self) -> Result<RunningServer> {
        let (ctx, receiver) = match self.state {
            Some(state) => state,
            None => PipelineContext::initialize(&self.config)?,
        };

        let listener = PrinterListener::bind(&self.config).await?;
        let local_addr = listener.local_addr();

        let mut tasks = BackgroundTasks::with_token(self.shutdown);
        let token = tasks.shutdown_token();
        let (conn_tx, conn_rx) = connection_channel(self.config.max_connections);

        for id in 0..self.config.max_connections.max(1) {
            tasks.spawn(
                format!("session_worker_{}", id),
                TaskKind::Worker,
                session_worker(id, ctx.clone(), conn_rx.clone(), token.clone()),
            );
        }

        tasks.spawn(
            "printer_listener",
            TaskKind::Listener,
            listener.run(ctx.clone(), conn_tx, token.clone()),
        );

        tasks.spawn(
            "retry_worker",
            TaskKind::Worker,
            RetryWorker::new(ctx.clone(), receiver, token.clone()).run(),
        );

        tasks.spawn(
            "receipt_cleanup",
            TaskKind::Periodic,
            cleanup::run(ctx.clone(), token.clone()),
        );

        tasks.log_summary();

        Ok(RunningServer {
            ctx,
            local_addr,
            tasks,
        })
    }

    /// 运行直到 Ctrl-C 或取消令牌触发
    pub async fn run(self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        let running = self.start().await?;
        tracing::info!(addr = %running.local_addr, "🖨️ Virtual printer ready");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down..."),
            _ = shutdown.cancelled() => {}
        }

        running.shutdown().await;
        Ok(())
    }
}

impl RunningServer {
    pub fn shutdown_token(&self) -> CancellationToken {
        self.tasks.shutdown_token()
    }

    pub async fn shutdown(self) {
        let status = self.ctx.status();
        tracing::info!(
            received = status.stats.received,
            processed = status.stats.processed,
            parse_errors = status.stats.parse_errors,
            retry_pending = status.retry_pending,
            "Pipeline statistics"
        );
        self.tasks.shutdown(SHUTDOWN_TIMEOUT).await;

        self.ctx.jobs.close();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.ctx.jobs.wait()).await.is_err() {
            tracing::warn!(pending = self.ctx.jobs.len(), "Print jobs still running at shutdown");
        }
    }
}
