//! 打印端口监听
//!
//! 监听循环只负责接受连接和获取槽位，拿到槽位的连接放入有界通道，
//! 由固定数量的会话工作者读取和组装。会话结束后的解码与投递在
//! [`PipelineContext::jobs`] 中的独立任务里执行。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use super::pool::PoolSlot;
use super::session::{SessionSettings, run_session};
use crate::core::{Config, PipelineContext, Result, ServerError};
use crate::pipeline;
use crate::receipt::JobHints;

/// 已获得槽位、等待会话工作者处理的连接
pub struct Connection {
    pub stream: TcpStream,
    pub addr: SocketAddr,
    pub slot: PoolSlot,
}

pub type ConnectionSender = mpsc::Sender<Connection>;
pub type ConnectionReceiver = Arc<Mutex<mpsc::Receiver<Connection>>>;

/// 连接通道，容量与会话池大小一致
pub fn connection_channel(capacity: usize) -> (ConnectionSender, ConnectionReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, Arc::new(Mutex::new(rx)))
}

pub struct PrinterListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl PrinterListener {
    /// 绑定打印端口，失败是唯一的致命错误
    pub async fn bind(config: &Config) -> Result<Self> {
        let addr_str = config.listen_addr();
        let bind_err = |source: std::io::Error| ServerError::Bind {
            addr: addr_str.clone(),
            source,
        };

        let addr: SocketAddr = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(bind_err)?
            .next()
            .ok_or_else(|| {
                bind_err(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "address did not resolve",
                ))
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket.listen(config.listen_backlog).map_err(bind_err)?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, backlog = config.listen_backlog, "Virtual printer listening");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 接受连接直到关闭信号
    pub async fn run(
        self,
        ctx: PipelineContext,
        connections: ConnectionSender,
        shutdown: CancellationToken,
    ) {
        let acquire_timeout = ctx.config.pool_acquire_timeout();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Printer listener shutting down");
                    break;
                }

                result = self.listener.accept() => {
                    let (stream, addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    match ctx.pool.try_acquire() {
                        Some(slot) => {
                            debug!(addr = %addr, "Connection accepted");
                            if connections.send(Connection { stream, addr, slot }).await.is_err() {
                                warn!("Session workers stopped, listener exiting");
                                break;
                            }
                        }
                        // 池满时在独立任务里等待槽位，监听循环继续接受连接
                        None => {
                            ctx.jobs.spawn(wait_for_slot(
                                ctx.clone(),
                                stream,
                                addr,
                                connections.clone(),
                                acquire_timeout,
                                shutdown.clone(),
                            ));
                        }
                    }
                }
            }
        }
    }
}

/// 池满时的连接: 在超时内等到槽位就交给会话工作者，否则关闭
async fn wait_for_slot(
    ctx: PipelineContext,
    stream: TcpStream,
    addr: SocketAddr,
    connections: ConnectionSender,
    timeout: Duration,
    shutdown: CancellationToken,
) {
    let slot = tokio::select! {
        _ = shutdown.cancelled() => None,
        slot = ctx.pool.acquire(timeout) => slot,
    };

    let Some(slot) = slot else {
        let status = ctx.pool.status();
        warn!(addr = %addr, active = status.active, max = status.max, "Session pool full, closing connection");
        drop(stream);
        return;
    };

    debug!(addr = %addr, "Connection accepted after waiting for a slot");
    if connections.send(Connection { stream, addr, slot }).await.is_err() {
        debug!(addr = %addr, "Session workers stopped, dropping connection");
    }
}

/// 会话工作者: 取连接 → 组装会话 → 释放槽位 → 处理打印任务
pub async fn session_worker(
    id: usize,
    ctx: PipelineContext,
    connections: ConnectionReceiver,
    shutdown: CancellationToken,
) {
    let settings = SessionSettings {
        read_timeout: ctx.config.read_timeout(),
        idle_timeout: ctx.config.idle_timeout(),
    };

    loop {
        let connection = tokio::select! {
            _ = shutdown.cancelled() => break,
            connection = async { connections.lock().await.recv().await } => connection,
        };
        let Some(connection) = connection else {
            break;
        };

        handle_connection(&ctx, connection, settings, &shutdown).await;
    }

    debug!(worker = id, "Session worker stopped");
}

#[instrument(skip_all, fields(addr = %connection.addr))]
async fn handle_connection(
    ctx: &PipelineContext,
    connection: Connection,
    settings: SessionSettings,
    shutdown: &CancellationToken,
) {
    let Connection {
        mut stream,
        addr,
        slot,
    } = connection;

    let session = run_session(&mut stream, addr, settings, shutdown).await;
    drop(stream);
    drop(slot);

    if !session.is_job(ctx.config.min_job_bytes) {
        ctx.stats.record_status_query();
        debug!(bytes = session.len(), "Status query discarded");
        return;
    }

    // 解码和投递不占用会话工作者，工作者只做套接字读写
    let job_ctx = ctx.clone();
    let raw = session.into_bytes();
    ctx.jobs.spawn(
        async move {
            pipeline::ingest(&job_ctx, raw, &addr.to_string(), JobHints::default()).await;
        }
        .in_current_span(),
    );
}
