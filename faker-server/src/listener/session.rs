//! 会话组装
//!
//! 一个连接 = 一个会话。每次读取到的数据块先追加到缓冲区，再交给
//! [`faker_printer::respond`] 生成模拟的状态应答，应答写回后才继续读取。
//!
//! 状态: `AwaitingData → Active → Closed`
//! - 读到 0 字节: 对端关闭
//! - 单次读取超时: 空闲超过阈值则关闭，否则继续等待
//! - 关闭信号: 立即结束，已收到的数据照常处理

use faker_printer::{opcode, respond};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

const READ_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingData,
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    Idle,
    Shutdown,
    /// 读写出错 (连接重置等)，视为正常结束
    Transport,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// 单次读取超时，决定关闭信号的响应延迟
    pub read_timeout: Duration,
    /// 无数据超过该时长则结束会话
    pub idle_timeout: Duration,
}

/// 一个连接期间收到的全部数据
#[derive(Debug)]
pub struct RawSession {
    pub addr: SocketAddr,
    chunks: Vec<Vec<u8>>,
    len: usize,
    pub started_at: Instant,
    pub last_activity: Instant,
    state: SessionState,
    close_reason: Option<CloseReason>,
}

impl RawSession {
    pub fn new(addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            addr,
            chunks: Vec::new(),
            len: 0,
            started_at: now,
            last_activity: now,
            state: SessionState::AwaitingData,
            close_reason: None,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.chunks.push(chunk.to_vec());
        self.len += chunk.len();
        self.last_activity = Instant::now();
        self.state = SessionState::Active;
    }

    pub fn close(&mut self, reason: CloseReason) {
        self.state = SessionState::Closed;
        self.close_reason = Some(reason);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// 按到达顺序拼接的全部数据
    pub fn bytes(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.chunks.concat()
    }

    /// 是否为真实打印任务
    ///
    /// 超过最小字节数，或包含初始化/切纸指令；否则只是状态探测。
    pub fn is_job(&self, min_bytes: usize) -> bool {
        if self.len > min_bytes {
            return true;
        }
        let data = self.bytes();
        opcode::contains(&data, &opcode::INIT) || opcode::contains(&data, &opcode::CUT)
    }
}

/// 读取一个连接直到关闭，返回组装好的会话
#[instrument(skip_all, fields(addr = %addr))]
pub async fn run_session<S>(
    stream: &mut S,
    addr: SocketAddr,
    settings: SessionSettings,
    shutdown: &CancellationToken,
) -> RawSession
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = RawSession::new(addr);
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            _ = shutdown.cancelled() => {
                session.close(CloseReason::Shutdown);
                break;
            }
            read = tokio::time::timeout(settings.read_timeout, stream.read(&mut buf)) => read,
        };

        match read {
            Err(_elapsed) => {
                if session.idle_for() >= settings.idle_timeout {
                    session.close(CloseReason::Idle);
                    break;
                }
            }
            Ok(Ok(0)) => {
                session.close(CloseReason::PeerClosed);
                break;
            }
            Ok(Ok(n)) => {
                let chunk = &buf[..n];
                trace!(bytes = n, "Chunk received");
                session.push(chunk);

                if let Some(response) = respond(chunk) {
                    let written = async {
                        stream.write_all(&response).await?;
                        stream.flush().await
                    }
                    .await;
                    if let Err(e) = written {
                        debug!(error = %e, "Failed to write status response");
                        session.close(CloseReason::Transport);
                        break;
                    }
                }
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Session read failed");
                session.close(CloseReason::Transport);
                break;
            }
        }
    }

    debug!(
        bytes = session.len(),
        chunks = session.chunk_count(),
        reason = ?session.close_reason(),
        "Session closed"
    );
    session
}
