//! 虚拟打印机网络层
//!
//! - [`pool`] - 会话槽位池
//! - [`session`] - 会话组装与状态应答
//! - [`server`] - 端口监听与会话工作者

pub mod pool;
pub mod server;
pub mod session;

pub use pool::{ConnectionPool, PoolSlot, PoolStatus};
pub use server::{Connection, PrinterListener, connection_channel, session_worker};
pub use session::{CloseReason, RawSession, SessionSettings, SessionState, run_session};
