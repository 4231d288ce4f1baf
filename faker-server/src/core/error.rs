use thiserror::Error;

use crate::downstream::DownstreamError;
use crate::storage::ReceiptStoreError;

/// 启动阶段错误
///
/// 运行期的错误都在各自子系统内消化，只有启动失败会终止进程。
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("无法监听 {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("存储初始化失败: {0}")]
    Storage(#[from] ReceiptStoreError),

    #[error("下游客户端初始化失败: {0}")]
    Downstream(#[from] DownstreamError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 启动流程的 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
