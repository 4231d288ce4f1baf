//! Printer Faker - 虚拟 ESC/POS 网络打印机
//!
//! # 架构概述
//!
//! 收银系统把小票当作发往 9100 端口的打印任务，本服务假扮打印机接收，
//! 解码成纯文本并保存，再把订单和菜品投递到下游订单库供厨房显示。
//!
//! ```text
//! TCP 9100 ─▶ listener ─▶ pipeline ─▶ storage (redb + 最近缓存)
//!                            │
//!                            └─▶ orders ─▶ downstream ──(失败)──▶ delivery (重试)
//! ```
//!
//! # 模块结构
//!
//! ```text
//! faker-server/src/
//! ├── core/          # 配置、上下文、后台任务、错误
//! ├── listener/      # 监听循环、会话槽位、会话读取
//! ├── receipt/       # 小票模型与字段提取
//! ├── storage/       # redb 存储、最近缓存、过期清理
//! ├── orders/        # 单据分类、菜品解析、档口路由、订单处理
//! ├── downstream/    # 下游订单库 (Supabase)
//! ├── delivery/      # 失败重试队列
//! ├── events.rs      # 监控事件
//! ├── pipeline.rs    # 接收流水线
//! ├── stats.rs       # 运行统计
//! └── utils/         # 日志
//! ```

pub mod core;
pub mod delivery;
pub mod downstream;
pub mod events;
pub mod listener;
pub mod orders;
pub mod pipeline;
pub mod receipt;
pub mod stats;
pub mod storage;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, PipelineContext, RunningServer, Server, ServerError, ServiceStatus};
pub use downstream::{DownstreamError, OrderStore};
pub use events::EventSink;
pub use receipt::{JobHints, Receipt};

// Re-export logger functions
pub use utils::logger::init_logger_with_file;

pub fn print_banner() {
    println!(
        r#"
    ____       _       __
   / __ \_____(_)___  / /____  _____
  / /_/ / ___/ / __ \/ __/ _ \/ ___/
 / ____/ /  / / / / / /_/  __/ /
/_/   /_/  /_/_/ /_/\__/\___/_/
    ______      __
   / ____/___ _/ /_____  _____
  / /_  / __ `/ //_/ _ \/ ___/
 / __/ / /_/ / ,< /  __/ /
/_/    \__,_/_/|_|\___/_/
    "#
    );
}
