//! 核心模块 - 配置、上下文、后台任务和错误定义
//!
//! # 模块结构
//!
//! - [`Config`] - 服务配置
//! - [`PipelineContext`] - 流水线上下文
//! - [`Server`] - 服务启动与关闭
//! - [`BackgroundTasks`] - 后台任务管理
//! - [`ServerError`] - 启动错误

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use error::{Result, ServerError};
pub use server::{RunningServer, Server};
pub use state::{PipelineContext, ServiceStatus};
pub use tasks::{BackgroundTasks, TaskKind};
