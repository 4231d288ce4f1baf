//! 下游订单库
//!
//! 订单处理只依赖 [`OrderStore`] 的四个操作，传输方式由实现决定:
//!
//! - [`SupabaseStore`] - PostgREST over HTTP
//! - [`MemoryOrderStore`] - 进程内实现，用于测试和离线运行

pub mod memory;
pub mod supabase;

pub use memory::MemoryOrderStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PREPARING: &str = "preparing";
pub const STATUS_RETURNED: &str = "returned";

/// 退菜时可以被标记为退菜的原菜状态
pub const RETURNABLE_STATUSES: [&str; 2] = [STATUS_PENDING, STATUS_PREPARING];

pub const DEFAULT_PREP_TIME_MINUTES: u32 = 10;
pub const DEFAULT_URGENCY: &str = "normal";

#[derive(Debug, Error)]
pub enum DownstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Downstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected downstream response: {0}")]
    Response(String),

    #[error("Downstream unavailable: {0}")]
    Unavailable(String),
}

pub type DownstreamResult<T> = Result<T, DownstreamError>;

/// 新订单 (客单)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrder {
    pub restaurant_id: String,
    pub receipt_no: String,
    pub table_no: String,
    pub order_type: String,
    pub status: String,
    pub raw_data: serde_json::Value,
    pub ordered_at: String,
    pub source: String,
}

/// 待插入的菜品行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DishRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub restaurant_id: String,
    pub receipt_no: String,
    pub name: String,
    pub quantity: i32,
    pub station_id: Option<String>,
    pub table_no: String,
    pub status: String,
    pub prep_time_minutes: u32,
    pub urgency_level: String,
}

/// 下游已有的菜品记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishRecord {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    pub table_no: String,
    pub status: String,
    #[serde(default)]
    pub quantity: i32,
}

/// PostgREST 可能返回数字或 UUID 主键
pub(crate) fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// 插入订单，返回下游分配的订单 ID
    async fn insert_order(&self, order: NewOrder) -> DownstreamResult<String>;

    async fn insert_dishes(&self, dishes: Vec<DishRow>) -> DownstreamResult<()>;

    /// 同桌同名、状态在 `statuses` 中的最近一条菜品
    async fn find_recent_dish(
        &self,
        table_no: &str,
        name: &str,
        statuses: &[&str],
    ) -> DownstreamResult<Option<DishRecord>>;

    async fn update_dish_status(&self, id: &str, status: &str) -> DownstreamResult<()>;
}
