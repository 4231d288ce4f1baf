//! 订单识别与菜品解析
//!
//! 小票文本 → 单据类型 → 菜品列表 → 档口 → 下游订单库
//!
//! - [`classifier`] - 单据分类、桌号/档口/退菜原因提取
//! - [`customer`] - 客单菜品解析
//! - [`kitchen`] - 制作分单/退菜单菜品解析
//! - [`station`] - 档口路由
//! - [`processor`] - 单据处理流程

pub mod classifier;
pub mod customer;
pub mod kitchen;
pub mod processor;
pub mod station;

pub use classifier::{Classification, DocumentKind, classify};
pub use processor::{DeliveryProgress, OrderProcessor, ProcessOutcome, ProcessReport};
pub use station::{Station, StationRouter};

use serde::{Deserialize, Serialize};

/// 计量单位
pub const UNIT_TOKENS: &str = "份瓶听盒位杯碗个张";

/// 解析出的菜品
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub name: String,
    /// 一般为正数；找不到原菜的退菜记录为负数
    pub quantity: i32,
    pub station_id: Option<String>,
    /// 退菜
    pub returned: bool,
    /// 套餐头本身不会作为菜品输出，因此解析结果中恒为 false
    pub combo_parent: bool,
    /// 所属套餐名 (套餐子项)
    pub combo: Option<String>,
}

impl Dish {
    pub fn new(name: impl Into<String>, quantity: i32) -> Self {
        Self {
            name: name.into(),
            quantity,
            station_id: None,
            returned: false,
            combo_parent: false,
            combo: None,
        }
    }
}
