//! 档口路由
//!
//! 档口名称 → 档口 ID 是固定映射；另有一组凉菜菜名，无论分单上写的是哪个档口，
//! 都强制路由到凉菜档口。

use std::collections::HashSet;
use std::fmt;
use tracing::info;

/// 强制路由到凉菜档口的菜名 (精确匹配)
pub const COLD_DISH_OVERRIDES: [&str; 8] = [
    "拍黄瓜",
    "凉拌黄瓜",
    "凉拌木耳",
    "口水鸡",
    "夫妻肺片",
    "皮蛋豆腐",
    "凉拌三丝",
    "酸辣蕨根粉",
];

/// 厨房档口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Station {
    Meat,
    Vegetable,
    Drinks,
    Staple,
    Soup,
    Snack,
    Cold,
    Other,
}

impl Station {
    pub const ALL: [Station; 8] = [
        Station::Meat,
        Station::Vegetable,
        Station::Drinks,
        Station::Staple,
        Station::Soup,
        Station::Snack,
        Station::Cold,
        Station::Other,
    ];

    /// 分单上打印的档口名称
    pub fn label(self) -> &'static str {
        match self {
            Station::Meat => "荤菜",
            Station::Vegetable => "素菜",
            Station::Drinks => "酒水",
            Station::Staple => "主食",
            Station::Soup => "汤品",
            Station::Snack => "小吃",
            Station::Cold => "凉菜",
            Station::Other => "其他",
        }
    }

    /// 下游订单库中的档口 ID
    ///
    /// 小吃、凉菜、其他共用一个档口。
    pub fn id(self) -> &'static str {
        match self {
            Station::Meat => "b2c3d4e5-f6a7-8901-bcde-f23456789012",
            Station::Vegetable => "c3d4e5f6-a7b8-9012-cdef-345678901234",
            Station::Drinks => "d4e5f6a7-b8c9-0123-defa-456789012345",
            Station::Staple => "e5f6a7b8-c9d0-1234-efab-567890123456",
            Station::Soup => "f6a7b8c9-d0e1-2345-fabc-678901234567",
            Station::Snack | Station::Cold | Station::Other => {
                "a7b8c9d0-e1f2-3456-abcd-789012345678"
            }
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 档口路由器，启动时构建一次
#[derive(Debug, Clone)]
pub struct StationRouter {
    cold_overrides: HashSet<&'static str>,
}

impl StationRouter {
    pub fn new() -> Self {
        Self {
            cold_overrides: COLD_DISH_OVERRIDES.into_iter().collect(),
        }
    }

    /// 档口名称 → 档口，未知名称返回 None
    pub fn resolve(&self, label: &str) -> Option<Station> {
        Station::from_label(label)
    }

    pub fn is_cold_override(&self, dish_name: &str) -> bool {
        self.cold_overrides.contains(dish_name.trim())
    }

    /// 单个菜品的实际档口
    pub fn station_for_dish(&self, slip_station: Station, dish_name: &str) -> Station {
        if slip_station != Station::Cold && self.is_cold_override(dish_name) {
            info!(
                dish = %dish_name,
                from = %slip_station,
                "Cold dish override, routing to 凉菜"
            );
            return Station::Cold;
        }
        slip_station
    }
}

impl Default for StationRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_labels() {
        let router = StationRouter::new();
        assert_eq!(router.resolve("荤菜"), Some(Station::Meat));
        assert_eq!(router.resolve(" 酒水 "), Some(Station::Drinks));
        assert_eq!(router.resolve("烧烤"), None);
        assert_eq!(
            router.resolve("荤菜").map(Station::id),
            Some("b2c3d4e5-f6a7-8901-bcde-f23456789012")
        );
    }

    #[test]
    fn test_shared_station_ids() {
        assert_eq!(Station::Snack.id(), Station::Cold.id());
        assert_eq!(Station::Other.id(), Station::Cold.id());
        assert_ne!(Station::Meat.id(), Station::Cold.id());
    }

    #[test]
    fn test_cold_dish_override() {
        let router = StationRouter::new();
        assert_eq!(router.station_for_dish(Station::Meat, "口水鸡"), Station::Cold);
        assert_eq!(router.station_for_dish(Station::Meat, "红烧肉"), Station::Meat);
        // 精确匹配，不做子串匹配
        assert_eq!(
            router.station_for_dish(Station::Vegetable, "大份拍黄瓜"),
            Station::Vegetable
        );
    }
}
