//! 单据分类

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

pub const PRE_CHECKOUT_MARKER: &str = "预结单";
pub const CHECKOUT_MARKER: &str = "结账单";
pub const RETURN_SLIP_MARKER: &str = "退菜单";
pub const KITCHEN_SLIP_MARKER: &str = "制作分单";
/// 任务提示里声明的制作分单类型
pub const KITCHEN_SLIP_TYPE: &str = "kitchenSlip";
pub const UNKNOWN_TABLE: &str = "未知";

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"桌号[:：]\s*([^\n]+)").expect("valid table regex"));
static STATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"档口[:：]\s*([^\n]+)").expect("valid station regex"));
static RETURN_REASON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"退菜原因[:：]\s*([^\n]+)").expect("valid return reason regex"));

/// 需要创建订单的单据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// 客单
    CustomerOrder,
    /// 制作分单
    KitchenSlip,
    /// 退菜单
    ReturnSlip,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentKind::CustomerOrder => "customer_order",
            DocumentKind::KitchenSlip => "kitchen_slip",
            DocumentKind::ReturnSlip => "return_slip",
        })
    }
}

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 空文本
    Empty,
    /// 预结单，跳过
    PreCheckout,
    /// 结账单，跳过但发送结账事件
    Checkout,
    Document(DocumentKind),
}

/// 按优先级分类: 空 > 预结单 > 结账单 > 退菜单 > 制作分单 > 客单
pub fn classify(text: &str, declared_type: Option<&str>) -> Classification {
    if text.trim().is_empty() {
        return Classification::Empty;
    }
    if text.contains(PRE_CHECKOUT_MARKER) {
        return Classification::PreCheckout;
    }
    if text.contains(CHECKOUT_MARKER) {
        return Classification::Checkout;
    }
    if text.contains(RETURN_SLIP_MARKER) {
        return Classification::Document(DocumentKind::ReturnSlip);
    }
    if declared_type == Some(KITCHEN_SLIP_TYPE) || text.contains(KITCHEN_SLIP_MARKER) {
        return Classification::Document(DocumentKind::KitchenSlip);
    }
    Classification::Document(DocumentKind::CustomerOrder)
}

/// 桌号，缺失时为 "未知"
pub fn extract_table_number(text: &str) -> String {
    capture(&TABLE_RE, text).unwrap_or_else(|| UNKNOWN_TABLE.to_string())
}

/// 档口名称
pub fn extract_station_label(text: &str) -> Option<String> {
    capture(&STATION_RE, text)
}

/// 退菜原因
pub fn extract_return_reason(text: &str) -> Option<String> {
    capture(&RETURN_REASON_RE, text)
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert_eq!(classify("  \n", None), Classification::Empty);
        assert_eq!(classify("预结单\n结账单", None), Classification::PreCheckout);
        assert_eq!(classify("结账单\n退菜单", None), Classification::Checkout);
        assert_eq!(
            classify("退菜单\n制作分单", None),
            Classification::Document(DocumentKind::ReturnSlip)
        );
        assert_eq!(
            classify("(加菜)制作分单", None),
            Classification::Document(DocumentKind::KitchenSlip)
        );
        assert_eq!(
            classify("桌号: 3", None),
            Classification::Document(DocumentKind::CustomerOrder)
        );
    }

    #[test]
    fn test_declared_kitchen_slip() {
        assert_eq!(
            classify("档口: 荤菜", Some("kitchenSlip")),
            Classification::Document(DocumentKind::KitchenSlip)
        );
        // 文本标记优先于声明类型
        assert_eq!(
            classify("预结单", Some("kitchenSlip")),
            Classification::PreCheckout
        );
    }

    #[test]
    fn test_table_number() {
        assert_eq!(extract_table_number("桌号: 8\n"), "8");
        assert_eq!(extract_table_number("桌号：A12 "), "A12");
        assert_eq!(extract_table_number("no table"), UNKNOWN_TABLE);
    }

    #[test]
    fn test_station_and_reason() {
        let text = "退菜单\n档口：凉菜\n退菜原因: 客人不要了\n";
        assert_eq!(extract_station_label(text).as_deref(), Some("凉菜"));
        assert_eq!(extract_return_reason(text).as_deref(), Some("客人不要了"));
        assert_eq!(extract_return_reason("退菜单"), None);
    }
}
