//! 客单菜品解析
//!
//! 菜品区位于 `菜品单价数量小计` 表头和 `菜品价格合计` 之间，每行形如
//! `野菜卷181份18`: 菜名 + 单价 + 数量 + 单位 + 小计，数字之间没有分隔。

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::Dish;

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"菜品[单价]*数量[小计]*\n([\s\S]*?)(?:菜品价格合计|\n\n|$)")
        .expect("valid customer section regex")
});

/// 菜名 + 单价 + 数量(1位) + 单位 + 小计
static STRICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)(\d+)(\d)([份瓶听盒位杯碗个张])(\d+)$").expect("valid strict dish regex")
});

/// 菜名以数字结尾时，单价限定为 1-3 位重新匹配
static BOUNDED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)(\d{1,3})(\d)([份瓶听盒位杯碗个张])(\d+)$")
        .expect("valid bounded dish regex")
});

/// 宽松格式: 菜名后跟数字，数量记为 1
static LOOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)(?:\d+[份瓶听盒位杯碗个张]\d+|\d+)$").expect("valid loose dish regex")
});

/// 解析客单菜品
pub fn parse_customer_dishes(text: &str) -> Vec<Dish> {
    let Some(section) = SECTION_RE.captures(text).and_then(|c| c.get(1)) else {
        return Vec::new();
    };

    let dishes: Vec<Dish> = section
        .as_str()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('-'))
        .filter_map(parse_line)
        .collect();

    debug!(count = dishes.len(), "Parsed customer order dishes");
    dishes
}

fn parse_line(line: &str) -> Option<Dish> {
    if let Some(caps) = STRICT_RE.captures(line) {
        let mut name = caps[1].trim().to_string();
        let mut quantity: i32 = caps[3].parse().ok()?;

        if name.ends_with(|c: char| c.is_ascii_digit())
            && let Some(better) = BOUNDED_RE.captures(line)
        {
            name = better[1].trim().to_string();
            quantity = better[3].parse().ok()?;
        }

        if name.is_empty() || quantity <= 0 {
            return None;
        }
        return Some(Dish::new(name, quantity));
    }

    let caps = LOOSE_RE.captures(line)?;
    let name = caps[1].trim();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(Dish::new(name, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_dish() {
        let text = "桌号: 8\n菜品单价数量小计\n野菜卷181份18\n菜品价格合计: 70";
        let dishes = parse_customer_dishes(text);
        assert_eq!(dishes, vec![Dish::new("野菜卷", 1)]);
    }

    #[test]
    fn test_brackets_and_modifiers() {
        let text = "菜品单价数量小计\n紫苏半边云（鲜牛胸口）381份38\n-微辣\n可乐52瓶10\n菜品价格合计: 48";
        let dishes = parse_customer_dishes(text);
        assert_eq!(
            dishes,
            vec![Dish::new("紫苏半边云（鲜牛胸口）", 1), Dish::new("可乐", 2)]
        );
    }

    #[test]
    fn test_section_ends_at_blank_line() {
        let text = "菜品数量\n米饭21碗4\n\n备注123\n";
        assert_eq!(parse_customer_dishes(text), vec![Dish::new("米饭", 1)]);
    }

    #[test]
    fn test_loose_fallback() {
        let text = "菜品单价数量小计\n茶位费6\n88\n";
        // "88" 以数字开头，被丢弃
        assert_eq!(parse_customer_dishes(text), vec![Dish::new("茶位费", 1)]);
    }

    #[test]
    fn test_name_ending_in_digit_is_rematched() {
        // 去掉空格后的菜名以数字结尾，使用限定宽度的单价重新匹配
        let text = "菜品单价数量小计\n雪碧2 52瓶10\n";
        let dishes = parse_customer_dishes(text);
        assert_eq!(dishes.len(), 1);
        assert_eq!(dishes[0].quantity, 2);
    }

    #[test]
    fn test_no_section() {
        assert!(parse_customer_dishes("桌号: 8\n野菜卷181份18").is_empty());
    }
}
