//! 制作分单 / 退菜单菜品解析
//!
//! 菜品区位于 `菜品数量` 表头之后、`单号:` 之前。逐行处理，最多向前看一行:
//!
//! - `木姜子鲜黄牛肉1/份` 是菜品行，数量在 `/单位` 之前
//! - `(退)` 前缀标记退菜
//! - 菜名括号未闭合时，下一行含闭合括号且不是菜品行，则合并为一个菜名
//! - 含套餐关键字的菜品行是套餐头，本身不输出；其后的 `-` 子项作为套餐菜品输出
//! - 普通菜品行结束套餐；不在套餐内的 `-` 行是做法备注，忽略

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::Dish;

pub const COMBO_KEYWORDS: [&str; 3] = ["套餐", "套票", "组合餐"];

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"菜品数量\n([\s\S]*?)(?:\n单号[:：]|$)").expect("valid kitchen section regex")
});

/// 数量/单位，例如 `1/份`
static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)/[份瓶听盒位杯碗个张]").expect("valid kitchen quantity regex")
});

static RETURN_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\(退\)|（退）)\s*").expect("valid return prefix regex"));

/// 菜名最少字符数，更短的视为噪声
const MIN_NAME_CHARS: usize = 2;

/// 一行菜品: 去掉退菜前缀后的菜名、数量、是否退菜
struct DishLine {
    name: String,
    quantity: i32,
    returned: bool,
}

fn parse_dish_line(line: &str) -> Option<DishLine> {
    let (line, returned) = match RETURN_PREFIX_RE.find(line) {
        Some(m) => (&line[m.end()..], true),
        None => (line, false),
    };

    let caps = QUANTITY_RE.captures(line)?;
    let start = caps.get(0)?.start();
    Some(DishLine {
        name: line[..start].trim().to_string(),
        quantity: caps[1].parse().unwrap_or(1),
        returned,
    })
}

fn is_dish_line(line: &str) -> bool {
    QUANTITY_RE.is_match(line)
}

/// 菜名中是否有未闭合的括号，返回对应的闭合括号
fn unclosed_bracket(name: &str) -> Option<char> {
    [('（', '）'), ('(', ')')]
        .into_iter()
        .find(|(open, close)| name.contains(*open) && !name.contains(*close))
        .map(|(_, close)| close)
}

fn is_combo(name: &str) -> bool {
    COMBO_KEYWORDS.iter().any(|k| name.contains(k))
}

fn long_enough(name: &str) -> bool {
    name.chars().count() >= MIN_NAME_CHARS
}

/// 解析制作分单菜品
pub fn parse_kitchen_dishes(text: &str) -> Vec<Dish> {
    let Some(section) = SECTION_RE.captures(text).and_then(|c| c.get(1)) else {
        return Vec::new();
    };

    let lines: Vec<&str> = section.as_str().lines().map(str::trim).collect();
    let mut dishes = Vec::new();
    // 当前套餐头 (菜名, 是否退菜)
    let mut combo: Option<(String, bool)> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        i += 1;

        if line.is_empty() {
            continue;
        }

        if let Some(sub) = line.strip_prefix('-') {
            let Some((combo_name, combo_returned)) = &combo else {
                continue;
            };
            if let Some(item) = parse_dish_line(sub.trim())
                && long_enough(&item.name)
            {
                dishes.push(Dish {
                    returned: item.returned || *combo_returned,
                    combo: Some(combo_name.clone()),
                    ..Dish::new(item.name, item.quantity)
                });
            }
            continue;
        }

        let Some(mut item) = parse_dish_line(line) else {
            continue;
        };

        // 跨行菜名: 只消费下一行一次
        if let Some(close) = unclosed_bracket(&item.name)
            && let Some(next) = lines.get(i)
            && next.contains(close)
            && !is_dish_line(next)
        {
            item.name.push_str(next);
            i += 1;
        }

        if is_combo(&item.name) {
            debug!(combo = %item.name, "Combo header");
            combo = Some((item.name, item.returned));
            continue;
        }

        combo = None;
        if long_enough(&item.name) {
            dishes.push(Dish {
                returned: item.returned,
                ..Dish::new(item.name, item.quantity)
            });
        }
    }

    debug!(count = dishes.len(), "Parsed kitchen slip dishes");
    dishes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slip(body: &str) -> String {
        format!("制作分单\n档口: 荤菜\n桌号: 8\n菜品数量\n{}\n单号: X", body)
    }

    #[test]
    fn test_single_dish() {
        let dishes = parse_kitchen_dishes(&slip("木姜子鲜黄牛肉1/份"));
        assert_eq!(dishes, vec![Dish::new("木姜子鲜黄牛肉", 1)]);
    }

    #[test]
    fn test_quantities_and_modifiers() {
        let dishes = parse_kitchen_dishes(&slip("酸汤鱼2/份\n-少辣\n啤酒 6/瓶"));
        assert_eq!(dishes, vec![Dish::new("酸汤鱼", 2), Dish::new("啤酒", 6)]);
    }

    #[test]
    fn test_return_prefix() {
        let dishes = parse_kitchen_dishes(&slip("(退)红烧肉1/份\n（退）米饭2/碗"));
        assert_eq!(dishes.len(), 2);
        assert!(dishes.iter().all(|d| d.returned));
        assert_eq!(dishes[0].name, "红烧肉");
        assert_eq!(dishes[1].name, "米饭");
    }

    #[test]
    fn test_multiline_bracket_name() {
        let dishes = parse_kitchen_dishes(&slip("紫苏半边云（鲜牛1/份\n胸口）\n青菜1/份"));
        assert_eq!(
            dishes,
            vec![Dish::new("紫苏半边云（鲜牛胸口）", 1), Dish::new("青菜", 1)]
        );
    }

    #[test]
    fn test_lookahead_dish_line_is_not_merged() {
        let dishes = parse_kitchen_dishes(&slip("牛肉(大1/份\n鸡(小)1/份"));
        assert_eq!(dishes.len(), 2);
        assert_eq!(dishes[0].name, "牛肉(大");
        assert_eq!(dishes[1].name, "鸡(小)");
    }

    #[test]
    fn test_combo_sub_items() {
        let dishes =
            parse_kitchen_dishes(&slip("双人套餐1/份\n-可乐2/瓶\n-薯条1/份\n-加冰\n汉堡1/个\n-番茄酱1/份"));
        assert_eq!(dishes.len(), 3);
        assert_eq!(dishes[0].name, "可乐");
        assert_eq!(dishes[0].quantity, 2);
        assert_eq!(dishes[0].combo.as_deref(), Some("双人套餐"));
        assert_eq!(dishes[1].name, "薯条");
        // 普通菜品行结束套餐，之后的子项被忽略
        assert_eq!(dishes[2], Dish::new("汉堡", 1));
        assert!(dishes.iter().all(|d| !d.combo_parent));
    }

    #[test]
    fn test_short_names_are_noise() {
        let dishes = parse_kitchen_dishes(&slip("A1/份\n鱼1/份\n鱼头1/份"));
        assert_eq!(dishes, vec![Dish::new("鱼头", 1)]);
    }

    #[test]
    fn test_section_without_slip_number() {
        let dishes = parse_kitchen_dishes("菜品数量\n豆花2/碗");
        assert_eq!(dishes, vec![Dish::new("豆花", 2)]);
    }
}
