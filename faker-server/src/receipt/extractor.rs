//! 小票字段提取 (单号、时间)

use regex::Regex;
use std::sync::LazyLock;

pub const RECEIPT_NO_MARKER: &str = "单号";
pub const TIME_MARKER: &str = "时间";

/// 无法从文本中取得时间时使用的格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static RECEIPT_NO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"单号[：:\s]+(\d+)").expect("valid receipt number regex"));
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"时间[：:]\s*(.+)").expect("valid time regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptFields {
    /// 未识别时为空字符串
    pub receipt_no: String,
    pub timestamp: String,
}

/// 从规范化文本中提取单号和时间
///
/// 都取第一次出现的标记。时间缺失时使用当前本地时间。
pub fn extract_fields(text: &str) -> ReceiptFields {
    let lines: Vec<&str> = text.lines().collect();
    let mut receipt_no: Option<String> = None;
    let mut timestamp: Option<String> = None;

    for (i, line) in lines.iter().enumerate() {
        let next = lines.get(i + 1).map(|l| l.trim());

        if receipt_no.is_none() && line.contains(RECEIPT_NO_MARKER) {
            receipt_no = RECEIPT_NO_RE
                .captures(line)
                .map(|c| c[1].to_string())
                .or_else(|| {
                    next.filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                        .map(str::to_string)
                });
        }

        if timestamp.is_none() && line.contains(TIME_MARKER) {
            timestamp = time_on_line(line).or_else(|| {
                next.filter(|n| !n.is_empty()).map(str::to_string)
            });
        }

        if receipt_no.is_some() && timestamp.is_some() {
            break;
        }
    }

    ReceiptFields {
        receipt_no: receipt_no.unwrap_or_default(),
        timestamp: timestamp.unwrap_or_else(now_timestamp),
    }
}

/// 同一行上的时间: 冒号之后，否则标记之后的剩余文本
fn time_on_line(line: &str) -> Option<String> {
    if let Some(caps) = TIME_RE.captures(line) {
        let value = caps[1].trim();
        return (!value.is_empty()).then(|| value.to_string());
    }

    let (_, rest) = line.split_once(TIME_MARKER)?;
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_and_time_on_same_line() {
        let fields = extract_fields("结账单\n单号: 20240501\n时间: 2024-05-01 12:30:00\n");
        assert_eq!(fields.receipt_no, "20240501");
        assert_eq!(fields.timestamp, "2024-05-01 12:30:00");
    }

    #[test]
    fn test_full_width_colon() {
        let fields = extract_fields("单号：0012\n下单时间：12:01");
        assert_eq!(fields.receipt_no, "0012");
        assert_eq!(fields.timestamp, "12:01");
    }

    #[test]
    fn test_number_on_next_line() {
        let fields = extract_fields("单号\n  778899  \n");
        assert_eq!(fields.receipt_no, "778899");
    }

    #[test]
    fn test_next_line_must_be_numeric() {
        let fields = extract_fields("单号\nA12\n");
        assert_eq!(fields.receipt_no, "");
    }

    #[test]
    fn test_time_without_colon() {
        assert_eq!(extract_fields("时间 2024-05-01 08:00").timestamp, "2024-05-01 08:00");
        assert_eq!(extract_fields("时间\n2024-05-01 09:00").timestamp, "2024-05-01 09:00");
    }

    #[test]
    fn test_missing_time_uses_clock() {
        let fields = extract_fields("no markers here");
        assert!(fields.receipt_no.is_empty());
        assert!(chrono::NaiveDateTime::parse_from_str(&fields.timestamp, TIMESTAMP_FORMAT).is_ok());
    }
}
