//! 小票数据结构

use serde::{Deserialize, Serialize};

/// 随打印任务一起到达的提示信息
///
/// 网络打印任务通常没有这些字段，回放或导入时可以显式指定。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHints {
    /// 声明的单据类型 (例如 "kitchenSlip")
    pub declared_type: Option<String>,
    /// 显式桌号，优先于文本中的桌号
    pub table: Option<String>,
}

/// 一次完整打印任务的记录
///
/// 创建后只有 `synced` 会变化。原始字节单独存储，不参与 JSON 序列化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// UUID，与单号是否识别成功无关
    pub id: String,
    /// 单号，可能为空
    pub receipt_no: String,
    pub timestamp: String,
    pub plain_text: String,
    #[serde(skip)]
    pub raw: Vec<u8>,
    pub raw_len: usize,
    /// 来源地址 (ip:port)
    pub source: String,
    /// 创建时间 (Unix millis)
    pub created_at: i64,
    pub synced: bool,
    /// 解码失败原因；有值时不参与分类
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    #[serde(default)]
    pub hints: JobHints,
}

impl Receipt {
    pub fn new(
        receipt_no: String,
        timestamp: String,
        plain_text: String,
        raw: Vec<u8>,
        source: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            receipt_no,
            timestamp,
            plain_text,
            raw_len: raw.len(),
            raw,
            source,
            created_at: chrono::Utc::now().timestamp_millis(),
            synced: false,
            parse_error: None,
            hints: JobHints::default(),
        }
    }

    /// 解码失败的小票: 单号为空，正文为错误标记
    pub fn parse_failure(reason: &str, timestamp: String, raw: Vec<u8>, source: String) -> Self {
        let mut receipt = Self::new(
            String::new(),
            timestamp,
            format!("[Parse Error: {}]", reason),
            raw,
            source,
        );
        receipt.parse_error = Some(reason.to_string());
        receipt
    }

    pub fn with_hints(mut self, hints: JobHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn is_parse_error(&self) -> bool {
        self.parse_error.is_some()
    }

    /// 日志里使用的单号
    pub fn display_no(&self) -> &str {
        if self.receipt_no.is_empty() {
            "unknown"
        } else {
            &self.receipt_no
        }
    }
}
