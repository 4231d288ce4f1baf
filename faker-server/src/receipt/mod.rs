//! 小票记录与字段提取

pub mod extractor;
pub mod model;

pub use extractor::{ReceiptFields, TIMESTAMP_FORMAT, extract_fields, now_timestamp};
pub use model::{JobHints, Receipt};
