//! 小票处理流水线
//!
//! 打印任务字节 → 解码 → 纯文本 → 单号/时间 → 持久化 → 缓存 → 订单处理。
//! 持久化之后的任何下游失败都进入重试队列，不会丢弃任务。

use faker_printer::{PlainTextRenderer, decode};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::core::PipelineContext;
use crate::downstream::DownstreamError;
use crate::events;
use crate::orders::{DeliveryProgress, ProcessOutcome};
use crate::receipt::{JobHints, Receipt, extract_fields, now_timestamp};

/// 解码打印任务并生成小票，解码失败时生成错误标记小票
pub fn build_receipt(raw: Vec<u8>, source: &str, line_width: usize) -> Receipt {
    match decode(&raw) {
        Ok(directives) => {
            let text = PlainTextRenderer::new(line_width).render(&directives);
            let fields = extract_fields(&text);
            Receipt::new(fields.receipt_no, fields.timestamp, text, raw, source.to_string())
        }
        Err(e) => Receipt::parse_failure(&e.to_string(), now_timestamp(), raw, source.to_string()),
    }
}

/// 处理一个完整的打印任务
#[instrument(skip_all, fields(source = %source, bytes = raw.len()))]
pub async fn ingest(ctx: &PipelineContext, raw: Vec<u8>, source: &str, hints: JobHints) -> Receipt {
    ctx.stats.record_received();

    let receipt = build_receipt(raw, source, ctx.config.line_width).with_hints(hints);
    if let Some(reason) = &receipt.parse_error {
        ctx.stats.record_parse_error();
        warn!(error = %reason, "Print job could not be decoded");
    }

    if let Err(e) = ctx.store.save(&receipt) {
        error!(id = %receipt.id, error = %e, "Failed to persist receipt");
    }
    ctx.cache.push(&receipt);

    info!(
        id = %receipt.id,
        receipt_no = %receipt.display_no(),
        timestamp = %receipt.timestamp,
        "Receipt captured"
    );

    if receipt.is_parse_error() {
        return receipt;
    }

    let mut progress = DeliveryProgress::default();
    if let Err(e) = deliver(ctx, &receipt, &mut progress).await {
        ctx.stats.record_downstream_error();
        error!(receipt_no = %receipt.display_no(), error = %e, "Order processing failed, queued for retry");
        ctx.events.log_event(
            events::ORDER_ERROR,
            json!({ "error": e.to_string(), "receipt_no": receipt.receipt_no }),
        );

        if let Err(e) = ctx.retry.try_enqueue(receipt.clone(), progress) {
            error!(receipt_no = %receipt.display_no(), error = %e, "Retry queue rejected receipt");
        }
    }

    receipt
}

/// 订单处理；成功写入下游时标记小票已同步
///
/// 只有 `Err` 需要重试；`progress` 记录已完成的写入，重试时原样传回。
pub async fn deliver(
    ctx: &PipelineContext,
    receipt: &Receipt,
    progress: &mut DeliveryProgress,
) -> Result<ProcessOutcome, DownstreamError> {
    let outcome = ctx.processor.process(receipt, progress).await?;

    match &outcome {
        ProcessOutcome::Processed(report) => {
            ctx.stats.record_processed();
            if let Err(e) = ctx.store.mark_synced(&receipt.id) {
                warn!(id = %receipt.id, error = %e, "Failed to mark receipt synced");
            }
            ctx.cache.mark_synced(&receipt.id);
            info!(
                receipt_no = %receipt.display_no(),
                kind = %report.kind,
                dish_count = report.dish_count,
                "Order delivered"
            );
        }
        ProcessOutcome::Skipped(reason) => {
            info!(receipt_no = %receipt.display_no(), reason, "Receipt skipped");
        }
        ProcessOutcome::SoftFailure(reason) => {
            warn!(receipt_no = %receipt.display_no(), reason, "Receipt not processed");
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faker_printer::EscPosBuilder;

    #[test]
    fn test_build_receipt_extracts_fields() {
        let mut job = EscPosBuilder::new(42);
        job.center()
            .line("制作分单")
            .left()
            .line("------------------")
            .line("单号: 20240501")
            .line("时间: 2024-05-01 12:30:00")
            .cut();

        let receipt = build_receipt(job.build(), "10.0.0.5:40000", 42);
        assert_eq!(receipt.receipt_no, "20240501");
        assert_eq!(receipt.timestamp, "2024-05-01 12:30:00");
        assert!(receipt.plain_text.contains("制作分单"));
        assert!(!receipt.plain_text.contains("-----"));
        assert!(!receipt.is_parse_error());
    }

    #[test]
    fn test_build_receipt_marks_decode_failure() {
        // 光栅图像声明 10x10，实际只有 2 字节数据
        let raw = vec![0x1D, 0x76, 0x30, 0x00, 0x0A, 0x00, 0x0A, 0x00, 0xFF, 0xFF];
        let receipt = build_receipt(raw, "s", 42);
        assert!(receipt.is_parse_error());
        assert!(receipt.plain_text.starts_with("[Parse Error:"));
        assert!(receipt.receipt_no.is_empty());
        assert_eq!(receipt.raw_len, 10);
    }
}
