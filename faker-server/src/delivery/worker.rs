//! RetryWorker - drains the retry queue
//!
//! Items wait for their own backoff, not for the head of the queue: the worker
//! keeps received items locally and always sleeps until the earliest deadline.

use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::retry::{RetryDecision, RetryItem, RetryReceiver};
use crate::core::PipelineContext;
use crate::events;
use crate::pipeline;

pub struct RetryWorker {
    ctx: PipelineContext,
    receiver: RetryReceiver,
    shutdown: CancellationToken,
}

impl RetryWorker {
    pub fn new(ctx: PipelineContext, receiver: RetryReceiver, shutdown: CancellationToken) -> Self {
        Self {
            ctx,
            receiver,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("RetryWorker started");

        let mut pending: Vec<RetryItem> = Vec::new();
        let mut closed = false;

        loop {
            let deadline = pending.iter().map(|item| item.next_eligible).min();

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    if !pending.is_empty() {
                        tracing::warn!(pending = pending.len(), "RetryWorker shutting down with pending items");
                    }
                    break;
                }

                item = self.receiver.recv(), if !closed => {
                    match item {
                        Some(item) => {
                            tracing::debug!(
                                receipt_no = %item.receipt.display_no(),
                                delay_secs = item.delay.as_secs_f64(),
                                "Receipt queued for retry"
                            );
                            pending.push(item);
                        }
                        None => closed = true,
                    }
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let now = Instant::now();
                    let (due, waiting): (Vec<RetryItem>, Vec<RetryItem>) =
                        pending.drain(..).partition(|item| item.next_eligible <= now);
                    pending = waiting;

                    for item in due {
                        if let Some(item) = self.attempt(item).await {
                            pending.push(item);
                        }
                    }
                }
            }

            if closed && pending.is_empty() {
                tracing::info!("Retry queue closed, RetryWorker stopping");
                break;
            }
        }
    }

    /// Re-run processing; returns the item when it must be retried again
    async fn attempt(&self, mut item: RetryItem) -> Option<RetryItem> {
        let receipt_no = item.receipt.display_no().to_string();

        match pipeline::deliver(&self.ctx, &item.receipt, &mut item.progress).await {
            Ok(_) => {
                tracing::info!(receipt_no = %receipt_no, attempts = item.attempts + 1, "Retry succeeded");
                self.receiver.finish();
                None
            }
            Err(e) => {
                self.ctx.stats.record_downstream_error();
                tracing::error!(
                    receipt_no = %receipt_no,
                    attempt = item.attempts + 1,
                    delay_secs = item.delay.as_secs(),
                    error = %e,
                    "Retry failed"
                );

                match self.receiver.policy().record_failure(&mut item) {
                    RetryDecision::Requeue => Some(item),
                    RetryDecision::Drop => {
                        tracing::error!(
                            receipt_no = %receipt_no,
                            attempts = item.attempts + 1,
                            "Backoff cap reached, dropping receipt"
                        );
                        self.ctx.stats.record_retry_dropped();
                        self.ctx.events.log_event(
                            events::RETRY_DROPPED,
                            json!({
                                "receipt_no": item.receipt.receipt_no,
                                "receipt_id": item.receipt.id,
                                "error": e.to_string(),
                            }),
                        );
                        self.receiver.finish();
                        None
                    }
                }
            }
        }
    }
}
