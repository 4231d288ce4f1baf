//! 监控事件
//!
//! 事件是尽力而为的: 发送失败只记 warn 日志，不影响小票处理。

use parking_lot::Mutex;
use reqwest::Client;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, warn};

pub const ORDER_RECEIVED: &str = "order.received";
pub const ORDER_CHECKOUT: &str = "order.checkout";
pub const ORDER_PROCESSED: &str = "order.processed";
pub const KITCHEN_SLIP_PROCESSED: &str = "kitchen_slip.processed";
pub const RETURN_SLIP_PROCESSED: &str = "return_slip.processed";
pub const ORDER_ERROR: &str = "order.error";
pub const RETRY_DROPPED: &str = "retry.dropped";

const EVENT_SOURCE: &str = "local_printer_api";
const INGEST_TIMEOUT: Duration = Duration::from_secs(5);

pub trait EventSink: Send + Sync {
    /// 发送事件，不等待结果
    fn log_event(&self, event: &str, fields: Value);
}

/// 未配置监控时使用
pub struct NoopSink;

impl EventSink for NoopSink {
    fn log_event(&self, event: &str, _fields: Value) {
        debug!(event, "Monitoring disabled, event dropped");
    }
}

/// Axiom ingest API
pub struct AxiomSink {
    client: Client,
    url: String,
    token: String,
}

impl AxiomSink {
    pub fn new(token: impl Into<String>, dataset: &str) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(INGEST_TIMEOUT).build()?,
            url: format!("https://api.axiom.co/v1/datasets/{}/ingest", dataset),
            token: token.into(),
        })
    }
}

/// 事件字段 + 事件名、时间戳和来源
fn event_payload(event: &str, fields: Value) -> Value {
    let mut map = match fields {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".into(), other);
            map
        }
    };
    map.insert("event".into(), json!(event));
    map.insert("timestamp".into(), json!(chrono::Utc::now().to_rfc3339()));
    map.insert("source".into(), json!(EVENT_SOURCE));
    Value::Object(map)
}

impl EventSink for AxiomSink {
    fn log_event(&self, event: &str, fields: Value) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(event, "No runtime available, monitoring event dropped");
            return;
        };

        let request = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&[event_payload(event, fields)]);
        let event = event.to_string();

        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    warn!(event = %event, status = %response.status(), "Axiom ingest rejected event")
                }
                Err(e) => warn!(event = %event, error = %e, "Axiom ingest failed"),
            }
        });
    }
}

/// 记录所有事件，测试用
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<(String, Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|(name, _)| name.clone()).collect()
    }
}

impl EventSink for MemorySink {
    fn log_event(&self, event: &str, fields: Value) {
        self.events.lock().push((event.to_string(), fields));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_adds_metadata() {
        let payload = event_payload(ORDER_RECEIVED, json!({ "receipt_no": "12" }));
        assert_eq!(payload["event"], ORDER_RECEIVED);
        assert_eq!(payload["receipt_no"], "12");
        assert_eq!(payload["source"], EVENT_SOURCE);
        assert!(payload["timestamp"].is_string());
    }

    #[test]
    fn test_axiom_sink_without_runtime_does_not_panic() {
        let sink = AxiomSink::new("token", "kitchen-orders").unwrap();
        sink.log_event(ORDER_ERROR, json!({}));
    }
}
