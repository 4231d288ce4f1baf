//! Supabase (PostgREST) 订单库客户端

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{
    DishRecord, DishRow, DownstreamError, DownstreamResult, NewOrder, OrderStore, id_as_string,
};

const ORDERS_TABLE: &str = "order_orders";
const DISHES_TABLE: &str = "order_dishes";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct InsertedRow {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
}

pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> DownstreamResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: Response) -> DownstreamResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DownstreamError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl OrderStore for SupabaseStore {
    #[instrument(skip(self, order), fields(receipt_no = %order.receipt_no))]
    async fn insert_order(&self, order: NewOrder) -> DownstreamResult<String> {
        let response = self
            .request(Method::POST, ORDERS_TABLE)
            .header("Prefer", "return=representation")
            .json(&order)
            .send()
            .await?;

        let rows: Vec<InsertedRow> = Self::check(response).await?.json().await?;
        let id = rows
            .into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| DownstreamError::Response("order insert returned no rows".into()))?;

        debug!(order_id = %id, "Order inserted");
        Ok(id)
    }

    #[instrument(skip(self, dishes), fields(count = dishes.len()))]
    async fn insert_dishes(&self, dishes: Vec<DishRow>) -> DownstreamResult<()> {
        if dishes.is_empty() {
            return Ok(());
        }
        let response = self
            .request(Method::POST, DISHES_TABLE)
            .json(&dishes)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn find_recent_dish(
        &self,
        table_no: &str,
        name: &str,
        statuses: &[&str],
    ) -> DownstreamResult<Option<DishRecord>> {
        let response = self
            .request(Method::GET, DISHES_TABLE)
            .query(&[
                ("select", "*".to_string()),
                ("table_no", format!("eq.{}", table_no)),
                ("name", format!("eq.{}", name)),
                ("status", format!("in.({})", statuses.join(","))),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<DishRecord> = Self::check(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn update_dish_status(&self, id: &str, status: &str) -> DownstreamResult<()> {
        let response = self
            .request(Method::PATCH, DISHES_TABLE)
            .query(&[("id", format!("eq.{}", id))])
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
