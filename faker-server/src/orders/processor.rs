//! 单据处理流程
//!
//! 分类 → 解析菜品 → 档口路由 → 写入下游订单库。
//!
//! 结果分三种:
//! - `Ok(Processed)` 已写入下游
//! - `Ok(Skipped | SoftFailure)` 不需要或无法处理，重试也不会改变结果
//! - `Err(_)` 下游失败，由调用方放入重试队列

use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::classifier::{
    Classification, DocumentKind, classify, extract_return_reason, extract_station_label,
    extract_table_number,
};
use super::customer::parse_customer_dishes;
use super::kitchen::parse_kitchen_dishes;
use super::station::{Station, StationRouter};
use super::Dish;
use crate::downstream::{
    DEFAULT_PREP_TIME_MINUTES, DEFAULT_URGENCY, DishRow, DownstreamError, NewOrder, OrderStore,
    RETURNABLE_STATUSES, STATUS_PENDING, STATUS_RETURNED,
};
use crate::events::{self, EventSink};
use crate::receipt::Receipt;

pub const ORDER_TYPE_DINE_IN: &str = "dine_in";
pub const ORDER_SOURCE: &str = "printer_api";

pub const SKIP_EMPTY: &str = "empty receipt";
pub const SKIP_PRE_CHECKOUT: &str = "pre-checkout bill";
pub const SKIP_CHECKOUT: &str = "checkout bill";
pub const SOFT_STATION_NOT_FOUND: &str = "station not found";
pub const SOFT_NO_DISHES: &str = "no dishes";
pub const SOFT_NOT_CONFIGURED: &str = "downstream not configured";

/// 成功写入下游的摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub kind: DocumentKind,
    pub table_no: String,
    /// 客单的下游订单 ID
    pub order_id: Option<String>,
    /// 分单上的档口
    pub station: Option<Station>,
    pub dish_count: usize,
    /// 退菜: 找到并标记的原菜数
    pub returns_matched: usize,
    /// 退菜: 找不到原菜，以负数量记录的条数
    pub returns_orphaned: usize,
}

impl ProcessReport {
    fn new(kind: DocumentKind, table_no: &str) -> Self {
        Self {
            kind,
            table_no: table_no.to_string(),
            order_id: None,
            station: None,
            dish_count: 0,
            returns_matched: 0,
            returns_orphaned: 0,
        }
    }
}

/// 已完成的下游写入
///
/// 重试时随单据一起带回，跳过已经成功的步骤，避免重复写入。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryProgress {
    /// 已创建的客单订单 ID
    pub order_id: Option<String>,
    /// 正常菜品已写入
    pub dishes_inserted: bool,
    /// 已处理的退菜 (按退菜列表下标)
    pub returns_done: BTreeSet<usize>,
    pub returns_matched: usize,
    pub returns_orphaned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed(ProcessReport),
    Skipped(&'static str),
    SoftFailure(&'static str),
}

impl ProcessOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, ProcessOutcome::Processed(_))
    }
}

pub struct OrderProcessor {
    store: Option<Arc<dyn OrderStore>>,
    events: Arc<dyn EventSink>,
    router: StationRouter,
    restaurant_id: String,
}

impl OrderProcessor {
    pub fn new(
        store: Option<Arc<dyn OrderStore>>,
        events: Arc<dyn EventSink>,
        restaurant_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            events,
            router: StationRouter::new(),
            restaurant_id: restaurant_id.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    #[instrument(skip_all, fields(receipt_no = %receipt.display_no()))]
    pub async fn process(
        &self,
        receipt: &Receipt,
        progress: &mut DeliveryProgress,
    ) -> Result<ProcessOutcome, DownstreamError> {
        let text = receipt.plain_text.as_str();
        let table_no = receipt
            .hints
            .table
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| extract_table_number(text));

        self.events.log_event(
            events::ORDER_RECEIVED,
            json!({ "receipt_no": receipt.receipt_no, "table_no": table_no }),
        );

        match classify(text, receipt.hints.declared_type.as_deref()) {
            Classification::Empty => {
                info!("Empty receipt, skipping");
                Ok(ProcessOutcome::Skipped(SKIP_EMPTY))
            }
            Classification::PreCheckout => {
                info!(table_no = %table_no, "Pre-checkout bill, skipping");
                Ok(ProcessOutcome::Skipped(SKIP_PRE_CHECKOUT))
            }
            Classification::Checkout => {
                info!(table_no = %table_no, "Checkout bill, skipping");
                self.events.log_event(
                    events::ORDER_CHECKOUT,
                    json!({ "receipt_no": receipt.receipt_no, "table_no": table_no }),
                );
                Ok(ProcessOutcome::Skipped(SKIP_CHECKOUT))
            }
            Classification::Document(DocumentKind::KitchenSlip) => {
                self.process_kitchen_slip(receipt, &table_no, progress).await
            }
            Classification::Document(DocumentKind::ReturnSlip) => {
                self.process_return_slip(receipt, &table_no, progress).await
            }
            Classification::Document(DocumentKind::CustomerOrder) => {
                self.process_customer_order(receipt, &table_no, progress).await
            }
        }
    }

    fn dish_row(
        &self,
        receipt: &Receipt,
        table_no: &str,
        dish: &Dish,
        status: &str,
    ) -> DishRow {
        DishRow {
            order_id: None,
            restaurant_id: self.restaurant_id.clone(),
            receipt_no: receipt.receipt_no.clone(),
            name: dish.name.clone(),
            quantity: dish.quantity,
            station_id: dish.station_id.clone(),
            table_no: table_no.to_string(),
            status: status.to_string(),
            prep_time_minutes: DEFAULT_PREP_TIME_MINUTES,
            urgency_level: DEFAULT_URGENCY.to_string(),
        }
    }

    /// 按档口和凉菜覆盖规则设置每道菜的档口 ID
    fn route(&self, station: Option<Station>, dishes: &mut [Dish]) {
        let Some(station) = station else {
            return;
        };
        for dish in dishes {
            dish.station_id = Some(self.router.station_for_dish(station, &dish.name).id().to_string());
        }
    }

    async fn process_kitchen_slip(
        &self,
        receipt: &Receipt,
        table_no: &str,
        progress: &mut DeliveryProgress,
    ) -> Result<ProcessOutcome, DownstreamError> {
        let label = extract_station_label(&receipt.plain_text);
        let Some(station) = label.as_deref().and_then(|l| self.router.resolve(l)) else {
            warn!(station = ?label, "No station found for kitchen slip");
            return Ok(ProcessOutcome::SoftFailure(SOFT_STATION_NOT_FOUND));
        };

        let mut dishes = parse_kitchen_dishes(&receipt.plain_text);
        if dishes.is_empty() {
            warn!(station = %station, "No dishes found in kitchen slip");
            return Ok(ProcessOutcome::SoftFailure(SOFT_NO_DISHES));
        }

        let Some(store) = &self.store else {
            return Ok(ProcessOutcome::SoftFailure(SOFT_NOT_CONFIGURED));
        };

        self.route(Some(station), &mut dishes);
        let (returned, ordered): (Vec<Dish>, Vec<Dish>) =
            dishes.into_iter().partition(|d| d.returned);

        let mut report = ProcessReport::new(DocumentKind::KitchenSlip, table_no);
        report.station = Some(station);
        report.dish_count = ordered.len() + returned.len();

        if !progress.dishes_inserted {
            let rows: Vec<DishRow> = ordered
                .iter()
                .map(|d| self.dish_row(receipt, table_no, d, STATUS_PENDING))
                .collect();
            store.insert_dishes(rows).await?;
            progress.dishes_inserted = true;
        }

        // 分单上带 (退) 前缀的菜按退菜处理
        if !returned.is_empty() {
            self.apply_returns(store.as_ref(), receipt, table_no, &returned, progress)
                .await?;
        }
        report.returns_matched = progress.returns_matched;
        report.returns_orphaned = progress.returns_orphaned;

        info!(
            station = %station,
            table_no = %table_no,
            dish_count = report.dish_count,
            "Kitchen slip processed"
        );
        self.events.log_event(
            events::KITCHEN_SLIP_PROCESSED,
            json!({
                "station": station.label(),
                "station_id": station.id(),
                "dish_count": report.dish_count,
                "table_no": table_no,
                "receipt_no": receipt.receipt_no,
            }),
        );
        Ok(ProcessOutcome::Processed(report))
    }

    async fn process_customer_order(
        &self,
        receipt: &Receipt,
        table_no: &str,
        progress: &mut DeliveryProgress,
    ) -> Result<ProcessOutcome, DownstreamError> {
        let Some(store) = &self.store else {
            return Ok(ProcessOutcome::SoftFailure(SOFT_NOT_CONFIGURED));
        };

        let order_id = match progress.order_id.clone() {
            Some(order_id) => order_id,
            None => {
                let order_id = store.insert_order(self.new_order(receipt, table_no)).await?;
                progress.order_id = Some(order_id.clone());
                order_id
            }
        };

        // 客单不分档口，由厨房决定
        let dishes = parse_customer_dishes(&receipt.plain_text);
        if !progress.dishes_inserted {
            let rows: Vec<DishRow> = dishes
                .iter()
                .map(|d| DishRow {
                    order_id: Some(order_id.clone()),
                    ..self.dish_row(receipt, table_no, d, STATUS_PENDING)
                })
                .collect();
            store.insert_dishes(rows).await?;
            progress.dishes_inserted = true;
        }

        info!(order_id = %order_id, table_no = %table_no, dish_count = dishes.len(), "Customer order processed");
        self.events.log_event(
            events::ORDER_PROCESSED,
            json!({
                "order_id": order_id,
                "receipt_no": receipt.receipt_no,
                "table_no": table_no,
                "dish_count": dishes.len(),
            }),
        );

        let mut report = ProcessReport::new(DocumentKind::CustomerOrder, table_no);
        report.order_id = Some(order_id);
        report.dish_count = dishes.len();
        Ok(ProcessOutcome::Processed(report))
    }

    async fn process_return_slip(
        &self,
        receipt: &Receipt,
        table_no: &str,
        progress: &mut DeliveryProgress,
    ) -> Result<ProcessOutcome, DownstreamError> {
        let reason = extract_return_reason(&receipt.plain_text);
        let mut dishes = parse_kitchen_dishes(&receipt.plain_text);
        if dishes.is_empty() {
            warn!(table_no = %table_no, "No dishes found in return slip");
            return Ok(ProcessOutcome::SoftFailure(SOFT_NO_DISHES));
        }

        let Some(store) = &self.store else {
            return Ok(ProcessOutcome::SoftFailure(SOFT_NOT_CONFIGURED));
        };

        // 退菜单上的菜品不一定都带 (退) 前缀；没有任何前缀时整单都是退菜
        if dishes.iter().any(|d| d.returned) {
            dishes.retain(|d| d.returned);
        } else {
            dishes.iter_mut().for_each(|d| d.returned = true);
        }

        let station = extract_station_label(&receipt.plain_text)
            .as_deref()
            .and_then(|l| self.router.resolve(l));
        self.route(station, &mut dishes);

        let mut report = ProcessReport::new(DocumentKind::ReturnSlip, table_no);
        report.station = station;
        report.dish_count = dishes.len();
        self.apply_returns(store.as_ref(), receipt, table_no, &dishes, progress)
            .await?;
        report.returns_matched = progress.returns_matched;
        report.returns_orphaned = progress.returns_orphaned;

        info!(
            table_no = %table_no,
            reason = ?reason,
            matched = report.returns_matched,
            orphaned = report.returns_orphaned,
            "Return slip processed"
        );
        self.events.log_event(
            events::RETURN_SLIP_PROCESSED,
            json!({
                "receipt_no": receipt.receipt_no,
                "table_no": table_no,
                "reason": reason,
                "dish_count": report.dish_count,
                "matched": report.returns_matched,
                "orphaned": report.returns_orphaned,
            }),
        );
        Ok(ProcessOutcome::Processed(report))
    }

    /// 标记原菜为退菜；找不到原菜时写入一条负数量的退菜记录
    ///
    /// `progress` 中已完成的退菜会被跳过。
    async fn apply_returns(
        &self,
        store: &dyn OrderStore,
        receipt: &Receipt,
        table_no: &str,
        dishes: &[Dish],
        progress: &mut DeliveryProgress,
    ) -> Result<(), DownstreamError> {
        let mut orphans = Vec::new();
        let mut orphan_indices = Vec::new();

        for (index, dish) in dishes.iter().enumerate() {
            if progress.returns_done.contains(&index) {
                continue;
            }
            match store
                .find_recent_dish(table_no, &dish.name, &RETURNABLE_STATUSES)
                .await?
            {
                Some(record) => {
                    store.update_dish_status(&record.id, STATUS_RETURNED).await?;
                    progress.returns_done.insert(index);
                    progress.returns_matched += 1;
                }
                None => {
                    warn!(dish = %dish.name, table_no = %table_no, "No matching dish for return, recording orphan");
                    let orphan = Dish {
                        quantity: -dish.quantity.abs(),
                        ..dish.clone()
                    };
                    orphans.push(self.dish_row(receipt, table_no, &orphan, STATUS_RETURNED));
                    orphan_indices.push(index);
                }
            }
        }

        if !orphans.is_empty() {
            store.insert_dishes(orphans).await?;
            progress.returns_orphaned += orphan_indices.len();
            progress.returns_done.extend(orphan_indices);
        }
        Ok(())
    }

    fn new_order(&self, receipt: &Receipt, table_no: &str) -> NewOrder {
        NewOrder {
            restaurant_id: self.restaurant_id.clone(),
            receipt_no: receipt.receipt_no.clone(),
            table_no: table_no.to_string(),
            order_type: ORDER_TYPE_DINE_IN.to_string(),
            status: STATUS_PENDING.to_string(),
            raw_data: json!({ "text": receipt.plain_text }),
            ordered_at: receipt.timestamp.clone(),
            source: ORDER_SOURCE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::MemoryOrderStore;
    use crate::events::MemorySink;
    use crate::receipt::JobHints;

    const RESTAURANT: &str = "restaurant-1";

    fn receipt(text: &str) -> Receipt {
        Receipt::new("1001".into(), "2024-05-01 12:00:00".into(), text.into(), vec![], "test".into())
    }

    fn progress() -> DeliveryProgress {
        DeliveryProgress::default()
    }

    fn processor() -> (OrderProcessor, Arc<MemoryOrderStore>, Arc<MemorySink>) {
        let store = Arc::new(MemoryOrderStore::new());
        let sink = Arc::new(MemorySink::new());
        let processor = OrderProcessor::new(Some(store.clone()), sink.clone(), RESTAURANT);
        (processor, store, sink)
    }

    #[tokio::test]
    async fn test_customer_order() {
        let (processor, store, sink) = processor();
        let text = "桌号: 8\n菜品单价数量小计\n野菜卷181份18\n菜品价格合计: 70";

        let outcome = processor.process(&receipt(text), &mut progress()).await.unwrap();
        let ProcessOutcome::Processed(report) = outcome else {
            panic!("expected processed, got {:?}", outcome);
        };
        assert_eq!(report.kind, DocumentKind::CustomerOrder);
        assert_eq!(report.table_no, "8");
        assert_eq!(report.dish_count, 1);

        let orders = store.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].1.order_type, ORDER_TYPE_DINE_IN);
        assert_eq!(orders[0].1.ordered_at, "2024-05-01 12:00:00");

        let dishes = store.dishes();
        assert_eq!(dishes[0].row.name, "野菜卷");
        assert_eq!(dishes[0].row.order_id.as_deref(), Some(orders[0].0.as_str()));
        assert_eq!(dishes[0].row.station_id, None);
        assert_eq!(sink.names(), vec![events::ORDER_RECEIVED, events::ORDER_PROCESSED]);
    }

    #[tokio::test]
    async fn test_kitchen_slip_routes_station() {
        let (processor, store, _) = processor();
        let text = "制作分单\n档口: 荤菜\n桌号: 8\n菜品数量\n木姜子鲜黄牛肉1/份\n口水鸡1/份\n单号: X";

        let outcome = processor.process(&receipt(text), &mut progress()).await.unwrap();
        assert!(outcome.is_processed());

        let dishes = store.dishes();
        assert_eq!(dishes.len(), 2);
        assert_eq!(dishes[0].row.name, "木姜子鲜黄牛肉");
        assert_eq!(dishes[0].row.quantity, 1);
        assert_eq!(dishes[0].row.station_id.as_deref(), Some(Station::Meat.id()));
        assert_eq!(dishes[1].row.station_id.as_deref(), Some(Station::Cold.id()));
        assert_eq!(dishes[0].row.table_no, "8");
        assert!(store.orders().is_empty());
    }

    #[tokio::test]
    async fn test_kitchen_slip_soft_failures() {
        let (processor, store, _) = processor();

        let unknown = "制作分单\n档口: 烧烤\n菜品数量\n羊肉串2/份";
        assert_eq!(
            processor.process(&receipt(unknown), &mut progress()).await.unwrap(),
            ProcessOutcome::SoftFailure(SOFT_STATION_NOT_FOUND)
        );

        let empty = "制作分单\n档口: 荤菜\n菜品数量\n";
        assert_eq!(
            processor.process(&receipt(empty), &mut progress()).await.unwrap(),
            ProcessOutcome::SoftFailure(SOFT_NO_DISHES)
        );
        assert!(store.dishes().is_empty());
    }

    #[tokio::test]
    async fn test_declared_kitchen_slip_and_table_hint() {
        let (processor, store, _) = processor();
        let r = receipt("档口: 酒水\n桌号: 3\n菜品数量\n啤酒2/瓶").with_hints(JobHints {
            declared_type: Some("kitchenSlip".into()),
            table: Some("A5".into()),
        });

        processor.process(&r, &mut progress()).await.unwrap();
        let dishes = store.dishes();
        assert_eq!(dishes[0].row.table_no, "A5");
        assert_eq!(dishes[0].row.station_id.as_deref(), Some(Station::Drinks.id()));
    }

    #[tokio::test]
    async fn test_skips() {
        let (processor, store, sink) = processor();
        assert_eq!(
            processor.process(&receipt("  "), &mut progress()).await.unwrap(),
            ProcessOutcome::Skipped(SKIP_EMPTY)
        );
        assert_eq!(
            processor.process(&receipt("预结单\n桌号: 1"), &mut progress()).await.unwrap(),
            ProcessOutcome::Skipped(SKIP_PRE_CHECKOUT)
        );
        assert_eq!(
            processor.process(&receipt("结账单\n桌号: 1"), &mut progress()).await.unwrap(),
            ProcessOutcome::Skipped(SKIP_CHECKOUT)
        );
        assert!(store.orders().is_empty());
        assert!(sink.names().contains(&events::ORDER_CHECKOUT.to_string()));
    }

    #[tokio::test]
    async fn test_return_slip_marks_existing_dish() {
        let (processor, store, _) = processor();
        processor
            .process(&receipt("制作分单\n档口: 荤菜\n桌号: 8\n菜品数量\n红烧肉1/份\n单号: 1"), &mut progress())
            .await
            .unwrap();

        let text = "退菜单\n桌号: 8\n退菜原因: 上错了\n菜品数量\n(退)红烧肉1/份\n(退)米饭1/碗\n单号: 2";
        let ProcessOutcome::Processed(report) = processor.process(&receipt(text), &mut progress()).await.unwrap()
        else {
            panic!("expected processed");
        };
        assert_eq!(report.returns_matched, 1);
        assert_eq!(report.returns_orphaned, 1);

        let dishes = store.dishes();
        assert_eq!(dishes.len(), 2);
        assert_eq!(dishes[0].row.status, STATUS_RETURNED);
        assert_eq!(dishes[1].row.name, "米饭");
        assert_eq!(dishes[1].row.quantity, -1);
        assert_eq!(dishes[1].row.status, STATUS_RETURNED);
    }

    #[tokio::test]
    async fn test_return_slip_without_prefix_returns_all() {
        let (processor, store, _) = processor();
        let text = "退菜单\n桌号: 2\n菜品数量\n酸菜鱼2/份\n单号: 3";
        processor.process(&receipt(text), &mut progress()).await.unwrap();
        let dishes = store.dishes();
        assert_eq!(dishes.len(), 1);
        assert_eq!(dishes[0].row.quantity, -2);
    }

    #[tokio::test]
    async fn test_downstream_failure_is_an_error() {
        let (processor, store, _) = processor();
        store.fail_next(1);
        let result = processor
            .process(&receipt("桌号: 8\n菜品单价数量小计\n野菜卷181份18\n菜品价格合计: 70"), &mut progress())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_not_configured() {
        let processor = OrderProcessor::new(None, Arc::new(MemorySink::new()), RESTAURANT);
        assert_eq!(
            processor.process(&receipt("桌号: 1\n菜品数量\n米饭11碗1"), &mut progress()).await.unwrap(),
            ProcessOutcome::SoftFailure(SOFT_NOT_CONFIGURED)
        );
    }

    #[tokio::test]
    async fn test_kitchen_slip_retry_skips_inserted_dishes() {
        let (processor, store, _) = processor();
        let slip = receipt("制作分单\n档口: 荤菜\n桌号: 5\n菜品数量\n红烧肉1/份\n(退)米饭1/碗\n单号: 7");
        let mut progress = progress();

        // 正常菜品写入成功，退菜查找失败
        store.fail_nth(2);
        assert!(processor.process(&slip, &mut progress).await.is_err());
        assert!(progress.dishes_inserted);
        assert_eq!(store.dishes().len(), 1);

        let outcome = processor.process(&slip, &mut progress).await.unwrap();
        assert!(outcome.is_processed());

        let dishes = store.dishes();
        assert_eq!(dishes.len(), 2);
        assert_eq!(dishes[0].row.name, "红烧肉");
        assert_eq!(dishes[0].row.status, STATUS_PENDING);
        assert_eq!(dishes[1].row.name, "米饭");
        assert_eq!(dishes[1].row.quantity, -1);
        assert_eq!(dishes[1].row.status, STATUS_RETURNED);
    }

    #[tokio::test]
    async fn test_return_slip_retry_resumes_after_partial_failure() {
        let (processor, store, _) = processor();
        processor
            .process(
                &receipt("制作分单\n档口: 荤菜\n桌号: 8\n菜品数量\n红烧肉1/份\n米饭1/碗\n单号: 1"),
                &mut progress(),
            )
            .await
            .unwrap();

        let slip = receipt("退菜单\n桌号: 8\n菜品数量\n(退)红烧肉1/份\n(退)米饭1/碗\n单号: 2");
        let mut progress = progress();

        // 红烧肉查找、标记成功，米饭查找成功后标记失败
        store.fail_nth(4);
        assert!(processor.process(&slip, &mut progress).await.is_err());
        assert_eq!(progress.returns_matched, 1);

        let ProcessOutcome::Processed(report) = processor.process(&slip, &mut progress).await.unwrap()
        else {
            panic!("expected processed");
        };
        assert_eq!(report.returns_matched, 2);
        assert_eq!(report.returns_orphaned, 0);

        let dishes = store.dishes();
        assert_eq!(dishes.len(), 2);
        assert!(dishes.iter().all(|d| d.row.status == STATUS_RETURNED));
    }

    #[tokio::test]
    async fn test_customer_order_retry_reuses_order() {
        let (processor, store, _) = processor();
        let order = receipt("桌号: 8\n菜品单价数量小计\n野菜卷181份18\n菜品价格合计: 70");
        let mut progress = progress();

        store.fail_nth(2);
        assert!(processor.process(&order, &mut progress).await.is_err());
        assert!(progress.order_id.is_some());

        let ProcessOutcome::Processed(report) = processor.process(&order, &mut progress).await.unwrap()
        else {
            panic!("expected processed");
        };
        assert_eq!(report.order_id, progress.order_id);
        assert_eq!(store.orders().len(), 1);
        assert_eq!(store.dishes().len(), 1);
    }
}
