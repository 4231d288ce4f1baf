//! 进程内订单库
//!
//! 行为与 PostgREST 实现一致 (按插入顺序取最近一条)。可以注入失败，
//! 用于验证重试队列。

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{DishRecord, DishRow, DownstreamError, DownstreamResult, NewOrder, OrderStore};

#[derive(Debug, Clone)]
pub struct StoredDish {
    pub id: String,
    pub row: DishRow,
}

#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: Mutex<Vec<(String, NewOrder)>>,
    dishes: Mutex<Vec<StoredDish>>,
    /// 剩余需要失败的调用次数
    failures: AtomicUsize,
    /// 注入失败前先放行的调用次数
    skip: AtomicUsize,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接下来的 `n` 次调用返回 [`DownstreamError::Unavailable`]
    pub fn fail_next(&self, n: usize) {
        self.skip.store(0, Ordering::SeqCst);
        self.failures.store(n, Ordering::SeqCst);
    }

    /// 接下来的第 `k` 次调用 (从 1 开始) 失败，之前的调用正常执行
    pub fn fail_nth(&self, k: usize) {
        self.skip.store(k.saturating_sub(1), Ordering::SeqCst);
        self.failures.store(1, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<(String, NewOrder)> {
        self.orders.lock().clone()
    }

    pub fn dishes(&self) -> Vec<StoredDish> {
        self.dishes.lock().clone()
    }

    fn check_available(&self) -> DownstreamResult<()> {
        if self.failures.load(Ordering::SeqCst) == 0 {
            return Ok(());
        }
        let skipped = self
            .skip
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if skipped {
            return Ok(());
        }
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DownstreamError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_order(&self, order: NewOrder) -> DownstreamResult<String> {
        self.check_available()?;
        let id = uuid::Uuid::new_v4().to_string();
        self.orders.lock().push((id.clone(), order));
        Ok(id)
    }

    async fn insert_dishes(&self, dishes: Vec<DishRow>) -> DownstreamResult<()> {
        self.check_available()?;
        let mut stored = self.dishes.lock();
        stored.extend(dishes.into_iter().map(|row| StoredDish {
            id: uuid::Uuid::new_v4().to_string(),
            row,
        }));
        Ok(())
    }

    async fn find_recent_dish(
        &self,
        table_no: &str,
        name: &str,
        statuses: &[&str],
    ) -> DownstreamResult<Option<DishRecord>> {
        self.check_available()?;
        let stored = self.dishes.lock();
        Ok(stored
            .iter()
            .rev()
            .find(|d| {
                d.row.table_no == table_no
                    && d.row.name == name
                    && statuses.contains(&d.row.status.as_str())
            })
            .map(|d| DishRecord {
                id: d.id.clone(),
                name: d.row.name.clone(),
                table_no: d.row.table_no.clone(),
                status: d.row.status.clone(),
                quantity: d.row.quantity,
            }))
    }

    async fn update_dish_status(&self, id: &str, status: &str) -> DownstreamResult<()> {
        self.check_available()?;
        let mut stored = self.dishes.lock();
        let dish = stored
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| DownstreamError::Response(format!("dish not found: {}", id)))?;
        dish.row.status = status.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::{STATUS_PENDING, STATUS_RETURNED};

    fn row(table: &str, name: &str) -> DishRow {
        DishRow {
            order_id: None,
            restaurant_id: "r".into(),
            receipt_no: "1".into(),
            name: name.into(),
            quantity: 1,
            station_id: None,
            table_no: table.into(),
            status: STATUS_PENDING.into(),
            prep_time_minutes: 10,
            urgency_level: "normal".into(),
        }
    }

    #[tokio::test]
    async fn test_find_most_recent_and_update() {
        let store = MemoryOrderStore::new();
        store
            .insert_dishes(vec![row("8", "米饭"), row("8", "米饭"), row("9", "米饭")])
            .await
            .unwrap();

        let found = store
            .find_recent_dish("8", "米饭", &[STATUS_PENDING])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, store.dishes()[1].id);

        store.update_dish_status(&found.id, STATUS_RETURNED).await.unwrap();
        assert_eq!(store.dishes()[1].row.status, STATUS_RETURNED);

        let next = store
            .find_recent_dish("8", "米饭", &[STATUS_PENDING])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.id, store.dishes()[0].id);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryOrderStore::new();
        store.fail_next(1);
        assert!(store.insert_dishes(vec![row("1", "汤")]).await.is_err());
        assert!(store.insert_dishes(vec![row("1", "汤")]).await.is_ok());
        assert_eq!(store.dishes().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_nth_lets_earlier_calls_through() {
        let store = MemoryOrderStore::new();
        store.fail_nth(2);
        assert!(store.insert_dishes(vec![row("1", "汤")]).await.is_ok());
        assert!(store.insert_dishes(vec![row("1", "汤")]).await.is_err());
        assert!(store.insert_dishes(vec![row("1", "汤")]).await.is_ok());
        assert_eq!(store.dishes().len(), 2);
    }
}
