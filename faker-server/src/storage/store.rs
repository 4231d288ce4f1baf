//! redb-based durable receipt storage

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::receipt::Receipt;

/// Receipts table: key = receipt id, value = JSON (without raw bytes)
const RECEIPTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("receipts");

/// Raw print job bytes: key = receipt id
const RAW_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("receipt_raw");

/// Index: (created_at millis, receipt id) -> ()
const BY_CREATED_TABLE: TableDefinition<(i64, &str), ()> =
    TableDefinition::new("receipts_by_created");

/// Index: (receipt_no, receipt id) -> ()
const BY_NUMBER_TABLE: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("receipts_by_number");

/// Index: receipt id -> created_at, for receipts not yet delivered downstream
const UNSYNCED_TABLE: TableDefinition<&str, i64> = TableDefinition::new("receipts_unsynced");

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum ReceiptStoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Receipt not found: {0}")]
    NotFound(String),
}

pub type ReceiptStoreResult<T> = Result<T, ReceiptStoreError>;

/// Store totals for the reporting layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u64,
    pub unsynced: u64,
}

/// Durable receipt storage
#[derive(Clone)]
pub struct ReceiptStore {
    db: Arc<Database>,
}

impl ReceiptStore {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> ReceiptStoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> ReceiptStoreResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> ReceiptStoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECEIPTS_TABLE)?;
            let _ = write_txn.open_table(RAW_TABLE)?;
            let _ = write_txn.open_table(BY_CREATED_TABLE)?;
            let _ = write_txn.open_table(BY_NUMBER_TABLE)?;
            let _ = write_txn.open_table(UNSYNCED_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Store a receipt with its raw bytes and indexes
    pub fn save(&self, receipt: &Receipt) -> ReceiptStoreResult<()> {
        let value = serde_json::to_vec(receipt)?;
        let id = receipt.id.as_str();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RECEIPTS_TABLE)?;
            table.insert(id, value.as_slice())?;

            let mut raw = write_txn.open_table(RAW_TABLE)?;
            raw.insert(id, receipt.raw.as_slice())?;

            let mut by_created = write_txn.open_table(BY_CREATED_TABLE)?;
            by_created.insert((receipt.created_at, id), ())?;

            if !receipt.receipt_no.is_empty() {
                let mut by_number = write_txn.open_table(BY_NUMBER_TABLE)?;
                by_number.insert((receipt.receipt_no.as_str(), id), ())?;
            }

            let mut unsynced = write_txn.open_table(UNSYNCED_TABLE)?;
            if receipt.synced {
                unsynced.remove(id)?;
            } else {
                unsynced.insert(id, receipt.created_at)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a receipt by ID, including raw bytes
    pub fn get(&self, id: &str) -> ReceiptStoreResult<Option<Receipt>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECEIPTS_TABLE)?;

        let Some(guard) = table.get(id)? else {
            return Ok(None);
        };
        let mut receipt: Receipt = serde_json::from_slice(guard.value())?;

        let raw = read_txn.open_table(RAW_TABLE)?;
        if let Some(bytes) = raw.get(id)? {
            receipt.raw = bytes.value().to_vec();
        }
        Ok(Some(receipt))
    }

    /// Most recent receipts, newest first (without raw bytes)
    pub fn recent(&self, limit: usize) -> ReceiptStoreResult<Vec<Receipt>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(BY_CREATED_TABLE)?;
        let table = read_txn.open_table(RECEIPTS_TABLE)?;

        let mut receipts = Vec::new();
        for result in index.iter()?.rev().take(limit) {
            let (key, _) = result?;
            let (_, id) = key.value();
            if let Some(guard) = table.get(id)? {
                receipts.push(serde_json::from_slice(guard.value())?);
            }
        }
        Ok(receipts)
    }

    /// All receipts printed with the given receipt number, oldest first
    pub fn find_by_number(&self, receipt_no: &str) -> ReceiptStoreResult<Vec<Receipt>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(BY_NUMBER_TABLE)?;
        let table = read_txn.open_table(RECEIPTS_TABLE)?;

        let range_start: (&str, &str) = (receipt_no, "");
        let range_end: (&str, &str) = (receipt_no, "\u{ffff}");

        let mut receipts: Vec<Receipt> = Vec::new();
        for result in index.range(range_start..=range_end)? {
            let (key, _) = result?;
            let (_, id) = key.value();
            if let Some(guard) = table.get(id)? {
                receipts.push(serde_json::from_slice(guard.value())?);
            }
        }

        receipts.sort_by_key(|r| r.created_at);
        Ok(receipts)
    }

    /// Receipts not yet delivered downstream, oldest first
    pub fn unsynced(&self, limit: usize) -> ReceiptStoreResult<Vec<Receipt>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(UNSYNCED_TABLE)?;
        let table = read_txn.open_table(RECEIPTS_TABLE)?;

        let mut receipts: Vec<Receipt> = Vec::new();
        for result in index.iter()? {
            let (key, _) = result?;
            if let Some(guard) = table.get(key.value())? {
                receipts.push(serde_json::from_slice(guard.value())?);
            }
        }

        receipts.sort_by_key(|r| r.created_at);
        receipts.truncate(limit);
        Ok(receipts)
    }

    /// Set the synced flag
    pub fn mark_synced(&self, id: &str) -> ReceiptStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RECEIPTS_TABLE)?;

            // Read first
            let bytes = {
                let value = table
                    .get(id)?
                    .ok_or_else(|| ReceiptStoreError::NotFound(id.to_string()))?;
                value.value().to_vec()
            };

            let mut receipt: Receipt = serde_json::from_slice(&bytes)?;
            receipt.synced = true;
            let new_value = serde_json::to_vec(&receipt)?;
            table.insert(id, new_value.as_slice())?;

            let mut unsynced = write_txn.open_table(UNSYNCED_TABLE)?;
            unsynced.remove(id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete receipts created more than `days` days ago; returns the number removed
    pub fn cleanup_older_than(&self, days: i64) -> ReceiptStoreResult<usize> {
        let cutoff = chrono::Utc::now().timestamp_millis() - days * MILLIS_PER_DAY;
        self.cleanup_before(cutoff)
    }

    /// Delete receipts with `created_at` before `cutoff` (Unix millis)
    pub fn cleanup_before(&self, cutoff: i64) -> ReceiptStoreResult<usize> {
        let write_txn = self.db.begin_write()?;
        let removed;
        {
            let mut by_created = write_txn.open_table(BY_CREATED_TABLE)?;
            let mut table = write_txn.open_table(RECEIPTS_TABLE)?;
            let mut raw = write_txn.open_table(RAW_TABLE)?;
            let mut by_number = write_txn.open_table(BY_NUMBER_TABLE)?;
            let mut unsynced = write_txn.open_table(UNSYNCED_TABLE)?;

            // Collect keys to delete
            let mut expired = Vec::new();
            for result in by_created.range((i64::MIN, "")..(cutoff, ""))? {
                let (key, _) = result?;
                let (created_at, id) = key.value();
                expired.push((created_at, id.to_string()));
            }

            for (created_at, id) in &expired {
                let receipt_no = match table.remove(id.as_str())? {
                    Some(guard) => serde_json::from_slice::<Receipt>(guard.value())
                        .map(|r| r.receipt_no)
                        .unwrap_or_default(),
                    None => String::new(),
                };
                if !receipt_no.is_empty() {
                    by_number.remove((receipt_no.as_str(), id.as_str()))?;
                }
                raw.remove(id.as_str())?;
                unsynced.remove(id.as_str())?;
                by_created.remove((*created_at, id.as_str()))?;
            }
            removed = expired.len();
        }
        write_txn.commit()?;
        Ok(removed)
    }

    pub fn stats(&self) -> ReceiptStoreResult<StoreStats> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECEIPTS_TABLE)?;
        let unsynced = read_txn.open_table(UNSYNCED_TABLE)?;
        Ok(StoreStats {
            total: table.len()?,
            unsynced: unsynced.len()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(no: &str, created_at: i64) -> Receipt {
        let mut r = Receipt::new(
            no.into(),
            "2024-05-01 12:00:00".into(),
            format!("单号: {}", no),
            vec![0x1B, 0x40, b'A'],
            "127.0.0.1:5000".into(),
        );
        r.created_at = created_at;
        r
    }

    #[test]
    fn test_save_and_get_with_raw() {
        let store = ReceiptStore::open_in_memory().unwrap();
        let r = receipt("1001", 1_000);
        store.save(&r).unwrap();

        let loaded = store.get(&r.id).unwrap().unwrap();
        assert_eq!(loaded, r);
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_recent_newest_first() {
        let store = ReceiptStore::open_in_memory().unwrap();
        for (i, no) in ["1", "2", "3"].iter().enumerate() {
            store.save(&receipt(no, i as i64 * 10)).unwrap();
        }

        let recent = store.recent(2).unwrap();
        let numbers: Vec<_> = recent.iter().map(|r| r.receipt_no.as_str()).collect();
        assert_eq!(numbers, vec!["3", "2"]);
        assert!(recent[0].raw.is_empty());
    }

    #[test]
    fn test_find_by_number_and_empty_numbers() {
        let store = ReceiptStore::open_in_memory().unwrap();
        store.save(&receipt("42", 2)).unwrap();
        store.save(&receipt("42", 1)).unwrap();
        store.save(&receipt("", 3)).unwrap();

        let found = store.find_by_number("42").unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].created_at < found[1].created_at);
        assert!(store.find_by_number("").unwrap().is_empty());
    }

    #[test]
    fn test_mark_synced() {
        let store = ReceiptStore::open_in_memory().unwrap();
        let a = receipt("1", 1);
        let b = receipt("2", 2);
        store.save(&a).unwrap();
        store.save(&b).unwrap();
        assert_eq!(store.stats().unwrap(), StoreStats { total: 2, unsynced: 2 });

        store.mark_synced(&a.id).unwrap();
        let unsynced = store.unsynced(10).unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id, b.id);
        assert!(store.get(&a.id).unwrap().unwrap().synced);
        assert!(matches!(
            store.mark_synced("missing"),
            Err(ReceiptStoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_cleanup_removes_old_records() {
        let store = ReceiptStore::open_in_memory().unwrap();
        let now = chrono::Utc::now().timestamp_millis();
        let old = receipt("7", now - 31 * MILLIS_PER_DAY);
        let fresh = receipt("7", now);
        store.save(&old).unwrap();
        store.save(&fresh).unwrap();

        assert_eq!(store.cleanup_older_than(30).unwrap(), 1);
        assert!(store.get(&old.id).unwrap().is_none());
        assert!(store.get(&fresh.id).unwrap().is_some());
        assert_eq!(store.find_by_number("7").unwrap().len(), 1);
        assert_eq!(store.stats().unwrap(), StoreStats { total: 1, unsynced: 1 });
    }
}
