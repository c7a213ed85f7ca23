use crate::domain::merchant::{Merchant, MerchantId};
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::ports::{MerchantStore, OrderStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for order records.
pub const CF_ORDERS: &str = "orders";
/// Column Family for merchant records.
pub const CF_MERCHANTS: &str = "merchants";

/// A persistent store implementation using RocksDB.
///
/// Implements both `OrderStore` and `MerchantStore` over separate Column
/// Families. `Clone` shares the underlying `Arc<DB>`.
///
/// RocksDB has no native compare-and-swap, so the conditional status update
/// is a read-modify-write serialized by `write_lock`. Every other mutation
/// takes the same lock: a delete landing between the conditional read and
/// its write-back would be undone by that write-back, resurrecting the
/// order. That keeps the per-record atomicity contract within this process,
/// which is the only writer of the database.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let cf_merchants = ColumnFamilyDescriptor::new(CF_MERCHANTS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders, cf_merchants])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| {
            PaymentError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("serialization error: {e}"),
            )))
        })
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| {
            PaymentError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("deserialization error: {e}"),
            )))
        })
    }

    fn scan_orders(&self, mut keep: impl FnMut(&Order) -> bool) -> Result<Vec<Order>> {
        let cf = self.cf_handle(CF_ORDERS)?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let order: Order = Self::decode(&value)?;
            if keep(&order) {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    fn scan_merchant_by_email(&self, email: &str) -> Result<Option<Merchant>> {
        let cf = self.cf_handle(CF_MERCHANTS)?;
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let merchant: Merchant = Self::decode(&value)?;
            if merchant.email == email {
                return Ok(Some(merchant));
            }
        }
        Ok(None)
    }

    fn put_merchant(&self, merchant: &Merchant) -> Result<()> {
        let cf = self.cf_handle(CF_MERCHANTS)?;
        let key = Self::encode(&merchant.id)?;
        let value = Self::encode(merchant)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for RocksDbStore {
    async fn create(&self, order: Order) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf_handle(CF_ORDERS)?;
        let key = Self::encode(&order.id)?;
        let value = Self::encode(&order)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let cf = self.cf_handle(CF_ORDERS)?;
        let key = Self::encode(&order_id)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_by_merchant(&self, merchant_id: MerchantId) -> Result<Vec<Order>> {
        self.scan_orders(|o| o.merchant_id == merchant_id)
    }

    async fn list_pending(&self) -> Result<Vec<Order>> {
        self.scan_orders(|o| o.status == OrderStatus::Pending)
    }

    async fn conditional_update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let cf = self.cf_handle(CF_ORDERS)?;
        let key = Self::encode(&order_id)?;
        let Some(bytes) = self.db.get_cf(cf, &key)? else {
            return Ok(false);
        };
        let mut order: Order = Self::decode(&bytes)?;
        if order.status != expected {
            return Ok(false);
        }

        order.status = new_status;
        order.updated_at = updated_at;
        self.db.put_cf(cf, key, Self::encode(&order)?)?;
        Ok(true)
    }

    async fn delete(&self, order_id: OrderId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf_handle(CF_ORDERS)?;
        let key = Self::encode(&order_id)?;
        self.db.delete_cf(cf, key)?;
        Ok(())
    }
}

#[async_trait]
impl MerchantStore for RocksDbStore {
    async fn create(&self, merchant: Merchant) -> Result<()> {
        // Email scan and insert under one guard.
        let _guard = self.write_lock.lock().await;
        if self.scan_merchant_by_email(&merchant.email)?.is_some() {
            return Err(PaymentError::ValidationError(format!(
                "email {} is already registered",
                merchant.email
            )));
        }
        self.put_merchant(&merchant)
    }

    async fn get(&self, merchant_id: MerchantId) -> Result<Option<Merchant>> {
        let cf = self.cf_handle(CF_MERCHANTS)?;
        let key = Self::encode(&merchant_id)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Merchant>> {
        self.scan_merchant_by_email(email)
    }

    async fn update(&self, merchant: Merchant) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.put_merchant(&merchant)
    }
}
