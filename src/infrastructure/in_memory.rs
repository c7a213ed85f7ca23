use crate::domain::merchant::{Merchant, MerchantId};
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::ports::{MerchantStore, OrderStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory order store.
///
/// Uses `Arc<RwLock<HashMap<OrderId, Order>>>` for shared concurrent access.
/// The conditional status update runs entirely under the write lock, which
/// makes it atomic per record: concurrent settlement attempts against the
/// same order serialize here, and exactly one can observe `pending`.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn list_by_merchant(&self, merchant_id: MerchantId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.merchant_id == merchant_id)
            .cloned()
            .collect())
    }

    async fn list_pending(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending)
            .cloned()
            .collect())
    }

    async fn conditional_update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order_id) {
            Some(order) if order.status == expected => {
                order.status = new_status;
                order.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, order_id: OrderId) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.remove(&order_id);
        Ok(())
    }
}

/// A thread-safe in-memory merchant store.
///
/// `find_by_email` scans values; merchant counts are small enough that an
/// email index would be premature. `create` checks the email against the
/// same scan while holding the write lock, which is what the uniqueness
/// contract of the port requires.
#[derive(Default, Clone)]
pub struct InMemoryMerchantStore {
    merchants: Arc<RwLock<HashMap<MerchantId, Merchant>>>,
}

impl InMemoryMerchantStore {
    /// Creates a new, empty in-memory merchant store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MerchantStore for InMemoryMerchantStore {
    async fn create(&self, merchant: Merchant) -> Result<()> {
        let mut merchants = self.merchants.write().await;
        // Uniqueness check and insert under one write guard.
        if merchants.values().any(|m| m.email == merchant.email) {
            return Err(PaymentError::ValidationError(format!(
                "email {} is already registered",
                merchant.email
            )));
        }
        merchants.insert(merchant.id, merchant);
        Ok(())
    }

    async fn get(&self, merchant_id: MerchantId) -> Result<Option<Merchant>> {
        let merchants = self.merchants.read().await;
        Ok(merchants.get(&merchant_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Merchant>> {
        let merchants = self.merchants.read().await;
        Ok(merchants.values().find(|m| m.email == email).cloned())
    }

    async fn update(&self, merchant: Merchant) -> Result<()> {
        let mut merchants = self.merchants.write().await;
        merchants.insert(merchant.id, merchant);
        Ok(())
    }
}
