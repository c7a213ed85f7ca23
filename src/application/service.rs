use crate::application::settlement::{SettlementAck, SettlementEngine};
use crate::domain::merchant::MerchantIdentity;
use crate::domain::order::{Order, OrderDraft, OrderId};
use crate::domain::ports::OrderStoreArc;
use crate::error::{PaymentError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Merchant-facing order operations.
///
/// Every call runs on behalf of an authenticated identity and only ever sees
/// that merchant's orders; touching a foreign order is
/// [`PaymentError::Forbidden`].
pub struct OrderService {
    orders: OrderStoreArc,
    engine: Arc<SettlementEngine>,
}

impl OrderService {
    pub fn new(orders: OrderStoreArc, engine: Arc<SettlementEngine>) -> Self {
        Self { orders, engine }
    }

    /// Validates and persists a draft, then arms its deferred settlement.
    ///
    /// The stored total is recomputed from the line items; whatever total the
    /// client sent is discarded.
    pub async fn create_order(
        &self,
        identity: MerchantIdentity,
        draft: OrderDraft,
    ) -> Result<Order> {
        let now = Utc::now();
        let due_at = self.engine.deadline_after(now);
        let order = Order::from_draft(identity.merchant_id, draft, now, due_at)?;
        self.orders.create(order.clone()).await?;
        self.engine.schedule(order.id, order.settle_due_at);
        info!(
            order_id = %order.id,
            merchant_id = %order.merchant_id,
            total = %order.total,
            "order created"
        );
        Ok(order)
    }

    /// The caller's orders, newest first.
    pub async fn list_orders(&self, identity: MerchantIdentity) -> Result<Vec<Order>> {
        let mut orders = self.orders.list_by_merchant(identity.merchant_id).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// A single order, if the caller owns it.
    pub async fn get_order(&self, identity: MerchantIdentity, order_id: OrderId) -> Result<Order> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        if order.merchant_id != identity.merchant_id {
            return Err(PaymentError::Forbidden(order_id));
        }
        Ok(order)
    }

    /// Marks an order paid on explicit merchant confirmation.
    ///
    /// Confirming an order that already settled is a success; the ack carries
    /// the settled status either way.
    pub async fn confirm_payment(
        &self,
        identity: MerchantIdentity,
        order_id: OrderId,
    ) -> Result<SettlementAck> {
        // Ownership check first: a foreign order is Forbidden even when it
        // has already settled.
        self.get_order(identity, order_id).await?;
        self.engine.confirm(order_id).await
    }
}
