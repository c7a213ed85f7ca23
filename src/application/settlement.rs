use crate::domain::order::{OrderId, OrderStatus, SettlementOutcome};
use crate::domain::ports::{OrderStoreArc, OutcomeResolverArc};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Tuning knobs for the settlement engine.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// How long after creation the deferred settlement fires.
    pub settle_delay: Duration,
    /// Extra attempts after the first when a deferred settlement hits a
    /// transient store failure. Manual confirmations never retry; the caller
    /// sees the error and can simply confirm again.
    pub retry_attempts: u32,
    /// Backoff before the first retry; doubles on each subsequent one.
    pub retry_base_delay: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

/// What a settlement trigger learns about the order it tried to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementAck {
    pub order_id: OrderId,
    /// The order's status after the attempt, whether or not this attempt set
    /// it.
    pub status: OrderStatus,
    /// `true` only for the trigger that performed the transition.
    pub newly_settled: bool,
}

/// Serializes status transitions onto the store's conditional write.
///
/// Any number of triggers may race for the same order: deferred timers,
/// explicit confirmations, re-armed recovery sweeps. The compare-and-swap in
/// the store picks exactly one winner; every other trigger observes the
/// terminal status and acknowledges success with `newly_settled: false`.
/// An order that has reached `paid` or `failed` never changes again.
pub struct SettlementEngine {
    orders: OrderStoreArc,
    resolver: OutcomeResolverArc,
    config: SettlementConfig,
}

impl SettlementEngine {
    pub fn new(
        orders: OrderStoreArc,
        resolver: OutcomeResolverArc,
        config: SettlementConfig,
    ) -> Self {
        Self {
            orders,
            resolver,
            config,
        }
    }

    /// The deferred-settlement deadline for an order created at `now`.
    pub fn deadline_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.config.settle_delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Drives one settlement attempt to a terminal acknowledgement.
    ///
    /// Single pass: the order is re-read, an already-terminal status
    /// short-circuits, and a lost compare-and-swap is reported as the
    /// winner's status. Store failures surface to the caller; only the
    /// deferred pathway wraps this in a retry budget.
    pub async fn settle(
        &self,
        order_id: OrderId,
        outcome: SettlementOutcome,
    ) -> Result<SettlementAck> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        if order.status.is_terminal() {
            return Ok(SettlementAck {
                order_id,
                status: order.status,
                newly_settled: false,
            });
        }

        let new_status = outcome.status();
        let applied = self
            .orders
            .conditional_update_status(order_id, OrderStatus::Pending, new_status, Utc::now())
            .await?;
        if applied {
            info!(%order_id, status = %new_status, "order settled");
            return Ok(SettlementAck {
                order_id,
                status: new_status,
                newly_settled: true,
            });
        }

        // Lost the swap: another trigger settled in between. Terminal status
        // is final, so this re-read is stable.
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        Ok(SettlementAck {
            order_id,
            status: order.status,
            newly_settled: false,
        })
    }

    /// Settlement by explicit confirmation: always requests `paid`. The swap
    /// decides whether this trigger or an earlier one set the status.
    pub async fn confirm(&self, order_id: OrderId) -> Result<SettlementAck> {
        self.settle(order_id, SettlementOutcome::Paid).await
    }

    /// Arms the deferred settlement timer for one order.
    pub fn schedule(self: &Arc<Self>, order_id: OrderId, due_at: DateTime<Utc>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_deferred(order_id, due_at).await;
        })
    }

    /// Body of the deferred settlement task: sleep out the deadline, then
    /// drive one attempt through the retry budget. Transient store failures
    /// back off and retry; once the budget is spent the failure is logged and
    /// dropped, leaving the order pending until a manual confirmation or the
    /// next recovery sweep.
    async fn run_deferred(&self, order_id: OrderId, due_at: DateTime<Utc>) {
        let remaining = (due_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }

        let mut delay = self.config.retry_base_delay;
        let mut attempt = 0;
        loop {
            match self.deferred_attempt(order_id).await {
                Ok(()) => return,
                Err(e) if e.is_transient() && attempt < self.config.retry_attempts => {
                    attempt += 1;
                    warn!(%order_id, error = %e, attempt, "transient deferred settlement failure, backing off");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    warn!(%order_id, error = %e, "deferred settlement dropped");
                    return;
                }
            }
        }
    }

    /// One deferred attempt: read the order, draw an outcome if it is still
    /// pending, settle. A missing or already-terminal order ends the task
    /// quietly, which is what makes deletion cancel the timer.
    async fn deferred_attempt(&self, order_id: OrderId) -> Result<()> {
        let Some(order) = self.orders.get(order_id).await? else {
            debug!(%order_id, "order gone before deferred settlement");
            return Ok(());
        };
        if order.status.is_terminal() {
            debug!(%order_id, status = %order.status, "settled before the timer fired");
            return Ok(());
        }

        let outcome = self.resolver.resolve(&order).await;
        match self.settle(order_id, outcome).await {
            Ok(ack) if ack.newly_settled => {
                debug!(%order_id, status = %ack.status, "deferred settlement applied");
                Ok(())
            }
            Ok(ack) => {
                debug!(%order_id, status = %ack.status, "deferred settlement lost the race");
                Ok(())
            }
            Err(PaymentError::OrderNotFound(_)) => {
                debug!(%order_id, "order gone during deferred settlement");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Re-arms deferred settlement for every order still pending in the
    /// store. Run once at startup; overdue orders fire immediately.
    pub async fn recover_pending(self: &Arc<Self>) -> Result<Vec<JoinHandle<()>>> {
        let pending = self.orders.list_pending().await?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        info!(count = pending.len(), "re-arming deferred settlement");
        let handles = pending
            .into_iter()
            .map(|order| self.schedule(order.id, order.settle_due_at))
            .collect();
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::merchant::{MerchantId, PaymentMethodKind};
    use crate::domain::order::{LineItem, Order, OrderDraft};
    use crate::domain::ports::OrderStore;
    use crate::infrastructure::gateway::FixedOutcome;
    use crate::infrastructure::in_memory::InMemoryOrderStore;
    use rust_decimal_macros::dec;

    fn fast_config() -> SettlementConfig {
        SettlementConfig {
            settle_delay: Duration::from_millis(50),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(10),
        }
    }

    fn engine_with(
        store: &InMemoryOrderStore,
        outcome: SettlementOutcome,
        config: SettlementConfig,
    ) -> Arc<SettlementEngine> {
        Arc::new(SettlementEngine::new(
            Arc::new(store.clone()),
            Arc::new(FixedOutcome(outcome)),
            config,
        ))
    }

    async fn pending_order(store: &InMemoryOrderStore, due_at: DateTime<Utc>) -> Order {
        let draft = OrderDraft {
            customer_name: "John Doe".into(),
            customer_phone: "255712345678".into(),
            items: vec![LineItem {
                name: "Mug".into(),
                quantity: 2,
                price: dec!(8000),
            }],
            payment_method: PaymentMethodKind::Mobile,
            total: None,
        };
        let order = Order::from_draft(MerchantId::new(), draft, Utc::now(), due_at).unwrap();
        store.create(order.clone()).await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_settle_transitions_pending_order() {
        let store = InMemoryOrderStore::new();
        let engine = engine_with(&store, SettlementOutcome::Paid, fast_config());
        let order = pending_order(&store, Utc::now()).await;

        let ack = engine
            .settle(order.id, SettlementOutcome::Failed)
            .await
            .unwrap();
        assert_eq!(ack.status, OrderStatus::Failed);
        assert!(ack.newly_settled);

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert!(stored.updated_at > stored.created_at);
    }

    #[tokio::test]
    async fn test_second_trigger_acks_first_outcome() {
        let store = InMemoryOrderStore::new();
        let engine = engine_with(&store, SettlementOutcome::Paid, fast_config());
        let order = pending_order(&store, Utc::now()).await;

        let first = engine
            .settle(order.id, SettlementOutcome::Failed)
            .await
            .unwrap();
        assert!(first.newly_settled);
        let settled_at = store.get(order.id).await.unwrap().unwrap().updated_at;

        // A later confirmation is a success, reports what actually happened,
        // and does not touch the record.
        let second = engine.confirm(order.id).await.unwrap();
        assert_eq!(second.status, OrderStatus::Failed);
        assert!(!second.newly_settled);
        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert_eq!(stored.updated_at, settled_at);
    }

    #[tokio::test]
    async fn test_concurrent_triggers_settle_exactly_once() {
        let store = InMemoryOrderStore::new();
        let engine = engine_with(&store, SettlementOutcome::Paid, fast_config());
        let order = pending_order(&store, Utc::now()).await;

        let mut tasks = Vec::new();
        for i in 0..16 {
            let engine = Arc::clone(&engine);
            let outcome = if i % 2 == 0 {
                SettlementOutcome::Paid
            } else {
                SettlementOutcome::Failed
            };
            tasks.push(tokio::spawn(
                async move { engine.settle(order.id, outcome).await },
            ));
        }

        let mut winners = 0;
        let mut statuses = Vec::new();
        for task in tasks {
            let ack = task.await.unwrap().unwrap();
            if ack.newly_settled {
                winners += 1;
            }
            statuses.push(ack.status);
        }

        assert_eq!(winners, 1);
        let final_status = store.get(order.id).await.unwrap().unwrap().status;
        assert!(final_status.is_terminal());
        // Every ack reports the status the winner wrote.
        assert!(statuses.iter().all(|s| *s == final_status));
    }

    #[tokio::test]
    async fn test_settle_unknown_order() {
        let store = InMemoryOrderStore::new();
        let engine = engine_with(&store, SettlementOutcome::Paid, fast_config());

        let result = engine.settle(OrderId::new(), SettlementOutcome::Paid).await;
        assert!(matches!(result, Err(PaymentError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_deferred_settlement_fires_after_delay() {
        let store = InMemoryOrderStore::new();
        let mut config = fast_config();
        config.settle_delay = Duration::from_millis(200);
        let engine = engine_with(&store, SettlementOutcome::Paid, config);
        let due_at = engine.deadline_after(Utc::now());
        let order = pending_order(&store, due_at).await;

        let handle = engine.schedule(order.id, order.settle_due_at);

        // Not yet due.
        let early = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(early.status, OrderStatus::Pending);

        handle.await.unwrap();
        let settled = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(settled.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_confirmation_beats_timer() {
        let store = InMemoryOrderStore::new();
        // The timer would settle to failed; confirmation must win and stick.
        let mut config = fast_config();
        config.settle_delay = Duration::from_millis(150);
        let engine = engine_with(&store, SettlementOutcome::Failed, config);
        let order = pending_order(&store, engine.deadline_after(Utc::now())).await;

        let handle = engine.schedule(order.id, order.settle_due_at);
        let ack = engine.confirm(order.id).await.unwrap();
        assert_eq!(ack.status, OrderStatus::Paid);
        assert!(ack.newly_settled);

        handle.await.unwrap();
        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_timer_for_missing_order_is_quiet() {
        let store = InMemoryOrderStore::new();
        let engine = engine_with(&store, SettlementOutcome::Paid, fast_config());

        let handle = engine.schedule(OrderId::new(), Utc::now());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_deleting_order_cancels_its_timer() {
        let store = InMemoryOrderStore::new();
        let mut config = fast_config();
        config.settle_delay = Duration::from_millis(100);
        let engine = engine_with(&store, SettlementOutcome::Paid, config);
        let order = pending_order(&store, engine.deadline_after(Utc::now())).await;

        let handle = engine.schedule(order.id, order.settle_due_at);
        store.delete(order.id).await.unwrap();

        // The timer finds nothing to settle and must not resurrect the order.
        handle.await.unwrap();
        assert!(store.get(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recover_pending_rearms_overdue_orders() {
        let store = InMemoryOrderStore::new();
        let engine = engine_with(&store, SettlementOutcome::Paid, fast_config());

        // Three orders whose deadline passed while the process was down; one
        // of them already settled.
        let overdue = Utc::now() - chrono::Duration::seconds(30);
        let a = pending_order(&store, overdue).await;
        let b = pending_order(&store, overdue).await;
        let c = pending_order(&store, overdue).await;
        engine
            .settle(c.id, SettlementOutcome::Failed)
            .await
            .unwrap();

        let handles = engine.recover_pending().await.unwrap();
        assert_eq!(handles.len(), 2);
        for handle in handles {
            handle.await.unwrap();
        }

        for id in [a.id, b.id] {
            let stored = store.get(id).await.unwrap().unwrap();
            assert_eq!(stored.status, OrderStatus::Paid);
        }
        let untouched = store.get(c.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_recover_with_nothing_pending() {
        let store = InMemoryOrderStore::new();
        let engine = engine_with(&store, SettlementOutcome::Paid, fast_config());
        let order = pending_order(&store, Utc::now()).await;
        engine.settle(order.id, SettlementOutcome::Paid).await.unwrap();

        let handles = engine.recover_pending().await.unwrap();
        assert!(handles.is_empty());
    }

    #[test]
    fn test_deadline_after_applies_delay() {
        let store = InMemoryOrderStore::new();
        let engine = SettlementEngine::new(
            Arc::new(store),
            Arc::new(FixedOutcome(SettlementOutcome::Paid)),
            SettlementConfig::default(),
        );
        let now = Utc::now();
        let due = engine.deadline_after(now);
        assert_eq!(due - now, chrono::Duration::seconds(5));
    }
}
