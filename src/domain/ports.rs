use super::merchant::{Merchant, MerchantId};
use super::order::{Order, OrderId, OrderStatus, SettlementOutcome};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Durable keyed storage of orders.
///
/// The store is the single source of truth for order status. All status
/// writes go through [`OrderStore::conditional_update_status`], which must be
/// atomic at the granularity of a single order record: of any number of
/// concurrent attempts against the same order, exactly one may apply.
/// Read methods make no ordering guarantee; callers sort.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: Order) -> Result<()>;
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;
    async fn list_by_merchant(&self, merchant_id: MerchantId) -> Result<Vec<Order>>;
    /// All orders still awaiting settlement, across merchants. Used by the
    /// recovery sweep to re-arm deferred timers after a restart.
    async fn list_pending(&self) -> Result<Vec<Order>>;
    /// Atomically replaces `status` (and `updated_at` in the same write) if
    /// and only if the current status equals `expected`. Returns whether the
    /// update applied; a missing record or failed expectation is `false`,
    /// never an error.
    async fn conditional_update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;
    /// Removes an order. Deleting an absent order is a no-op.
    async fn delete(&self, order_id: OrderId) -> Result<()>;
}

/// Durable keyed storage of merchants, with email as the login key.
#[async_trait]
pub trait MerchantStore: Send + Sync {
    /// Inserts a new merchant. The email must be unused; the check and the
    /// insert are one atomic step, so of two concurrent registrations for
    /// one email at most one can succeed. A taken email is a
    /// `ValidationError`.
    async fn create(&self, merchant: Merchant) -> Result<()>;
    async fn get(&self, merchant_id: MerchantId) -> Result<Option<Merchant>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Merchant>>;
    /// Replaces an existing record keyed by id. The email is not re-checked;
    /// no caller rewrites it.
    async fn update(&self, merchant: Merchant) -> Result<()>;
}

/// Collaborator seam for credential hashing. The engine never inspects the
/// produced string; swapping the algorithm touches nothing but the adapter.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, raw: &str) -> Result<String>;
    /// Constant-time comparison against a stored hash. A malformed stored
    /// value is a mismatch, not an error.
    fn verify(&self, raw: &str, hashed: &str) -> bool;
}

/// Decides the terminal outcome of a deferred settlement attempt.
///
/// The shipped implementation is a weighted random draw standing in for a
/// payment gateway; production replacement means handing the engine a
/// different implementor of this trait.
#[async_trait]
pub trait PaymentOutcomeResolver: Send + Sync {
    async fn resolve(&self, order: &Order) -> SettlementOutcome;
}

/// Shared handles: deferred settlement tasks hold the store across `await`
/// points, so ports are passed as `Arc` trait objects rather than boxes.
pub type OrderStoreArc = Arc<dyn OrderStore>;
pub type MerchantStoreArc = Arc<dyn MerchantStore>;
pub type PasswordHasherArc = Arc<dyn PasswordHasher>;
pub type OutcomeResolverArc = Arc<dyn PaymentOutcomeResolver>;
