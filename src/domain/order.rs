use crate::domain::merchant::{MerchantId, PaymentMethodKind};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Payment status of an order.
///
/// The only legal transitions are `Pending -> Paid` and `Pending -> Failed`;
/// both terminal states are final. The settlement engine is the sole writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Terminal outcome requested by a settlement trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Paid,
    Failed,
}

impl SettlementOutcome {
    pub fn status(self) -> OrderStatus {
        match self {
            Self::Paid => OrderStatus::Paid,
            Self::Failed => OrderStatus::Failed,
        }
    }
}

/// A single ordered line item. `price` is the unit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A client-supplied order draft, not yet validated or priced.
///
/// The `total` field is advisory: the service recomputes the total from the
/// line items and overwrites whatever the client sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub customer_name: String,
    pub customer_phone: String,
    pub items: Vec<LineItem>,
    pub payment_method: PaymentMethodKind,
    #[serde(default)]
    pub total: Option<Decimal>,
}

impl OrderDraft {
    /// Checks draft shape: at least one item, named items, quantity >= 1,
    /// unit price >= 0.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(PaymentError::ValidationError(
                "order has no line items".into(),
            ));
        }
        for item in &self.items {
            if item.name.trim().is_empty() {
                return Err(PaymentError::ValidationError(
                    "line item name is empty".into(),
                ));
            }
            if item.quantity < 1 {
                return Err(PaymentError::ValidationError(format!(
                    "line item '{}' has zero quantity",
                    item.name
                )));
            }
            if item.price < Decimal::ZERO {
                return Err(PaymentError::ValidationError(format!(
                    "line item '{}' has a negative price",
                    item.name
                )));
            }
        }
        Ok(())
    }

    /// Server-side total: the sum of line-item subtotals.
    pub fn computed_total(&self) -> Decimal {
        self.items.iter().map(LineItem::subtotal).sum()
    }
}

/// An order owned by exactly one merchant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub merchant_id: MerchantId,
    pub customer_name: String,
    pub customer_phone: String,
    pub items: Vec<LineItem>,
    /// Always equals the sum of line-item subtotals; established at creation.
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethodKind,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful status transition, and only then.
    pub updated_at: DateTime<Utc>,
    /// Deadline of the deferred automatic settlement. Persisted so a restart
    /// can re-arm timers for orders that are still pending.
    pub settle_due_at: DateTime<Utc>,
}

impl Order {
    /// Builds a pending order from a validated draft, recomputing the total.
    pub fn from_draft(
        merchant_id: MerchantId,
        draft: OrderDraft,
        created_at: DateTime<Utc>,
        settle_due_at: DateTime<Utc>,
    ) -> Result<Self> {
        draft.validate()?;
        let total = draft.computed_total();
        Ok(Self {
            id: OrderId::new(),
            merchant_id,
            customer_name: draft.customer_name,
            customer_phone: draft.customer_phone,
            items: draft.items,
            total,
            status: OrderStatus::Pending,
            payment_method: draft.payment_method,
            created_at,
            updated_at: created_at,
            settle_due_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(items: Vec<LineItem>) -> OrderDraft {
        OrderDraft {
            customer_name: "John Doe".into(),
            customer_phone: "255712345678".into(),
            items,
            payment_method: PaymentMethodKind::Mobile,
            total: None,
        }
    }

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let draft = draft(vec![
            LineItem {
                name: "Mug".into(),
                quantity: 2,
                price: dec!(8000),
            },
            LineItem {
                name: "Phone Case".into(),
                quantity: 1,
                price: dec!(15000),
            },
        ]);
        assert_eq!(draft.computed_total(), dec!(31000));
    }

    #[test]
    fn test_from_draft_ignores_client_total() {
        let mut d = draft(vec![LineItem {
            name: "Mug".into(),
            quantity: 2,
            price: dec!(8000),
        }]);
        d.total = Some(dec!(1));

        let now = Utc::now();
        let order = Order::from_draft(MerchantId::new(), d, now, now).unwrap();
        assert_eq!(order.total, dec!(16000));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.updated_at, order.created_at);
    }

    #[test]
    fn test_validate_rejects_empty_items() {
        let d = draft(vec![]);
        assert!(matches!(
            d.validate(),
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let d = draft(vec![LineItem {
            name: "Mug".into(),
            quantity: 0,
            price: dec!(8000),
        }]);
        assert!(matches!(
            d.validate(),
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let d = draft(vec![LineItem {
            name: "Mug".into(),
            quantity: 1,
            price: dec!(-1),
        }]);
        assert!(matches!(
            d.validate(),
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_accepts_free_item() {
        let d = draft(vec![LineItem {
            name: "Sticker".into(),
            quantity: 1,
            price: dec!(0),
        }]);
        assert!(d.validate().is_ok());
        assert_eq!(d.computed_total(), dec!(0));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
    }

    #[test]
    fn test_outcome_maps_to_status() {
        assert_eq!(SettlementOutcome::Paid.status(), OrderStatus::Paid);
        assert_eq!(SettlementOutcome::Failed.status(), OrderStatus::Failed);
    }
}
