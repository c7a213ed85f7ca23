use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque merchant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MerchantId(Uuid);

impl MerchantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MerchantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A caller identity resolved by the authentication gate.
///
/// Services take this instead of a raw credential: the boundary layer is
/// responsible for calling the gate first, so by the time a service method
/// runs, the merchant behind the request is already known to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerchantIdentity {
    pub merchant_id: MerchantId,
}

/// The label of a payment-method variant, carried on each order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodKind {
    Mobile,
    Card,
    Bank,
}

impl fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Mobile => "mobile",
            Self::Card => "card",
            Self::Bank => "bank",
        };
        f.write_str(label)
    }
}

/// How a merchant collects payment.
///
/// Each variant carries its own required fields, so a half-configured method
/// cannot be represented. Serialized with an internal `type` tag
/// (`{"type":"mobile","provider":...}`) to stay readable in stored records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PaymentMethod {
    Mobile {
        provider: String,
        phone_number: String,
    },
    Card {
        gateway: String,
        merchant_code: String,
    },
    Bank {
        bank_name: String,
        account_number: String,
    },
}

impl PaymentMethod {
    pub fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::Mobile { .. } => PaymentMethodKind::Mobile,
            Self::Card { .. } => PaymentMethodKind::Card,
            Self::Bank { .. } => PaymentMethodKind::Bank,
        }
    }
}

/// A registered merchant account.
///
/// Created at registration, mutated only through the settings surface.
/// `password_hash` is an opaque string produced by the hasher port; the
/// domain never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    /// Fraction of each settled order kept as commission.
    pub commission_rate: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    pub const DEFAULT_COMMISSION_RATE: Decimal = dec!(0.05);

    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MerchantId::new(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            commission_rate: Self::DEFAULT_COMMISSION_RATE,
            payment_method: None,
            created_at,
        }
    }

    pub fn identity(&self) -> MerchantIdentity {
        MerchantIdentity {
            merchant_id: self.id,
        }
    }
}
