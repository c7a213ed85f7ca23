use crate::application::auth::AuthGate;
use crate::domain::merchant::{Merchant, MerchantIdentity, PaymentMethod};
use crate::domain::ports::{MerchantStoreArc, PasswordHasherArc};
use crate::error::{PaymentError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// A successful registration or login: the account plus a fresh token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub merchant: Merchant,
    pub token: String,
}

/// Merchant account lifecycle: registration, login, profile and settings.
pub struct MerchantRegistry {
    merchants: MerchantStoreArc,
    hasher: PasswordHasherArc,
    gate: Arc<AuthGate>,
}

impl MerchantRegistry {
    pub fn new(
        merchants: MerchantStoreArc,
        hasher: PasswordHasherArc,
        gate: Arc<AuthGate>,
    ) -> Self {
        Self {
            merchants,
            hasher,
            gate,
        }
    }

    /// Creates an account. The email is the login key and must be unused;
    /// the store's create is the atomic authority on that, so two racing
    /// registrations of one email cannot both succeed.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthSession> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(PaymentError::ValidationError(
                "name, email and password are required".into(),
            ));
        }

        let merchant = Merchant::new(name, email, self.hasher.hash(password)?, Utc::now());
        self.merchants.create(merchant.clone()).await?;
        info!(merchant_id = %merchant.id, "merchant registered");

        let token = self.gate.issue_token(merchant.id)?;
        Ok(AuthSession { merchant, token })
    }

    /// Verifies credentials and mints a fresh token.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let merchant = self
            .merchants
            .find_by_email(email)
            .await?
            .filter(|m| self.hasher.verify(password, &m.password_hash))
            .ok_or_else(|| PaymentError::InvalidCredential("bad email or password".into()))?;

        let token = self.gate.issue_token(merchant.id)?;
        Ok(AuthSession { merchant, token })
    }

    pub async fn profile(&self, identity: MerchantIdentity) -> Result<Merchant> {
        self.merchants
            .get(identity.merchant_id)
            .await?
            .ok_or(PaymentError::MerchantNotFound(identity.merchant_id))
    }

    /// Replaces the merchant's payout configuration.
    pub async fn update_payment_method(
        &self,
        identity: MerchantIdentity,
        method: PaymentMethod,
    ) -> Result<Merchant> {
        let kind = method.kind();
        let mut merchant = self.profile(identity).await?;
        merchant.payment_method = Some(method);
        self.merchants.update(merchant.clone()).await?;
        info!(merchant_id = %merchant.id, method = %kind, "payment method updated");
        Ok(merchant)
    }
}
