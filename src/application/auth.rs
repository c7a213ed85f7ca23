use crate::domain::merchant::{MerchantId, MerchantIdentity};
use crate::domain::ports::MerchantStoreArc;
use crate::error::{PaymentError, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_HEADER: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims carried inside a bearer token. `sub` is the merchant the token was
/// minted for; `exp` is a unix timestamp after which the token is dead.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: MerchantId,
    iat: i64,
    exp: i64,
}

/// Resolves bearer tokens to merchant identities, and mints them.
///
/// Tokens are HMAC-SHA256 signed, three base64url segments joined by dots.
/// The gate is the only place credentials are inspected; services downstream
/// of it take a [`MerchantIdentity`] and trust it.
pub struct AuthGate {
    secret: Vec<u8>,
    token_ttl: Duration,
    merchants: MerchantStoreArc,
}

impl AuthGate {
    pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

    pub fn new(secret: impl Into<Vec<u8>>, merchants: MerchantStoreArc) -> Self {
        Self {
            secret: secret.into(),
            token_ttl: Duration::days(Self::DEFAULT_TOKEN_TTL_DAYS),
            merchants,
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Mints a signed token for a merchant. Does not check that the merchant
    /// exists; registration and login only mint for accounts they just
    /// touched.
    pub fn issue_token(&self, merchant_id: MerchantId) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: merchant_id,
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.token_ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
                .timestamp(),
        };
        let header = URL_SAFE_NO_PAD.encode(TOKEN_HEADER);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims).map_err(|e| PaymentError::InternalError(Box::new(e)))?,
        );
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{header}.{payload}.{signature}"))
    }

    /// Resolves a token to the identity it was minted for.
    ///
    /// A malformed, forged or expired token is [`PaymentError::InvalidCredential`];
    /// a well-signed token whose subject no longer resolves to a merchant is
    /// [`PaymentError::UnknownSubject`].
    pub async fn authenticate(&self, token: &str) -> Result<MerchantIdentity> {
        let claims = self.verify(token)?;
        let merchant = self
            .merchants
            .get(claims.sub)
            .await?
            .ok_or_else(|| PaymentError::UnknownSubject(claims.sub.to_string()))?;
        Ok(merchant.identity())
    }

    fn verify(&self, token: &str) -> Result<Claims> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(invalid("token is not three dot-separated segments"));
        };

        // Signature first; claims are untrusted until it checks out.
        let sig_bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| invalid("signature is not base64url"))?;
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&sig_bytes)
            .map_err(|_| invalid("signature mismatch"))?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| invalid("payload is not base64url"))?;
        let claims: Claims =
            serde_json::from_slice(&payload_bytes).map_err(|_| invalid("unreadable claims"))?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(invalid("token expired"));
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| PaymentError::InternalError(e.to_string().into()))
    }
}

fn invalid(reason: &str) -> PaymentError {
    PaymentError::InvalidCredential(reason.into())
}
