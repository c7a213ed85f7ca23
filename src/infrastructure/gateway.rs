use crate::domain::order::{Order, SettlementOutcome};
use crate::domain::ports::PaymentOutcomeResolver;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

/// Weighted random outcome draw, the simulation stand-in for a real payment
/// gateway.
///
/// `paid_ratio` is the probability that a deferred settlement resolves to
/// `paid`; the remainder resolves to `failed`. Out-of-range ratios are
/// clamped to `[0, 1]`; a non-finite ratio falls back to the default rather
/// than poisoning the draw. Seedable for reproducible scenario runs.
pub struct RandomOutcome {
    paid_ratio: f64,
    rng: Mutex<StdRng>,
}

impl RandomOutcome {
    pub const DEFAULT_PAID_RATIO: f64 = 0.8;

    pub fn new(paid_ratio: f64) -> Self {
        Self {
            paid_ratio: Self::sanitize_ratio(paid_ratio),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(paid_ratio: f64, seed: u64) -> Self {
        Self {
            paid_ratio: Self::sanitize_ratio(paid_ratio),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    // clamp propagates NaN, and gen_bool panics on it.
    fn sanitize_ratio(paid_ratio: f64) -> f64 {
        if paid_ratio.is_finite() {
            paid_ratio.clamp(0.0, 1.0)
        } else {
            Self::DEFAULT_PAID_RATIO
        }
    }
}

impl Default for RandomOutcome {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAID_RATIO)
    }
}

#[async_trait]
impl PaymentOutcomeResolver for RandomOutcome {
    async fn resolve(&self, _order: &Order) -> SettlementOutcome {
        let paid = self.rng.lock().await.gen_bool(self.paid_ratio);
        if paid {
            SettlementOutcome::Paid
        } else {
            SettlementOutcome::Failed
        }
    }
}

/// Always resolves to the same outcome. Deterministic replacement for tests
/// and settlement drills.
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcome(pub SettlementOutcome);

#[async_trait]
impl PaymentOutcomeResolver for FixedOutcome {
    async fn resolve(&self, _order: &Order) -> SettlementOutcome {
        self.0
    }
}
