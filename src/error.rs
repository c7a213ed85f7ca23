use crate::domain::merchant::MerchantId;
use crate::domain::order::OrderId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("credential subject {0} does not resolve to a merchant")]
    UnknownSubject(String),
    #[error("order {0} belongs to another merchant")]
    Forbidden(OrderId),
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("merchant {0} not found")]
    MerchantNotFound(MerchantId),
    #[error("validation failed: {0}")]
    ValidationError(String),
    #[error("transient store failure: {0}")]
    TransientStoreError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl PaymentError {
    /// Whether a retry with backoff may succeed where this attempt failed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStoreError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PaymentError::TransientStoreError("store offline".into()).is_transient());
        assert!(!PaymentError::ValidationError("empty items".into()).is_transient());
        assert!(!PaymentError::OrderNotFound(OrderId::new()).is_transient());
    }
}
