use crate::domain::device::Manufacturer;
use crate::token::TokenError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{manufacturer} request failed: {message}")]
    Upstream {
        manufacturer: Manufacturer,
        message: String,
    },
    #[error("{0} request timed out")]
    UpstreamTimeout(Manufacturer),
    #[error("Webhook signature mismatch")]
    InvalidSignature,
    #[error("Insufficient agent credit: requested {requested}, available {available}")]
    InsufficientCredit {
        requested: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl PaymentError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        Self::StorageError(err.into_string())
    }
}
