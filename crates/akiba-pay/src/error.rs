//! Error types for transaction submission

use thiserror::Error;

use akiba_auth::AuthError;

/// Result type alias for payment operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Rejections returned by the payment/transfer API, surfaced as-is
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentRejection {
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("PIN token expired")]
    TokenExpired,

    #[error("Daily limit exceeded")]
    DailyLimitExceeded,

    #[error("Cannot transfer to yourself")]
    SelfTransferNotAllowed,

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Payment rejected ({code}): {message}")]
    Other { code: String, message: String },
}

impl PaymentRejection {
    /// Classify a gateway rejection code
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "INSUFFICIENT_FUNDS" => PaymentRejection::InsufficientFunds,
            "TOKEN_EXPIRED" | "INVALID_PIN_TOKEN" => PaymentRejection::TokenExpired,
            "DAILY_LIMIT_EXCEEDED" => PaymentRejection::DailyLimitExceeded,
            "SELF_TRANSFER_NOT_ALLOWED" => PaymentRejection::SelfTransferNotAllowed,
            "GATEWAY_UNAVAILABLE" | "GATEWAY_TIMEOUT" => {
                PaymentRejection::GatewayUnavailable(message.into())
            }
            _ => PaymentRejection::Other {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

/// Errors that can occur while coordinating a payment
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Authorization did not produce a token
    #[error("Authorization failed: {0}")]
    Auth(#[from] AuthError),

    /// Charge could not be composed
    #[error("Charge error: {0}")]
    Core(#[from] akiba_core::Error),

    /// The payment API said no
    #[error("Payment rejected: {0}")]
    Rejected(#[from] PaymentRejection),

    /// Intent is not a valid combination of kind, method and destination
    #[error("Invalid payment intent: {0}")]
    InvalidIntent(String),

    /// History source failed
    #[error("Transaction history unavailable: {0}")]
    History(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TransactionError {
    fn from(e: serde_json::Error) -> Self {
        TransactionError::Serialization(e.to_string())
    }
}
