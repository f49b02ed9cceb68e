//! Akiba Pay - transaction request coordination
//!
//! Turns a payment intent into an authorized, submitted charge:
//! round-up preview, PIN or biometric authorization, then submission to
//! the payment API with a fresh single-use token.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod intent;
pub mod mock;

pub use api::{
    AuthorizedChargeRequest, PaymentApi, PaymentSubmission, Settlement, TransactionHistory,
};
pub use config::AkibaConfig;
pub use coordinator::TransactionRequestCoordinator;
pub use error::{PaymentRejection, Result, TransactionError};
pub use intent::{Destination, PaymentIntent, PaymentKind, PaymentMethod};
