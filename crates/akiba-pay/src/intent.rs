//! Payment intents: what the user asked to do, before authorization

use serde::{Deserialize, Serialize};
use std::fmt;

use akiba_auth::UserId;
use akiba_core::Money;

use crate::error::{Result, TransactionError};

/// The kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Transfer,
    MerchantPayment,
    TopUp,
    SavingsDeposit,
}

impl PaymentKind {
    /// Whether this kind of payment carries a round-up
    pub fn allows_round_up(self) -> bool {
        match self {
            PaymentKind::Transfer | PaymentKind::MerchantPayment => true,
            PaymentKind::TopUp | PaymentKind::SavingsDeposit => false,
        }
    }
}

/// Where the money comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
    Savings,
    Mpesa { phone: String },
    Card { card_id: String },
}

impl PaymentMethod {
    /// Funds come from outside the wallet
    pub fn is_external(&self) -> bool {
        match self {
            PaymentMethod::Wallet | PaymentMethod::Savings => false,
            PaymentMethod::Mpesa { .. } | PaymentMethod::Card { .. } => true,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Wallet => f.write_str("wallet"),
            PaymentMethod::Savings => f.write_str("savings"),
            PaymentMethod::Mpesa { .. } => f.write_str("mpesa"),
            PaymentMethod::Card { .. } => f.write_str("card"),
        }
    }
}

/// Where the money goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    Wallet { account: String },
    Merchant { till: String },
    Phone { msisdn: String },
    Savings { goal: String },
}

/// A user's request to move money
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub user_id: UserId,
    pub kind: PaymentKind,
    pub method: PaymentMethod,
    pub destination: Destination,
    pub amount: Money,
    #[serde(default)]
    pub fee: Money,
}

impl PaymentIntent {
    /// Check kind, method and destination fit together
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(TransactionError::InvalidIntent(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.fee.is_negative() {
            return Err(TransactionError::InvalidIntent(format!(
                "fee must not be negative, got {}",
                self.fee
            )));
        }

        let fits = match (self.kind, &self.method, &self.destination) {
            (PaymentKind::Transfer, _, Destination::Wallet { .. } | Destination::Phone { .. }) => {
                true
            }
            (PaymentKind::MerchantPayment, _, Destination::Merchant { .. }) => true,
            (PaymentKind::TopUp, method, Destination::Wallet { .. }) => method.is_external(),
            (PaymentKind::SavingsDeposit, method, Destination::Savings { .. }) => {
                !matches!(method, PaymentMethod::Savings)
            }
            _ => false,
        };

        if fits {
            Ok(())
        } else {
            Err(TransactionError::InvalidIntent(format!(
                "{:?} from {} to {:?} is not supported",
                self.kind, self.method, self.destination
            )))
        }
    }
}
