//! Shapes exchanged with the external payment/transfer API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use akiba_auth::{PinToken, UserId};
use akiba_core::{ChargeBreakdown, Money};

use crate::error::{PaymentRejection, Result};
use crate::intent::{Destination, PaymentIntent, PaymentKind, PaymentMethod};

/// A fully composed charge with its authorization token attached
///
/// Built immediately before submission and immutable afterwards.
#[derive(Debug, Clone)]
pub struct AuthorizedChargeRequest {
    breakdown: ChargeBreakdown,
    pin_token: PinToken,
}

impl AuthorizedChargeRequest {
    pub fn new(breakdown: ChargeBreakdown, pin_token: PinToken) -> Self {
        Self {
            breakdown,
            pin_token,
        }
    }

    pub fn base_amount(&self) -> Money {
        self.breakdown.base_amount
    }

    pub fn fee(&self) -> Money {
        self.breakdown.fee
    }

    pub fn round_up_amount(&self) -> Money {
        self.breakdown.round_up_amount()
    }

    pub fn total_to_authorize(&self) -> Money {
        self.breakdown.total_to_authorize
    }

    pub fn breakdown(&self) -> &ChargeBreakdown {
        &self.breakdown
    }

    pub fn pin_token(&self) -> &PinToken {
        &self.pin_token
    }
}

/// One submission to the payment API
#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    /// Fresh per submission, never reused across retries
    pub request_id: Uuid,
    pub user_id: UserId,
    pub kind: PaymentKind,
    pub method: PaymentMethod,
    pub destination: Destination,
    pub charge: AuthorizedChargeRequest,
}

impl PaymentSubmission {
    pub fn new(intent: PaymentIntent, charge: AuthorizedChargeRequest) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id: intent.user_id,
            kind: intent.kind,
            method: intent.method,
            destination: intent.destination,
            charge,
        }
    }

    /// The gateway's JSON body: amounts, destination and the raw token
    pub fn to_wire(&self) -> serde_json::Value {
        let split = self.charge.breakdown().split;
        serde_json::json!({
            "request_id": self.request_id,
            "kind": self.kind,
            "method": self.method,
            "destination": self.destination,
            "amount": self.charge.base_amount(),
            "fee": self.charge.fee(),
            "round_up_amount": self.charge.round_up_amount(),
            "round_up_main_share": split.main_share,
            "round_up_savings_share": split.savings_share,
            "total": self.charge.total_to_authorize(),
            "pin_token": self.charge.pin_token().expose(),
        })
    }
}

/// Successful settlement reported by the payment API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub transaction_id: String,
    pub settled_at: DateTime<Utc>,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// External payment/transfer API
#[async_trait]
pub trait PaymentApi: Send + Sync {
    async fn submit(
        &self,
        submission: PaymentSubmission,
    ) -> std::result::Result<Settlement, PaymentRejection>;
}

/// Read-only view of a user's recently completed payments
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    async fn recent_amounts(&self, user_id: &UserId, window_days: u32) -> Result<Vec<Money>>;
}
