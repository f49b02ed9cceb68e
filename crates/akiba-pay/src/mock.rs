//! In-memory payment collaborators for tests and the CLI

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;

use akiba_auth::UserId;
use akiba_core::Money;

use crate::api::{PaymentApi, PaymentSubmission, Settlement, TransactionHistory};
use crate::error::{PaymentRejection, Result, TransactionError};

/// What the mock API saw for one submission
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    pub request_id: uuid::Uuid,
    pub token: String,
    pub total: Money,
    pub round_up: Money,
    pub wire: serde_json::Value,
}

/// Payment API that settles everything unless told otherwise
#[derive(Default)]
pub struct MockPaymentApi {
    submissions: Mutex<Vec<RecordedSubmission>>,
    scripted: Mutex<VecDeque<PaymentRejection>>,
}

impl MockPaymentApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next submission with `rejection`; queued rejections apply in order
    pub fn reject_next(&self, rejection: PaymentRejection) {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(rejection);
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Raw tokens in submission order
    pub fn tokens(&self) -> Vec<String> {
        self.submissions().into_iter().map(|s| s.token).collect()
    }
}

#[async_trait]
impl PaymentApi for MockPaymentApi {
    async fn submit(
        &self,
        submission: PaymentSubmission,
    ) -> std::result::Result<Settlement, PaymentRejection> {
        let recorded = RecordedSubmission {
            request_id: submission.request_id,
            token: submission.charge.pin_token().expose().to_string(),
            total: submission.charge.total_to_authorize(),
            round_up: submission.charge.round_up_amount(),
            wire: submission.to_wire(),
        };
        let count = {
            let mut submissions = self.submissions.lock().unwrap_or_else(|e| e.into_inner());
            submissions.push(recorded);
            submissions.len()
        };

        let scripted = self
            .scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(rejection) = scripted {
            return Err(rejection);
        }

        Ok(Settlement {
            transaction_id: format!("txn-{}", count),
            settled_at: Utc::now(),
            receipt: None,
        })
    }
}

/// History with fixed amounts, or a fixed failure
pub struct StaticHistory {
    amounts: Vec<Money>,
    failing: bool,
}

impl StaticHistory {
    pub fn new(amounts: Vec<Money>) -> Self {
        Self {
            amounts,
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            amounts: Vec::new(),
            failing: true,
        }
    }
}

#[async_trait]
impl TransactionHistory for StaticHistory {
    async fn recent_amounts(&self, _user_id: &UserId, _window_days: u32) -> Result<Vec<Money>> {
        if self.failing {
            return Err(TransactionError::History("history service offline".to_string()));
        }
        Ok(self.amounts.clone())
    }
}
