//! Transaction request coordination
//!
//! The only component screens talk to. A submission runs:
//!
//! 1. Build the charge preview (round-up, split, total)
//! 2. Obtain a token: biometrics first if configured, manual PIN otherwise
//! 3. Attach the token and hand the charge to the payment API
//!
//! Every submission authorizes afresh. A token goes straight from the
//! verifier to the one submission it was obtained for and never sits in the
//! session, whatever the API answers.

use std::sync::Arc;
use tracing::{debug, info, warn};

use akiba_auth::{BiometricBridge, PinAuthorizer, PinSource, PinToken, UserId};
use akiba_core::{
    AllocationEngine, ChargeBreakdown, HistoryIncrementAdvisor, RoundUpCalculator, RoundUpRule,
    RoundUpStrategy,
};

use crate::api::{
    AuthorizedChargeRequest, PaymentApi, PaymentSubmission, Settlement, TransactionHistory,
};
use crate::error::{Result, TransactionError};
use crate::intent::PaymentIntent;

/// Drives a payment from intent to settlement
pub struct TransactionRequestCoordinator {
    authorizer: Arc<PinAuthorizer>,
    biometric: Option<Arc<BiometricBridge>>,
    pin_source: Arc<dyn PinSource>,
    payments: Arc<dyn PaymentApi>,
    history: Option<Arc<dyn TransactionHistory>>,
    rule: RoundUpRule,
}

impl TransactionRequestCoordinator {
    pub fn new(
        authorizer: Arc<PinAuthorizer>,
        pin_source: Arc<dyn PinSource>,
        payments: Arc<dyn PaymentApi>,
        rule: RoundUpRule,
    ) -> Self {
        Self {
            authorizer,
            biometric: None,
            pin_source,
            payments,
            history: None,
            rule,
        }
    }

    /// Try biometrics before asking for a typed PIN
    pub fn with_biometric(mut self, bridge: Arc<BiometricBridge>) -> Self {
        self.biometric = Some(bridge);
        self
    }

    /// History source for the auto-adaptive round-up
    pub fn with_history(mut self, history: Arc<dyn TransactionHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn rule(&self) -> &RoundUpRule {
        &self.rule
    }

    pub fn set_rule(&mut self, rule: RoundUpRule) {
        self.rule = rule;
    }

    /// Compose the charge for display, before any authorization
    pub async fn preview(&self, intent: &PaymentIntent) -> Result<ChargeBreakdown> {
        intent.validate()?;

        let rule = if intent.kind.allows_round_up() {
            self.rule.clone()
        } else {
            self.rule.clone().disabled()
        };

        let engine = AllocationEngine::new(self.calculator_for(&intent.user_id, &rule).await);
        Ok(engine.build_charge(intent.amount, intent.fee, &rule, intent.amount)?)
    }

    /// Obtain a single-use token for `user_id`, prompting with `prompt` if a
    /// PIN must be typed
    ///
    /// A token that expired before it arrived is refused with `TokenExpired`.
    pub async fn request_authorization(&self, user_id: &UserId, prompt: &str) -> Result<PinToken> {
        if let Some(bridge) = &self.biometric {
            match bridge.authenticate_for_use(user_id).await {
                Ok(token) => return Ok(token),
                Err(e) if e.allows_manual_fallback() => {
                    info!("Biometric authorization unavailable ({}), asking for PIN", e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let pin = self.pin_source.request_pin(prompt).await?;
        Ok(self.authorizer.authorize_for_use(&pin).await?)
    }

    /// Preview, authorize and submit one payment
    pub async fn submit(&self, intent: PaymentIntent) -> Result<Settlement> {
        let breakdown = self.preview(&intent).await?;
        debug!(
            "Charge preview: base {} fee {} round-up {} total {}",
            breakdown.base_amount,
            breakdown.fee,
            breakdown.round_up_amount(),
            breakdown.total_to_authorize
        );

        let prompt = format!("Enter PIN to pay {}", breakdown.total_to_authorize);
        let token = self.request_authorization(&intent.user_id, &prompt).await?;

        let charge = AuthorizedChargeRequest::new(breakdown, token);
        let submission = PaymentSubmission::new(intent, charge);
        let request_id = submission.request_id;
        info!(
            "Submitting {:?} {} with token {}",
            submission.kind,
            request_id,
            submission.charge.pin_token().fingerprint()
        );

        match self.payments.submit(submission).await {
            Ok(settlement) => {
                info!("Payment {} settled as {}", request_id, settlement.transaction_id);
                Ok(settlement)
            }
            Err(rejection) => {
                warn!("Payment {} rejected: {}", request_id, rejection);
                Err(TransactionError::Rejected(rejection))
            }
        }
    }

    async fn calculator_for(&self, user_id: &UserId, rule: &RoundUpRule) -> RoundUpCalculator {
        let RoundUpStrategy::AutoAdaptive {
            analysis_window_days,
            ..
        } = rule.strategy
        else {
            return RoundUpCalculator::new();
        };
        if !rule.enabled {
            return RoundUpCalculator::new();
        }
        let Some(history) = &self.history else {
            return RoundUpCalculator::new();
        };

        match history.recent_amounts(user_id, analysis_window_days).await {
            Ok(amounts) => {
                RoundUpCalculator::with_advisor(Arc::new(HistoryIncrementAdvisor::new(amounts)))
            }
            Err(e) => {
                warn!("Falling back to minimum round-up increment: {}", e);
                RoundUpCalculator::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akiba_auth::mock::{InMemorySecretStore, MockBiometricCapture, MockCredentialVerifier};
    use akiba_auth::{AuthConfig, AuthError, CaptureOutcome, ManualClock, SecurePin};
    use akiba_core::{Allocation, Money};
    use async_trait::async_trait;

    use crate::error::PaymentRejection;
    use crate::intent::{Destination, PaymentKind, PaymentMethod};
    use crate::mock::{MockPaymentApi, StaticHistory};

    const PIN: &str = "1357";

    /// PIN source that always types the same PIN
    struct TypedPin(&'static str);

    #[async_trait]
    impl PinSource for TypedPin {
        async fn request_pin(&self, _prompt: &str) -> akiba_auth::Result<SecurePin> {
            SecurePin::new(self.0)
        }
    }

    struct Harness {
        verifier: Arc<MockCredentialVerifier>,
        authorizer: Arc<PinAuthorizer>,
        payments: Arc<MockPaymentApi>,
    }

    fn harness() -> Harness {
        let verifier = Arc::new(MockCredentialVerifier::new(PIN));
        let authorizer = Arc::new(PinAuthorizer::with_clock(
            &AuthConfig::default(),
            verifier.clone(),
            Arc::new(ManualClock::starting_now()),
        ));
        Harness {
            verifier,
            authorizer,
            payments: Arc::new(MockPaymentApi::new()),
        }
    }

    fn coordinator(
        h: &Harness,
        typed: &'static str,
        rule: RoundUpRule,
    ) -> TransactionRequestCoordinator {
        TransactionRequestCoordinator::new(
            h.authorizer.clone(),
            Arc::new(TypedPin(typed)),
            h.payments.clone(),
            rule,
        )
    }

    fn merchant_payment(amount: i64) -> PaymentIntent {
        PaymentIntent {
            user_id: UserId::new("alice"),
            kind: PaymentKind::MerchantPayment,
            method: PaymentMethod::Wallet,
            destination: Destination::Merchant { till: "8800".into() },
            amount: Money::from_minor(amount),
            fee: Money::ZERO,
        }
    }

    #[tokio::test]
    async fn test_submit_attaches_fresh_token() {
        let h = harness();
        let coord = coordinator(&h, PIN, RoundUpRule::percentage(500));

        let settlement = coord.submit(merchant_payment(12345)).await.unwrap();
        assert_eq!(settlement.transaction_id, "txn-1");

        let sent = h.payments.submissions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].round_up, Money::from_minor(617));
        assert_eq!(sent[0].total, Money::from_minor(12345 + 617));
        assert_eq!(sent[0].token, "token-1");

        // token is gone from the session once attached
        assert!(h.authorizer.consume_token().await.is_none());
    }

    #[tokio::test]
    async fn test_submit_leaves_other_callers_token() {
        let h = harness();
        h.verifier.set_delay_ms(20);
        let coord = coordinator(&h, PIN, RoundUpRule::default());

        let other = {
            let authorizer = h.authorizer.clone();
            tokio::spawn(async move {
                let token = authorizer.authorize(&SecurePin::new(PIN).unwrap()).await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(30)).await;
                (token, authorizer.consume_token().await)
            })
        };

        coord.submit(merchant_payment(1000)).await.unwrap();
        let (issued, consumed) = other.await.unwrap();

        assert_eq!(h.verifier.calls(), 2);
        assert_eq!(consumed, Some(issued));
        assert_eq!(h.payments.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_never_submitted() {
        let verifier = Arc::new(MockCredentialVerifier::new(PIN).with_ttl(0));
        let h = Harness {
            authorizer: Arc::new(PinAuthorizer::with_clock(
                &AuthConfig::default(),
                verifier.clone(),
                Arc::new(ManualClock::starting_now()),
            )),
            verifier,
            payments: Arc::new(MockPaymentApi::new()),
        };
        let coord = coordinator(&h, PIN, RoundUpRule::default());

        let err = coord.submit(merchant_payment(1000)).await.unwrap_err();
        assert!(matches!(err, TransactionError::Auth(AuthError::TokenExpired)));
        assert_eq!(h.verifier.calls(), 1);
        assert!(h.payments.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_each_submission_authorizes_again() {
        let h = harness();
        let coord = coordinator(&h, PIN, RoundUpRule::default());

        coord.submit(merchant_payment(1000)).await.unwrap();
        coord.submit(merchant_payment(2000)).await.unwrap();

        assert_eq!(h.verifier.calls(), 2);
        let tokens = h.payments.tokens();
        assert_eq!(tokens.len(), 2);
        assert_ne!(tokens[0], tokens[1]);
    }

    #[tokio::test]
    async fn test_wrong_pin_never_reaches_api() {
        let h = harness();
        let coord = coordinator(&h, "0000", RoundUpRule::default());

        let err = coord.submit(merchant_payment(1000)).await.unwrap_err();
        assert!(matches!(
            err,
            TransactionError::Auth(AuthError::IncorrectPin { attempts_remaining: 2 })
        ));
        assert!(h.payments.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_surfaces_and_token_is_spent() {
        let h = harness();
        let coord = coordinator(&h, PIN, RoundUpRule::default());
        h.payments.reject_next(PaymentRejection::InsufficientFunds);

        let err = coord.submit(merchant_payment(1000)).await.unwrap_err();
        assert!(matches!(
            err,
            TransactionError::Rejected(PaymentRejection::InsufficientFunds)
        ));
        assert!(h.authorizer.consume_token().await.is_none());

        // retry goes through a new authorization
        coord.submit(merchant_payment(1000)).await.unwrap();
        assert_eq!(h.verifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_top_up_has_no_round_up() {
        let h = harness();
        let coord = coordinator(&h, PIN, RoundUpRule::fixed(Money::from_major(100)));

        let intent = PaymentIntent {
            user_id: UserId::new("alice"),
            kind: PaymentKind::TopUp,
            method: PaymentMethod::Mpesa { phone: "254700000001".into() },
            destination: Destination::Wallet { account: "alice".into() },
            amount: Money::from_minor(4321),
            fee: Money::from_minor(10),
        };
        let preview = coord.preview(&intent).await.unwrap();
        assert_eq!(preview.round_up_amount(), Money::ZERO);
        assert_eq!(preview.total_to_authorize, Money::from_minor(4331));
    }

    #[tokio::test]
    async fn test_invalid_intent_skips_authorization() {
        let h = harness();
        let coord = coordinator(&h, PIN, RoundUpRule::default());
        let mut intent = merchant_payment(1000);
        intent.destination = Destination::Savings { goal: "trip".into() };

        let err = coord.submit(intent).await.unwrap_err();
        assert!(matches!(err, TransactionError::InvalidIntent(_)));
        assert_eq!(h.verifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_adaptive_preview_uses_history() {
        let h = harness();
        let rule = RoundUpRule::auto_adaptive(Money::from_major(1), Money::from_major(100), 30)
            .with_allocation(Allocation::new(50, 50).unwrap());
        // median 400.00 -> tenth is 40.00 -> snaps up to 50.00
        let history = StaticHistory::new(vec![
            Money::from_major(200),
            Money::from_major(400),
            Money::from_major(900),
        ]);
        let coord = coordinator(&h, PIN, rule).with_history(Arc::new(history));

        let preview = coord.preview(&merchant_payment(12_000)).await.unwrap();
        assert_eq!(preview.round_up.increment_used, Some(Money::from_major(50)));
        assert_eq!(preview.round_up_amount(), Money::from_minor(3_000));
    }

    #[tokio::test]
    async fn test_adaptive_preview_survives_history_failure() {
        let h = harness();
        let rule = RoundUpRule::auto_adaptive(Money::from_major(10), Money::from_major(100), 30);
        let coord = coordinator(&h, PIN, rule).with_history(Arc::new(StaticHistory::failing()));

        let preview = coord.preview(&merchant_payment(12_500)).await.unwrap();
        assert_eq!(preview.round_up.increment_used, Some(Money::from_major(10)));
    }

    #[tokio::test]
    async fn test_biometric_path_and_fallback() {
        let h = harness();
        let capture = Arc::new(MockBiometricCapture::succeeding());
        let secrets = Arc::new(InMemorySecretStore::new());
        let bridge = Arc::new(BiometricBridge::new(
            h.authorizer.clone(),
            capture.clone(),
            secrets,
            "Confirm payment",
        ));
        let alice = UserId::new("alice");
        bridge.enroll(&alice, &SecurePin::new(PIN).unwrap()).await.unwrap();

        // typed PIN is wrong, so a settlement proves biometrics were used
        let coord = coordinator(&h, "0000", RoundUpRule::default()).with_biometric(bridge);
        coord.submit(merchant_payment(1000)).await.unwrap();
        assert_eq!(capture.captures(), 1);

        capture.set_outcome(CaptureOutcome::DeviceError("sensor dirty".into()));
        let err = coord.submit(merchant_payment(1000)).await.unwrap_err();
        assert!(matches!(
            err,
            TransactionError::Auth(AuthError::IncorrectPin { .. })
        ));
        assert_eq!(h.payments.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_lockout_is_not_bypassed_by_fallback() {
        let h = harness();
        let coord = coordinator(&h, "0000", RoundUpRule::default());
        for _ in 0..3 {
            let _ = coord.submit(merchant_payment(1000)).await;
        }
        let calls = h.verifier.calls();

        let err = coord.submit(merchant_payment(1000)).await.unwrap_err();
        assert!(matches!(err, TransactionError::Auth(AuthError::PinLocked { .. })));
        assert_eq!(h.verifier.calls(), calls);
    }
}
