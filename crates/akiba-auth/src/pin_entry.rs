//! Request/response channel for manual PIN entry
//!
//! The payment side asks for a PIN and awaits the answer; the UI side
//! receives requests and answers each one exactly once. If the UI drops a
//! request (or the whole receiver) without answering, the waiting side
//! gets `AuthError::EntryCancelled` instead of hanging.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::types::SecurePin;

/// Anything that can produce a PIN typed by the user
#[async_trait]
pub trait PinSource: Send + Sync {
    async fn request_pin(&self, prompt: &str) -> Result<SecurePin>;
}

/// Create a PIN entry channel holding up to `buffer` pending requests
pub fn channel(buffer: usize) -> (PinEntryRequester, PinEntryReceiver) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (PinEntryRequester { tx }, PinEntryReceiver { rx })
}

/// Sending half, held by whoever needs a PIN
#[derive(Clone)]
pub struct PinEntryRequester {
    tx: mpsc::Sender<PinEntryRequest>,
}

#[async_trait]
impl PinSource for PinEntryRequester {
    async fn request_pin(&self, prompt: &str) -> Result<SecurePin> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let request = PinEntryRequest {
            prompt: prompt.to_string(),
            responder: PinEntryResponder { tx: resp_tx },
        };

        self.tx
            .send(request)
            .await
            .map_err(|_| AuthError::EntryCancelled)?;

        match resp_rx.await {
            Ok(Some(pin)) => Ok(pin),
            Ok(None) | Err(_) => {
                debug!("PIN entry request ended without a PIN");
                Err(AuthError::EntryCancelled)
            }
        }
    }
}

/// Receiving half, held by the UI surface that shows the PIN pad
pub struct PinEntryReceiver {
    rx: mpsc::Receiver<PinEntryRequest>,
}

impl PinEntryReceiver {
    /// Next pending request, or `None` once every requester is gone
    pub async fn next(&mut self) -> Option<PinEntryRequest> {
        self.rx.recv().await
    }
}

/// One outstanding request for a PIN
pub struct PinEntryRequest {
    prompt: String,
    responder: PinEntryResponder,
}

impl PinEntryRequest {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn submit(self, pin: SecurePin) {
        self.responder.respond(Some(pin));
    }

    pub fn cancel(self) {
        self.responder.respond(None);
    }
}

struct PinEntryResponder {
    tx: oneshot::Sender<Option<SecurePin>>,
}

impl PinEntryResponder {
    fn respond(self, pin: Option<SecurePin>) {
        // the requester may have given up already
        let _ = self.tx.send(pin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_resolves_request() {
        let (requester, mut receiver) = channel(1);

        let ui = tokio::spawn(async move {
            let request = receiver.next().await.unwrap();
            assert_eq!(request.prompt(), "Pay 100.00");
            request.submit(SecurePin::new("9876").unwrap());
        });

        let pin = requester.request_pin("Pay 100.00").await.unwrap();
        assert_eq!(pin.as_str(), "9876");
        ui.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_resolves_with_error() {
        let (requester, mut receiver) = channel(1);
        tokio::spawn(async move {
            receiver.next().await.unwrap().cancel();
        });
        assert_eq!(requester.request_pin("x").await, Err(AuthError::EntryCancelled));
    }

    #[tokio::test]
    async fn test_dropped_request_is_rejected() {
        let (requester, mut receiver) = channel(1);
        tokio::spawn(async move {
            let request = receiver.next().await.unwrap();
            drop(request);
        });
        assert_eq!(requester.request_pin("x").await, Err(AuthError::EntryCancelled));
    }

    #[tokio::test]
    async fn test_torn_down_receiver_is_rejected() {
        let (requester, receiver) = channel(1);
        drop(receiver);
        assert_eq!(requester.request_pin("x").await, Err(AuthError::EntryCancelled));
    }

    #[tokio::test]
    async fn test_receiver_dropped_with_request_queued() {
        let (requester, receiver) = channel(1);
        let pending = tokio::spawn(async move { requester.request_pin("x").await });
        tokio::task::yield_now().await;
        drop(receiver);
        assert_eq!(pending.await.unwrap(), Err(AuthError::EntryCancelled));
    }
}
