// common/src/auth/verifier.rs
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::ChallengeSettings;
use crate::error::AuthError;
use crate::models::{Nonce, NonceKey};
use crate::protocol::address::Address;
use crate::protocol::challenge::Challenge;
use crate::protocol::context::FlowContext;
use crate::protocol::signature::verify_personal_sign;
use crate::store::{AuthStore, Consume};

/// Checks a signed challenge against the server's own nonce records.
pub struct SignatureVerifier {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    settings: ChallengeSettings,
}

impl SignatureVerifier {
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>, settings: ChallengeSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// The challenge the server expects to be signed for `nonce`.
    pub fn expected_challenge(&self, nonce: &Nonce) -> Challenge {
        Challenge::for_context(
            &self.settings,
            nonce.address,
            &nonce.context,
            nonce.value.clone(),
            nonce.issued_at,
            nonce.expires_at,
        )
    }

    /// Verify `signature` over `message` and consume its nonce. Returns the
    /// signer and the flow context the signed challenge was issued for.
    ///
    /// The signer is recovered first, so any edit to the signed text fails as
    /// `SignatureInvalid` before the nonce is even looked up. Acceptance then
    /// requires the presented text to equal the challenge rebuilt from the
    /// stored nonce; no field of the client's message is trusted on its own.
    pub async fn verify(
        &self,
        message: &str,
        signature: &str,
        context: &FlowContext,
    ) -> Result<(Address, FlowContext), AuthError> {
        let presented = Challenge::parse(message).map_err(|e| {
            tracing::warn!("Rejected unparsable challenge: {}", e);
            AuthError::SignatureInvalid
        })?;

        let signer = verify_personal_sign(message, signature, &presented.address)?;

        let key = NonceKey::new(&signer, context);
        let record = match self.store.get_nonce(&key).await? {
            Some(record) if record.context != *context => {
                tracing::warn!("Nonce for {} was issued to a different pairing", signer);
                return Err(AuthError::NonceReplay);
            }
            Some(record) if record.value == presented.nonce => record,
            Some(_) => {
                tracing::warn!("Nonce for {} was superseded", signer);
                return Err(AuthError::NonceReplay);
            }
            None => {
                tracing::warn!("No outstanding nonce for {}", signer);
                return Err(AuthError::NonceReplay);
            }
        };

        let now = self.clock.now();
        if record.is_expired(now) {
            tracing::warn!("Expired nonce presented by {}", signer);
            return Err(AuthError::NonceExpired);
        }
        if record.consumed {
            tracing::warn!("Replayed nonce presented by {}", signer);
            return Err(AuthError::NonceReplay);
        }

        if self.expected_challenge(&record).render() != message {
            tracing::warn!("Challenge text from {} does not match the issued challenge", signer);
            return Err(AuthError::SignatureInvalid);
        }

        match self.store.consume_nonce(&key, &record.value, now).await? {
            Consume::Consumed(consumed) => {
                tracing::info!("Verified wallet signature for {}", signer);
                Ok((signer, consumed.context))
            }
            Consume::Expired => Err(AuthError::NonceExpired),
            Consume::AlreadyConsumed | Consume::NotFound => {
                tracing::warn!("Lost nonce consumption race for {}", signer);
                Err(AuthError::NonceReplay)
            }
        }
    }
}
