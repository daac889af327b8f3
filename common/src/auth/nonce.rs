// common/src/auth/nonce.rs
use chrono::{Duration, SubsecRound};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::AuthError;
use crate::models::Nonce;
use crate::protocol::address::Address;
use crate::protocol::context::FlowContext;
use crate::store::AuthStore;
use crate::token::{generate_nonce, redact};

/// Hands out one-time nonces, one outstanding per key.
pub struct NonceIssuer {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl NonceIssuer {
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    pub async fn issue(&self, address: &str, context: FlowContext) -> Result<Nonce, AuthError> {
        let address: Address = address.trim().parse()?;

        // Millisecond precision, the resolution the challenge text carries.
        let issued_at = self.clock.now().trunc_subsecs(3);
        let nonce = Nonce {
            value: generate_nonce(),
            address,
            context,
            issued_at,
            expires_at: issued_at + self.ttl,
            consumed: false,
        };

        if let Some(previous) = self.store.put_nonce(nonce.clone()).await? {
            tracing::debug!(
                "Nonce {} for {} superseded by a new request",
                redact(&previous.value),
                address
            );
        }

        tracing::info!(
            "Issued nonce for {} ({})",
            address,
            if nonce.context.is_desktop() { "desktop" } else { "web" }
        );
        Ok(nonce)
    }
}
