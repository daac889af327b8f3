// common/src/auth/mod.rs
//! Server side of the wallet sign-in handshake.
//!
//! `nonce` → the wallet signs the rendered [`Challenge`] → `sign_in` verifies
//! and either opens a web session or mints a desktop exchange code, which the
//! desktop app later trades in through `redeem_code`.

pub mod exchange;
pub mod nonce;
pub mod verifier;

use std::sync::Arc;

pub use exchange::{AuthOutcome, IssuedSession, SessionExchanger};
pub use nonce::NonceIssuer;
pub use verifier::SignatureVerifier;

use crate::clock::Clock;
use crate::config::{AuthConfig, ChallengeSettings};
use crate::error::AuthError;
use crate::models::{AuthSession, ExchangeCode, Nonce};
use crate::protocol::challenge::Challenge;
use crate::protocol::context::FlowContext;
use crate::protocol::messages::{NonceRequest, NonceResponse, SiweRequest};
use crate::store::{AuthStore, StoreError, SweepReport};

/// Everything the HTTP layer needs, wired to one store and one clock.
pub struct AuthService {
    nonces: NonceIssuer,
    verifier: SignatureVerifier,
    exchanger: SessionExchanger,
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    settings: ChallengeSettings,
    deep_link_scheme: String,
}

impl AuthService {
    pub fn new(config: &AuthConfig, store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            nonces: NonceIssuer::new(store.clone(), clock.clone(), config.nonce_ttl()),
            verifier: SignatureVerifier::new(store.clone(), clock.clone(), config.challenge.clone()),
            exchanger: SessionExchanger::new(
                store.clone(),
                clock.clone(),
                config.session_ttl(),
                config.code_ttl(),
                config.jwt_secret.as_bytes(),
            ),
            store,
            clock,
            settings: config.challenge.clone(),
            deep_link_scheme: config.deep_link_scheme.clone(),
        }
    }

    pub fn settings(&self) -> &ChallengeSettings {
        &self.settings
    }

    pub fn deep_link_scheme(&self) -> &str {
        &self.deep_link_scheme
    }

    /// `POST /api/auth/nonce`. The context is validated before anything is
    /// stored.
    pub async fn request_nonce(&self, request: &NonceRequest) -> Result<NonceResponse, AuthError> {
        let context = request.context()?;
        let nonce = self.issue_nonce(&request.address, context).await?;
        Ok(NonceResponse {
            nonce: nonce.value,
            issued_at: nonce.issued_at,
            expires_at: nonce.expires_at,
        })
    }

    pub async fn issue_nonce(&self, address: &str, context: FlowContext) -> Result<Nonce, AuthError> {
        self.nonces.issue(address, context).await
    }

    /// The exact text the wallet is expected to sign for `nonce`.
    pub fn challenge_for(&self, nonce: &Nonce) -> Challenge {
        self.verifier.expected_challenge(nonce)
    }

    /// `POST /api/auth/siwe`: verify, consume the nonce, complete the flow.
    pub async fn sign_in(&self, request: &SiweRequest) -> Result<AuthOutcome, AuthError> {
        let context = request.context()?;
        let (address, signed_context) = self
            .verifier
            .verify(&request.message, &request.signature, &context)
            .await?;
        self.exchanger.complete(address, &signed_context).await
    }

    pub async fn issue_desktop_code(
        &self,
        session: &AuthSession,
        state: &str,
    ) -> Result<ExchangeCode, AuthError> {
        self.exchanger.issue_desktop_code(session, state).await
    }

    pub async fn redeem_code(
        &self,
        code: &str,
        expected_state: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        self.exchanger.redeem_code(code, expected_state).await
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthSession, AuthError> {
        self.exchanger.authenticate(token).await
    }

    pub async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        self.exchanger.logout(token).await
    }

    /// Reclaim expired records. Correctness never depends on this running.
    pub async fn sweep(&self) -> Result<SweepReport, StoreError> {
        self.store.sweep(self.clock.now()).await
    }
}
