// common/src/flow/driver.rs
use async_trait::async_trait;
use futures::future::{AbortRegistration, Abortable, Aborted};
use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::ChallengeSettings;
use crate::error::AuthError;
use crate::flow::state::{AuthFlow, FlowResult, FlowState, InvalidTransition};
use crate::protocol::address::Address;
use crate::protocol::challenge::Challenge;
use crate::protocol::context::FlowContext;
use crate::protocol::messages::{NonceRequest, NonceResponse, SiweRequest, SiweResponse};

/// The browser wallet (an injected EIP-1193 provider or equivalent).
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Ask the user to connect; returns the selected account as reported by
    /// the wallet. Fails with `NoWallet` or `UserRejectedConnect`.
    async fn request_address(&self) -> Result<String, AuthError>;

    /// `personal_sign` over `message`. Fails with `UserRejectedSign`.
    async fn personal_sign(&self, message: &str, address: &Address) -> Result<String, AuthError>;
}

/// The server side of the handshake.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn request_nonce(&self, request: &NonceRequest) -> Result<NonceResponse, AuthError>;
    async fn verify(&self, request: &SiweRequest) -> Result<SiweResponse, AuthError>;
}

#[async_trait]
impl<T: WalletConnector + ?Sized> WalletConnector for Arc<T> {
    async fn request_address(&self) -> Result<String, AuthError> {
        (**self).request_address().await
    }

    async fn personal_sign(&self, message: &str, address: &Address) -> Result<String, AuthError> {
        (**self).personal_sign(message, address).await
    }
}

#[async_trait]
impl<T: AuthBackend + ?Sized> AuthBackend for Arc<T> {
    async fn request_nonce(&self, request: &NonceRequest) -> Result<NonceResponse, AuthError> {
        (**self).request_nonce(request).await
    }

    async fn verify(&self, request: &SiweRequest) -> Result<SiweResponse, AuthError> {
        (**self).verify(request).await
    }
}

/// In-process backend, for embedding the page next to the server.
#[async_trait]
impl AuthBackend for AuthService {
    async fn request_nonce(&self, request: &NonceRequest) -> Result<NonceResponse, AuthError> {
        AuthService::request_nonce(self, request).await
    }

    async fn verify(&self, request: &SiweRequest) -> Result<SiweResponse, AuthError> {
        let outcome = self.sign_in(request).await?;
        Ok(outcome.response())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Completed(FlowResult),
    Failed(AuthError),
    /// Aborted by the caller; the flow is back in `AwaitingWallet`.
    Cancelled,
}

/// Walks an [`AuthFlow`] through connect, nonce, sign and verify.
pub struct FlowDriver<W, B> {
    wallet: W,
    backend: B,
    settings: ChallengeSettings,
}

impl<W: WalletConnector, B: AuthBackend> FlowDriver<W, B> {
    pub fn new(wallet: W, backend: B, settings: ChallengeSettings) -> Self {
        Self {
            wallet,
            backend,
            settings,
        }
    }

    /// Run the flow to a terminal state.
    ///
    /// A flow already in a terminal state is reported as-is; a flow left
    /// mid-way by a manual transition is reset first. Aborting through the
    /// paired `AbortHandle` drops the in-flight step and resets the flow.
    pub async fn run(&self, flow: &mut AuthFlow, abort: AbortRegistration) -> FlowOutcome {
        match flow.state() {
            FlowState::AwaitingWallet => {}
            FlowState::Success | FlowState::Error => return settled(flow),
            _ => flow.reset(),
        }
        let Some(context) = flow.context().cloned() else {
            return settled(flow);
        };

        match Abortable::new(self.steps(flow, &context), abort).await {
            Ok(Ok(result)) => {
                if let Err(e) = flow.succeeded(result) {
                    tracing::error!("Could not record sign-in result: {}", e);
                }
            }
            Ok(Err(error)) => {
                if error.is_wallet_error() {
                    tracing::info!("Sign-in stopped at the wallet: {}", error);
                } else {
                    tracing::warn!("Sign-in failed: {}", error);
                }
                if let Err(e) = flow.failed(error) {
                    tracing::error!("Could not record sign-in failure: {}", e);
                }
            }
            Err(Aborted) => {
                tracing::info!("Sign-in cancelled in {}", flow.state());
                flow.reset();
                return FlowOutcome::Cancelled;
            }
        }
        settled(flow)
    }

    async fn steps(
        &self,
        flow: &mut AuthFlow,
        context: &FlowContext,
    ) -> Result<FlowResult, AuthError> {
        let address: Address = self.wallet.request_address().await?.parse()?;
        flow.wallet_connected(address).map_err(unexpected)?;

        let nonce = self
            .backend
            .request_nonce(&NonceRequest::new(&address, context))
            .await?;
        flow.nonce_received().map_err(unexpected)?;

        let message = Challenge::for_context(
            &self.settings,
            address,
            context,
            nonce.nonce,
            nonce.issued_at,
            nonce.expires_at,
        )
        .render();
        let signature = self.wallet.personal_sign(&message, &address).await?;
        flow.signature_obtained().map_err(unexpected)?;

        let response = self
            .backend
            .verify(&SiweRequest::new(message, signature, context))
            .await?;
        match (context, response) {
            (FlowContext::Web, SiweResponse::Web { token, tier }) => {
                Ok(FlowResult::Web { token, tier })
            }
            (FlowContext::Desktop { state, .. }, SiweResponse::Desktop { code, state: echoed }) => {
                if echoed != state.as_str() {
                    tracing::warn!("Server echoed a different state for {}", address);
                    return Err(AuthError::InvalidState);
                }
                Ok(FlowResult::Desktop { code, state: echoed })
            }
            _ => {
                tracing::warn!("Sign-in response does not match the flow context");
                Err(AuthError::VerifyFailed)
            }
        }
    }
}

fn settled(flow: &AuthFlow) -> FlowOutcome {
    match (flow.state(), flow.result()) {
        (FlowState::Success, Some(result)) => FlowOutcome::Completed(result.clone()),
        _ => FlowOutcome::Failed(flow.error().unwrap_or(AuthError::NetworkError)),
    }
}

fn unexpected(err: InvalidTransition) -> AuthError {
    tracing::error!("{}", err);
    AuthError::NetworkError
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AuthConfig;
    use crate::flow::entry::EntryParams;
    use crate::models::Tier;
    use crate::protocol::deeplink::DEFAULT_SCHEME;
    use crate::protocol::signature::test_support::TestSigner;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use futures::future::AbortHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy, PartialEq)]
    enum Behaviour {
        Approve,
        RejectSign,
        HangOnSign,
    }

    struct FakeWallet {
        signer: TestSigner,
        behaviour: Behaviour,
        connects: AtomicUsize,
        signs: AtomicUsize,
    }

    impl FakeWallet {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                signer: TestSigner::from_seed(21),
                behaviour,
                connects: AtomicUsize::new(0),
                signs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl WalletConnector for FakeWallet {
        async fn request_address(&self) -> Result<String, AuthError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(self.signer.address().to_checksum())
        }

        async fn personal_sign(&self, message: &str, _: &Address) -> Result<String, AuthError> {
            self.signs.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Approve => Ok(self.signer.personal_sign(message)),
                Behaviour::RejectSign => Err(AuthError::UserRejectedSign),
                Behaviour::HangOnSign => futures::future::pending().await,
            }
        }
    }

    fn backend() -> (Arc<AuthService>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let service = AuthService::new(&AuthConfig::default(), store.clone(), clock);
        (Arc::new(service), store)
    }

    fn driver(
        wallet: Arc<FakeWallet>,
        service: Arc<AuthService>,
    ) -> FlowDriver<Arc<FakeWallet>, Arc<AuthService>> {
        let settings = service.settings().clone();
        FlowDriver::new(wallet, service, settings)
    }

    const DESKTOP_QUERY: &str = "app=desktop&state=s1s1s1s1s1s1s1s1&machine_id=machine-01";

    #[tokio::test]
    async fn test_desktop_flow_hands_off_code() {
        let (service, _) = backend();
        let wallet = FakeWallet::new(Behaviour::Approve);
        let driver = driver(wallet.clone(), service.clone());
        let mut flow = AuthFlow::from_entry(&EntryParams::from_query(DESKTOP_QUERY), DEFAULT_SCHEME);

        let (_, registration) = AbortHandle::new_pair();
        let outcome = driver.run(&mut flow, registration).await;
        let FlowOutcome::Completed(FlowResult::Desktop { code, state }) = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(state, "s1s1s1s1s1s1s1s1");
        assert_eq!(flow.state(), FlowState::Success);
        assert_eq!(flow.address(), Some(&wallet.signer.address()));

        let link = flow.take_redirect().unwrap();
        assert_eq!(
            link.to_string(),
            format!("sneradar://auth?code={}&state=s1s1s1s1s1s1s1s1", code)
        );
        assert!(flow.take_redirect().is_none());

        let issued = service.redeem_code(&code, Some(&state)).await.unwrap();
        assert_eq!(issued.session.address, wallet.signer.address());
    }

    #[tokio::test]
    async fn test_web_flow_returns_token() {
        let (service, store) = backend();
        let wallet = FakeWallet::new(Behaviour::Approve);
        let driver = driver(wallet, service.clone());
        let mut flow = AuthFlow::from_entry(&EntryParams::from_query(""), DEFAULT_SCHEME);

        let (_, registration) = AbortHandle::new_pair();
        let FlowOutcome::Completed(FlowResult::Web { token, tier }) =
            driver.run(&mut flow, registration).await
        else {
            panic!("web flow did not complete");
        };
        assert_eq!(tier, Tier::Free);
        assert!(service.authenticate(&token).await.is_ok());
        assert_eq!(store.code_count(), 0);
        assert!(flow.take_redirect().is_none());
    }

    #[tokio::test]
    async fn test_invalid_entry_never_touches_wallet() {
        let (service, store) = backend();
        let wallet = FakeWallet::new(Behaviour::Approve);
        let driver = driver(wallet.clone(), service);
        let params = EntryParams::from_query("app=desktop&state=s1s1s1s1s1s1s1s1&machine_id=abcde");
        let mut flow = AuthFlow::from_entry(&params, DEFAULT_SCHEME);

        let (_, registration) = AbortHandle::new_pair();
        let outcome = driver.run(&mut flow, registration).await;
        assert_eq!(outcome, FlowOutcome::Failed(AuthError::InvalidState));
        assert_eq!(wallet.connects.load(Ordering::SeqCst), 0);
        assert_eq!(store.nonce_count(), 0);
        assert_eq!(
            flow.take_redirect().map(|l| l.to_string()).as_deref(),
            Some("sneradar://auth-error?error=INVALID_STATE&machine_id=abcde")
        );
    }

    #[tokio::test]
    async fn test_rejected_signature_then_retry() {
        let (service, _) = backend();
        let rejecting = driver(FakeWallet::new(Behaviour::RejectSign), service.clone());
        let mut flow = AuthFlow::from_entry(&EntryParams::from_query(DESKTOP_QUERY), DEFAULT_SCHEME);

        let (_, registration) = AbortHandle::new_pair();
        let outcome = rejecting.run(&mut flow, registration).await;
        assert_eq!(outcome, FlowOutcome::Failed(AuthError::UserRejectedSign));
        assert_eq!(
            flow.take_redirect().map(|l| l.to_string()).as_deref(),
            Some("sneradar://auth-error?error=USER_REJECTED_SIGN&machine_id=machine-01")
        );

        // Terminal until reset.
        let (_, registration) = AbortHandle::new_pair();
        assert_eq!(
            rejecting.run(&mut flow, registration).await,
            FlowOutcome::Failed(AuthError::UserRejectedSign)
        );

        flow.reset();
        let approving = driver(FakeWallet::new(Behaviour::Approve), service);
        let (_, registration) = AbortHandle::new_pair();
        assert!(matches!(
            approving.run(&mut flow, registration).await,
            FlowOutcome::Completed(FlowResult::Desktop { .. })
        ));
    }

    #[tokio::test]
    async fn test_abort_resets_flow() {
        let (service, _) = backend();
        let wallet = FakeWallet::new(Behaviour::HangOnSign);
        let driver = driver(wallet.clone(), service);
        let mut flow = AuthFlow::from_entry(&EntryParams::from_query(DESKTOP_QUERY), DEFAULT_SCHEME);

        let (handle, registration) = AbortHandle::new_pair();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            handle.abort();
        });

        assert_eq!(driver.run(&mut flow, registration).await, FlowOutcome::Cancelled);
        assert_eq!(wallet.signs.load(Ordering::SeqCst), 1);
        assert_eq!(flow.state(), FlowState::AwaitingWallet);
        assert!(flow.take_redirect().is_none());
    }
}
