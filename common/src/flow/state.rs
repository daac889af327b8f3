// common/src/flow/state.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::AuthError;
use crate::flow::entry::EntryParams;
use crate::models::Tier;
use crate::protocol::address::Address;
use crate::protocol::context::FlowContext;
use crate::protocol::deeplink::DeepLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    AwaitingWallet,
    FetchingNonce,
    AwaitingSignature,
    Verifying,
    Success,
    Error,
}

impl FlowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::Success | FlowState::Error)
    }

    /// Forward edges only; going back to `AwaitingWallet` is `reset`.
    pub fn can_transition_to(self, next: FlowState) -> bool {
        use FlowState::*;
        match (self, next) {
            (AwaitingWallet, FetchingNonce)
            | (FetchingNonce, AwaitingSignature)
            | (AwaitingSignature, Verifying)
            | (Verifying, Success) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowState::AwaitingWallet => "AWAITING_WALLET",
            FlowState::FetchingNonce => "FETCHING_NONCE",
            FlowState::AwaitingSignature => "AWAITING_SIGNATURE",
            FlowState::Verifying => "VERIFYING",
            FlowState::Success => "SUCCESS",
            FlowState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid flow transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: FlowState,
    pub to: FlowState,
}

/// What a successful flow produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowResult {
    Web { token: String, tier: Tier },
    Desktop { code: String, state: String },
}

/// Client-side sign-in state machine.
///
/// Owned by the UI process; never persisted.
#[derive(Debug, Clone)]
pub struct AuthFlow {
    state: FlowState,
    context: Option<FlowContext>,
    wants_desktop: bool,
    machine_hint: String,
    scheme: String,
    address: Option<Address>,
    error: Option<AuthError>,
    result: Option<FlowResult>,
    redirect_pending: bool,
}

impl AuthFlow {
    pub fn new(context: FlowContext, scheme: &str) -> Self {
        Self {
            state: FlowState::AwaitingWallet,
            wants_desktop: context.is_desktop(),
            machine_hint: context.machine_id().map(|m| m.to_string()).unwrap_or_default(),
            context: Some(context),
            scheme: scheme.to_string(),
            address: None,
            error: None,
            result: None,
            redirect_pending: false,
        }
    }

    /// Start from the page's query parameters. Invalid parameters put the
    /// flow straight into `Error` with its error deep link pending; the
    /// wallet is never involved.
    pub fn from_entry(params: &EntryParams, scheme: &str) -> Self {
        match params.context() {
            Ok(context) => Self::new(context, scheme),
            Err(err) => {
                tracing::warn!("Rejected sign-in entry parameters: {}", err);
                Self {
                    state: FlowState::Error,
                    context: None,
                    wants_desktop: params.wants_desktop(),
                    machine_hint: params.machine_hint().to_string(),
                    scheme: scheme.to_string(),
                    address: None,
                    error: Some(err),
                    result: None,
                    redirect_pending: params.wants_desktop(),
                }
            }
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn context(&self) -> Option<&FlowContext> {
        self.context.as_ref()
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn error(&self) -> Option<AuthError> {
        self.error
    }

    pub fn result(&self) -> Option<&FlowResult> {
        self.result.as_ref()
    }

    fn advance(&mut self, next: FlowState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Auth flow {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    pub fn wallet_connected(&mut self, address: Address) -> Result<(), InvalidTransition> {
        self.advance(FlowState::FetchingNonce)?;
        self.address = Some(address);
        Ok(())
    }

    pub fn nonce_received(&mut self) -> Result<(), InvalidTransition> {
        self.advance(FlowState::AwaitingSignature)
    }

    pub fn signature_obtained(&mut self) -> Result<(), InvalidTransition> {
        self.advance(FlowState::Verifying)
    }

    pub fn succeeded(&mut self, result: FlowResult) -> Result<(), InvalidTransition> {
        self.advance(FlowState::Success)?;
        self.redirect_pending = matches!(result, FlowResult::Desktop { .. });
        self.result = Some(result);
        Ok(())
    }

    pub fn failed(&mut self, error: AuthError) -> Result<(), InvalidTransition> {
        self.advance(FlowState::Error)?;
        self.error = Some(error);
        self.redirect_pending = self.wants_desktop;
        Ok(())
    }

    /// Back to `AwaitingWallet`, keeping the entry context. This is the only
    /// way to retry.
    pub fn reset(&mut self) {
        if self.context.is_none() {
            // Entry parameters were rejected; there is nothing to retry.
            return;
        }
        tracing::debug!("Auth flow reset from {}", self.state);
        self.state = FlowState::AwaitingWallet;
        self.address = None;
        self.error = None;
        self.result = None;
        self.redirect_pending = false;
    }

    /// The deep link for the current terminal state, if the flow has one.
    /// Always available so the UI can render it for manual activation.
    pub fn manual_link(&self) -> Option<DeepLink> {
        match (self.state, &self.result, self.error) {
            (FlowState::Success, Some(FlowResult::Desktop { code, state }), _) => {
                Some(DeepLink::auth(&self.scheme, code, state))
            }
            (FlowState::Error, _, Some(error)) if self.wants_desktop => {
                Some(DeepLink::auth_error(&self.scheme, error, &self.machine_hint))
            }
            _ => None,
        }
    }

    /// One-shot redirect: returns the deep link the first time a terminal
    /// state asks for one, `None` afterwards. Opening it is best-effort.
    pub fn take_redirect(&mut self) -> Option<DeepLink> {
        if !self.redirect_pending {
            return None;
        }
        self.redirect_pending = false;
        self.manual_link()
    }

    /// Human-readable line for the status panel.
    pub fn status_message(&self) -> &'static str {
        match self.state {
            FlowState::AwaitingWallet => "Connecting wallet...",
            FlowState::FetchingNonce => "Requesting nonce from server...",
            FlowState::AwaitingSignature => "Waiting for signature...",
            FlowState::Verifying => "Verifying signature...",
            FlowState::Success => "Authentication successful.",
            FlowState::Error => self
                .error
                .map(|e| e.user_message())
                .unwrap_or("An unknown error occurred."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::deeplink::DEFAULT_SCHEME;

    fn desktop_flow() -> AuthFlow {
        let params = EntryParams::from_query("app=desktop&state=s1s1s1s1s1s1s1s1&machine_id=machine-01");
        AuthFlow::from_entry(&params, DEFAULT_SCHEME)
    }

    fn address() -> Address {
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap()
    }

    #[test]
    fn test_happy_path_redirects_once() {
        let mut flow = desktop_flow();
        assert_eq!(flow.state(), FlowState::AwaitingWallet);
        flow.wallet_connected(address()).unwrap();
        flow.nonce_received().unwrap();
        flow.signature_obtained().unwrap();
        flow.succeeded(FlowResult::Desktop {
            code: "c1".into(),
            state: "s1s1s1s1s1s1s1s1".into(),
        })
        .unwrap();

        let link = flow.take_redirect().unwrap();
        assert_eq!(link.to_string(), "sneradar://auth?code=c1&state=s1s1s1s1s1s1s1s1");
        assert_eq!(flow.take_redirect(), None);
        assert_eq!(flow.manual_link(), Some(link));
    }

    #[test]
    fn test_skipping_steps_is_rejected() {
        let mut flow = desktop_flow();
        assert_eq!(
            flow.signature_obtained(),
            Err(InvalidTransition {
                from: FlowState::AwaitingWallet,
                to: FlowState::Verifying
            })
        );
        assert_eq!(flow.state(), FlowState::AwaitingWallet);
    }

    #[test]
    fn test_error_then_reset() {
        let mut flow = desktop_flow();
        flow.wallet_connected(address()).unwrap();
        flow.failed(AuthError::UserRejectedSign).unwrap();
        assert_eq!(flow.state(), FlowState::Error);
        assert!(flow.failed(AuthError::NetworkError).is_err());

        let link = flow.take_redirect().unwrap();
        assert_eq!(
            link.to_string(),
            "sneradar://auth-error?error=USER_REJECTED_SIGN&machine_id=machine-01"
        );

        flow.reset();
        assert_eq!(flow.state(), FlowState::AwaitingWallet);
        assert_eq!(flow.address(), None);
        assert_eq!(flow.error(), None);
        assert_eq!(flow.manual_link(), None);
    }

    #[test]
    fn test_invalid_entry_is_terminal() {
        let params = EntryParams::from_query("app=desktop&state=s1s1s1s1s1s1s1s1&machine_id=abcde");
        let mut flow = AuthFlow::from_entry(&params, DEFAULT_SCHEME);
        assert_eq!(flow.state(), FlowState::Error);
        assert_eq!(flow.error(), Some(AuthError::InvalidState));
        assert_eq!(
            flow.take_redirect().map(|l| l.to_string()).as_deref(),
            Some("sneradar://auth-error?error=INVALID_STATE&machine_id=abcde")
        );
        flow.reset();
        assert_eq!(flow.state(), FlowState::Error);
    }

    #[test]
    fn test_web_flow_has_no_links() {
        let mut flow = AuthFlow::new(FlowContext::Web, DEFAULT_SCHEME);
        flow.wallet_connected(address()).unwrap();
        flow.failed(AuthError::NoWallet).unwrap();
        assert_eq!(flow.take_redirect(), None);
        assert_eq!(flow.status_message(), AuthError::NoWallet.user_message());
    }
}
