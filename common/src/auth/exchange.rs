// common/src/auth/exchange.rs
use chrono::{Duration, SubsecRound};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::AuthError;
use crate::models::{AuthSession, ExchangeCode};
use crate::protocol::address::Address;
use crate::protocol::context::{FlowContext, MachineId, SessionState};
use crate::protocol::messages::SiweResponse;
use crate::store::{AuthStore, Consume};
use crate::token::{generate_exchange_code, redact};
use crate::utils::{generate_jwt_token, validate_jwt_token};

/// What a verified sign-in turns into.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Browser flow: durable bearer token.
    Web { token: String, session: AuthSession },
    /// Desktop flow: only the one-time code leaves the server.
    Desktop {
        code: ExchangeCode,
        session: AuthSession,
    },
}

impl AuthOutcome {
    pub fn session(&self) -> &AuthSession {
        match self {
            AuthOutcome::Web { session, .. } | AuthOutcome::Desktop { session, .. } => session,
        }
    }

    /// Wire body for `POST /api/auth/siwe`.
    pub fn response(&self) -> SiweResponse {
        match self {
            AuthOutcome::Web { token, session } => SiweResponse::Web {
                token: token.clone(),
                tier: session.tier,
            },
            AuthOutcome::Desktop { code, .. } => SiweResponse::Desktop {
                code: code.code.clone(),
                state: code.state.to_string(),
            },
        }
    }
}

/// A session together with its signed bearer token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: AuthSession,
}

pub struct SessionExchanger {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    code_ttl: Duration,
    jwt_secret: Vec<u8>,
}

impl SessionExchanger {
    pub fn new(
        store: Arc<dyn AuthStore>,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
        code_ttl: Duration,
        jwt_secret: &[u8],
    ) -> Self {
        Self {
            store,
            clock,
            session_ttl,
            code_ttl,
            jwt_secret: jwt_secret.to_vec(),
        }
    }

    /// Create the session for a verified address and, for desktop flows,
    /// the exchange code that stands in for it.
    pub async fn complete(
        &self,
        address: Address,
        context: &FlowContext,
    ) -> Result<AuthOutcome, AuthError> {
        let now = self.clock.now().trunc_subsecs(3);
        let tier = self.store.tier_of(&address).await?.unwrap_or_default();
        let session = AuthSession::new(address, tier, now, self.session_ttl);
        self.store.put_session(session.clone()).await?;

        match context {
            FlowContext::Web => {
                let token = self.sign(&session)?;
                tracing::info!("Opened web session {} for {} ({})", session.id, address, tier);
                Ok(AuthOutcome::Web { token, session })
            }
            FlowContext::Desktop { state, machine_id } => {
                let code = self
                    .mint_code(&session, state.clone(), Some(machine_id.clone()))
                    .await?;
                tracing::info!(
                    "Issued desktop code {} for {} on machine {:?}",
                    redact(&code.code),
                    address,
                    machine_id
                );
                Ok(AuthOutcome::Desktop { code, session })
            }
        }
    }

    /// Re-issue a desktop code for a session that is already signed in on
    /// the web.
    pub async fn issue_desktop_code(
        &self,
        session: &AuthSession,
        state: &str,
    ) -> Result<ExchangeCode, AuthError> {
        let state = SessionState::new(state)?;
        let code = self.mint_code(session, state, None).await?;
        tracing::info!(
            "Issued desktop code {} from web session {}",
            redact(&code.code),
            session.id
        );
        Ok(code)
    }

    /// Trade a one-time code for a bearer token. The code is burnt by the
    /// first call whatever the outcome of the state check.
    pub async fn redeem_code(
        &self,
        code: &str,
        expected_state: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        let now = self.clock.now();
        let record = match self.store.consume_code(code, now).await? {
            Consume::Consumed(record) => record,
            Consume::AlreadyConsumed => {
                tracing::warn!("Desktop code {} presented twice", redact(code));
                return Err(AuthError::CodeConsumed);
            }
            Consume::Expired => return Err(AuthError::CodeExpired),
            Consume::NotFound => return Err(AuthError::CodeNotFound),
        };

        if let Some(expected) = expected_state {
            if record.state.as_str() != expected {
                tracing::warn!("State mismatch redeeming code for {}", record.address);
                return Err(AuthError::InvalidState);
            }
        }

        let session = match self.store.get_session(&record.session_id).await? {
            Some(session) if !session.is_expired(now) => session,
            _ => return Err(AuthError::StateExpired),
        };

        let token = self.sign(&session)?;
        tracing::info!("Redeemed desktop code for {}", session.address);
        Ok(IssuedSession { token, session })
    }

    /// Resolve a bearer token to its live session.
    pub async fn authenticate(&self, token: &str) -> Result<AuthSession, AuthError> {
        let now = self.clock.now();
        let (sid, _) = validate_jwt_token(token, &self.jwt_secret, now).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AuthError::Unauthenticated
        })?;

        match self.store.get_session(&sid).await? {
            Some(session) if !session.is_expired(now) => Ok(session),
            _ => Err(AuthError::Unauthenticated),
        }
    }

    /// Drop the session behind `token`. Unknown or invalid tokens are a no-op.
    pub async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        let Ok((sid, _)) = validate_jwt_token(token, &self.jwt_secret, self.clock.now()) else {
            return Ok(false);
        };
        let removed = self.store.remove_session(&sid).await?;
        if removed {
            tracing::info!("Closed session {}", sid);
        }
        Ok(removed)
    }

    async fn mint_code(
        &self,
        session: &AuthSession,
        state: SessionState,
        machine_id: Option<MachineId>,
    ) -> Result<ExchangeCode, AuthError> {
        let issued_at = self.clock.now().trunc_subsecs(3);
        let code = ExchangeCode {
            code: generate_exchange_code(),
            address: session.address,
            state,
            machine_id,
            session_id: session.id,
            issued_at,
            expires_at: issued_at + self.code_ttl,
            consumed: false,
        };
        self.store.put_code(code.clone()).await?;
        Ok(code)
    }

    fn sign(&self, session: &AuthSession) -> Result<String, AuthError> {
        generate_jwt_token(session, &self.jwt_secret).map_err(|e| {
            tracing::error!("Failed to sign session token: {}", e);
            AuthError::VerifyFailed
        })
    }
}
