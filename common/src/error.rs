// common/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// Classified failure of the sign-in handshake.
///
/// The same taxonomy is used on both sides of the wire: the server renders it
/// into an [`ErrorBody`], the client maps the body's `code` back with
/// [`AuthError::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid wallet address")]
    InvalidAddress,
    #[error("no wallet available")]
    NoWallet,
    #[error("wallet connection rejected by user")]
    UserRejectedConnect,
    #[error("signature request rejected by user")]
    UserRejectedSign,
    #[error("nonce expired")]
    NonceExpired,
    #[error("nonce already used or superseded")]
    NonceReplay,
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("invalid authentication state")]
    InvalidState,
    #[error("authentication state expired")]
    StateExpired,
    #[error("exchange code expired")]
    CodeExpired,
    #[error("exchange code already consumed")]
    CodeConsumed,
    #[error("exchange code not found")]
    CodeNotFound,
    #[error("network error")]
    NetworkError,
    #[error("verification failed")]
    VerifyFailed,
    #[error("authentication required")]
    Unauthenticated,
}

impl AuthError {
    pub const ALL: [AuthError; 15] = [
        AuthError::InvalidAddress,
        AuthError::NoWallet,
        AuthError::UserRejectedConnect,
        AuthError::UserRejectedSign,
        AuthError::NonceExpired,
        AuthError::NonceReplay,
        AuthError::SignatureInvalid,
        AuthError::InvalidState,
        AuthError::StateExpired,
        AuthError::CodeExpired,
        AuthError::CodeConsumed,
        AuthError::CodeNotFound,
        AuthError::NetworkError,
        AuthError::VerifyFailed,
        AuthError::Unauthenticated,
    ];

    /// Stable wire code, also used in the `auth-error` deep link.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidAddress => "INVALID_ADDRESS",
            AuthError::NoWallet => "NO_WALLET",
            AuthError::UserRejectedConnect => "USER_REJECTED_CONNECT",
            AuthError::UserRejectedSign => "USER_REJECTED_SIGN",
            AuthError::NonceExpired => "NONCE_EXPIRED",
            AuthError::NonceReplay => "NONCE_REPLAY",
            AuthError::SignatureInvalid => "SIGNATURE_INVALID",
            AuthError::InvalidState => "INVALID_STATE",
            AuthError::StateExpired => "STATE_EXPIRED",
            AuthError::CodeExpired => "CODE_EXPIRED",
            AuthError::CodeConsumed => "CODE_CONSUMED",
            AuthError::CodeNotFound => "CODE_NOT_FOUND",
            AuthError::NetworkError => "NETWORK_ERROR",
            AuthError::VerifyFailed => "VERIFY_FAILED",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Inverse of [`AuthError::code`]. Unknown codes are `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    /// Message shown to the user next to the code.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidAddress => "Wallet address is not a valid Ethereum address.",
            AuthError::NoWallet => "No wallet found. Please install MetaMask.",
            AuthError::UserRejectedConnect => {
                "Connection rejected. Please approve the wallet connection."
            }
            AuthError::UserRejectedSign => {
                "Signature rejected. Please sign the message to authenticate."
            }
            AuthError::NonceExpired => "Sign-in request expired. Please try again.",
            AuthError::NonceReplay => "Sign-in request was already used. Please try again.",
            AuthError::SignatureInvalid => "Signature could not be verified.",
            AuthError::InvalidState => {
                "Invalid authentication state. Please restart from desktop app."
            }
            AuthError::StateExpired => {
                "Authentication session expired. Please restart from desktop app."
            }
            AuthError::CodeExpired => "Desktop code expired. Please restart from desktop app.",
            AuthError::CodeConsumed => "Desktop code was already used.",
            AuthError::CodeNotFound => "Desktop code not recognised.",
            AuthError::NetworkError => {
                "Network error. Please check your connection and try again."
            }
            AuthError::VerifyFailed => "Verification failed. Please try again.",
            AuthError::Unauthenticated => "Connect wallet required.",
        }
    }

    /// Failures raised by the wallet rather than by the server.
    pub fn is_wallet_error(&self) -> bool {
        matches!(
            self,
            AuthError::NoWallet | AuthError::UserRejectedConnect | AuthError::UserRejectedSign
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Auth store failure: {}", err);
        AuthError::VerifyFailed
    }
}

/// Error payload of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        ErrorBody::new(err.code(), err.user_message())
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidAddress | AuthError::InvalidState => StatusCode::BAD_REQUEST,
            AuthError::NonceExpired
            | AuthError::NonceReplay
            | AuthError::SignatureInvalid
            | AuthError::StateExpired
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::CodeNotFound => StatusCode::NOT_FOUND,
            AuthError::CodeConsumed => StatusCode::CONFLICT,
            AuthError::CodeExpired => StatusCode::GONE,
            AuthError::NoWallet | AuthError::UserRejectedConnect | AuthError::UserRejectedSign => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AuthError::NetworkError | AuthError::VerifyFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody::from(self))
    }
}
