// common/src/protocol/messages.rs
//! JSON bodies of the `/api/auth/*` endpoints.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::models::session::Tier;
use crate::protocol::address::Address;
use crate::protocol::context::FlowContext;

/// `POST /api/auth/nonce`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NonceRequest {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
}

impl NonceRequest {
    pub fn new(address: &Address, context: &FlowContext) -> Self {
        Self {
            address: address.to_string(),
            state: context.state().map(|s| s.to_string()),
            machine_id: context.machine_id().map(|m| m.to_string()),
            app: context.app().map(str::to_string),
        }
    }

    pub fn context(&self) -> Result<FlowContext, AuthError> {
        FlowContext::from_wire(
            self.app.as_deref(),
            self.state.as_deref(),
            self.machine_id.as_deref(),
        )
    }
}

/// The timestamps are part of the signed text, so the client must render
/// them exactly as issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// `POST /api/auth/siwe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiweRequest {
    pub message: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
}

impl SiweRequest {
    pub fn new(message: String, signature: String, context: &FlowContext) -> Self {
        Self {
            message,
            signature,
            state: context.state().map(|s| s.to_string()),
            machine_id: context.machine_id().map(|m| m.to_string()),
            app: context.app().map(str::to_string),
        }
    }

    pub fn context(&self) -> Result<FlowContext, AuthError> {
        FlowContext::from_wire(
            self.app.as_deref(),
            self.state.as_deref(),
            self.machine_id.as_deref(),
        )
    }
}

/// Result of a successful sign-in: a bearer token for the browser, or a
/// one-time code for the desktop handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiweResponse {
    Web { token: String, tier: Tier },
    Desktop { code: String, state: String },
}

/// `POST /api/auth/desktop-code`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopCodeRequest {
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopCodeResponse {
    pub code: String,
    pub state: String,
}

/// `POST /api/auth/redeem`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub token: String,
    pub tier: Tier,
    pub address: Address,
    pub expires_at: DateTime<Utc>,
}

/// `GET /api/auth/verify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfoResponse {
    pub tier: Tier,
    pub address: Address,
}
