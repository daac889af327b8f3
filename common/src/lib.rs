//! Core of the SNE Radar wallet sign-in: SIWE challenges, single-use nonces,
//! signature recovery, sessions and the desktop code exchange, plus the
//! client-side flow that drives them.
pub mod auth;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod flow;
pub mod models;
pub mod protocol;
pub mod store;
pub mod token;
pub mod utils;

pub use auth::{AuthOutcome, AuthService, IssuedSession};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{AuthConfig, ChallengeSettings, Config, RateLimitConfig};
pub use error::{AuthError, ErrorBody};
pub use models::{AuthSession, ExchangeCode, Nonce, Tier};
pub use protocol::{Address, Challenge, DeepLink, FlowContext};
pub use store::{AuthStore, MemoryStore, StoreError};
pub use utils::{generate_jwt_token, setup_tracing, validate_jwt_token, JwtClaims};
