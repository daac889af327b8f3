// common/src/utils.rs
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use crate::models::session::{AuthSession, Tier};

/// Setup tracing for consistent logging across services
pub fn setup_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already installed");
    }
}

// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String, // wallet address, lowercase
    pub sid: String, // session id
    pub tier: Tier,
    pub exp: usize, // expiration time
    pub iat: usize, // issued at time
}

// Sign a bearer token for a stored session. Expiry mirrors the session's.
pub fn generate_jwt_token(
    session: &AuthSession,
    secret: &[u8],
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = JwtClaims {
        sub: session.address.to_string(),
        sid: session.id.to_string(),
        tier: session.tier,
        iat: unix_seconds(&session.created_at),
        exp: unix_seconds(&session.expires_at),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

// Validate JWT token and extract the session id it refers to
pub fn validate_jwt_token(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<(Uuid, JwtClaims), jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked against the injected clock below.
    validation.validate_exp = false;

    let token_data = decode::<JwtClaims>(token, &DecodingKey::from_secret(secret), &validation)?;

    if token_data.claims.exp < unix_seconds(&now) {
        return Err(jsonwebtoken::errors::ErrorKind::ExpiredSignature.into());
    }

    let sid = Uuid::parse_str(&token_data.claims.sid)
        .map_err(|_| jsonwebtoken::errors::ErrorKind::InvalidSubject)?;

    Ok((sid, token_data.claims))
}

fn unix_seconds(ts: &DateTime<Utc>) -> usize {
    ts.timestamp().max(0) as usize
}
