// common/src/token.rs
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Length of a sign-in nonce. 32 alphanumeric chars carry ~190 bits.
pub const NONCE_LEN: usize = 32;
/// Length of a desktop exchange code.
pub const EXCHANGE_CODE_LEN: usize = 43;

/// `length` characters drawn from `[A-Za-z0-9]` with the thread-local CSPRNG.
/// Both sign-in nonces and desktop exchange codes are built from it, so the
/// output must stay free of separators and URL-reserved characters.
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// SIWE nonces must be alphanumeric, which rules out separators.
pub fn generate_nonce() -> String {
    generate_secure_token(NONCE_LEN)
}

pub fn generate_exchange_code() -> String {
    generate_secure_token(EXCHANGE_CODE_LEN)
}

/// First few characters of a secret, for log lines.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}…", prefix)
}
