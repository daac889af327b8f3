// web-server/tests/support/mod.rs
#![allow(dead_code)]

use actix_web::web;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use k256::ecdsa::SigningKey;
use sneradar_common::flow::WalletConnector;
use sneradar_common::protocol::signature::personal_message_hash;
use sneradar_common::{Address, AuthConfig, AuthError, ManualClock, MemoryStore, RateLimitConfig};
use sneradar_web::AppState;
use std::sync::Arc;

pub const STATE: &str = "s1s1s1s1s1s1s1s1";
pub const MACHINE: &str = "machine-01";

/// Throwaway wallet signing with a fixed secp256k1 key.
pub struct TestWallet {
    key: SigningKey,
}

impl TestWallet {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_slice(&[seed; 32]).expect("valid scalar"),
        }
    }

    pub fn address(&self) -> Address {
        let point = self.key.verifying_key().to_encoded_point(false);
        Address::from_public_key(&point.as_bytes()[1..]).expect("64-byte key")
    }

    pub fn sign(&self, message: &str) -> String {
        let digest = personal_message_hash(message.as_bytes());
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .expect("signing failed");
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }
}

#[async_trait]
impl WalletConnector for TestWallet {
    async fn request_address(&self) -> Result<String, AuthError> {
        Ok(self.address().to_checksum())
    }

    async fn personal_sign(&self, message: &str, _address: &Address) -> Result<String, AuthError> {
        Ok(self.sign(message))
    }
}

pub struct TestServer {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub rate_limit: RateLimitConfig,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig {
            max_requests: 1000,
            ..RateLimitConfig::default()
        })
    }

    pub fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let config = AuthConfig {
            cookie_secure: false,
            ..AuthConfig::default()
        };
        let state = AppState::new(&config, store.clone(), clock.clone());
        Self {
            state,
            store,
            clock,
            rate_limit,
        }
    }

    pub fn service(&self) -> web::Data<sneradar_common::AuthService> {
        self.state.service.clone()
    }
}
