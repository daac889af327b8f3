// common/src/store/mod.rs
//! Storage for nonces, exchange codes, sessions and tier assignments.
//!
//! Consumption of nonces and codes must be linearizable per key: the
//! implementation performs the expiry/consumed checks and the flip of the
//! `consumed` flag as one atomic step, so of two concurrent callers exactly
//! one sees [`Consume::Consumed`]. No lock may span unrelated keys.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AuthSession, ExchangeCode, Nonce, NonceKey, Tier};
use crate::protocol::address::Address;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of an atomic consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consume<T> {
    /// The record was live and is now marked consumed.
    Consumed(T),
    AlreadyConsumed,
    Expired,
    /// No record, or the record under the key belongs to a different value.
    NotFound,
}

/// Counts of records reclaimed by [`AuthStore::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub nonces: usize,
    pub codes: usize,
    pub sessions: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.nonces + self.codes + self.sessions
    }
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Store `nonce` under its key, replacing any previous record.
    /// Returns the replaced record.
    async fn put_nonce(&self, nonce: Nonce) -> Result<Option<Nonce>, StoreError>;

    async fn get_nonce(&self, key: &NonceKey) -> Result<Option<Nonce>, StoreError>;

    /// Mark the nonce under `key` consumed if it still holds `value`, is not
    /// expired at `now` and has not been consumed.
    async fn consume_nonce(
        &self,
        key: &NonceKey,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<Consume<Nonce>, StoreError>;

    async fn put_code(&self, code: ExchangeCode) -> Result<(), StoreError>;

    async fn consume_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Consume<ExchangeCode>, StoreError>;

    async fn put_session(&self, session: AuthSession) -> Result<(), StoreError>;

    async fn get_session(&self, id: &Uuid) -> Result<Option<AuthSession>, StoreError>;

    /// Returns whether a session was removed.
    async fn remove_session(&self, id: &Uuid) -> Result<bool, StoreError>;

    async fn tier_of(&self, address: &Address) -> Result<Option<Tier>, StoreError>;

    async fn set_tier(&self, address: &Address, tier: Tier) -> Result<(), StoreError>;

    /// Drop every record whose expiry is before `now`.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError>;
}
