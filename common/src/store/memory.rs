// common/src/store/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{AuthStore, Consume, StoreError, SweepReport};
use crate::models::{AuthSession, ExchangeCode, Nonce, NonceKey, Tier};
use crate::protocol::address::Address;

/// In-process store. Each map is sharded by `DashMap`, so a consume only
/// locks the shard holding its key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nonces: DashMap<NonceKey, Nonce>,
    codes: DashMap<String, ExchangeCode>,
    sessions: DashMap<Uuid, AuthSession>,
    tiers: DashMap<Address, Tier>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nonce_count(&self) -> usize {
        self.nonces.len()
    }

    pub fn code_count(&self) -> usize {
        self.codes.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn put_nonce(&self, nonce: Nonce) -> Result<Option<Nonce>, StoreError> {
        Ok(self.nonces.insert(nonce.key(), nonce))
    }

    async fn get_nonce(&self, key: &NonceKey) -> Result<Option<Nonce>, StoreError> {
        Ok(self.nonces.get(key).map(|entry| entry.value().clone()))
    }

    async fn consume_nonce(
        &self,
        key: &NonceKey,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<Consume<Nonce>, StoreError> {
        let Some(mut entry) = self.nonces.get_mut(key) else {
            return Ok(Consume::NotFound);
        };
        let nonce = entry.value_mut();
        let outcome = if nonce.value != value {
            Consume::NotFound
        } else if nonce.is_expired(now) {
            Consume::Expired
        } else if nonce.consumed {
            Consume::AlreadyConsumed
        } else {
            nonce.consumed = true;
            Consume::Consumed(nonce.clone())
        };
        Ok(outcome)
    }

    async fn put_code(&self, code: ExchangeCode) -> Result<(), StoreError> {
        self.codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn consume_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Consume<ExchangeCode>, StoreError> {
        let Some(mut entry) = self.codes.get_mut(code) else {
            return Ok(Consume::NotFound);
        };
        let record = entry.value_mut();
        let outcome = if record.consumed {
            Consume::AlreadyConsumed
        } else if record.is_expired(now) {
            Consume::Expired
        } else {
            record.consumed = true;
            Consume::Consumed(record.clone())
        };
        Ok(outcome)
    }

    async fn put_session(&self, session: AuthSession) -> Result<(), StoreError> {
        self.sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_session(&self, id: &Uuid) -> Result<Option<AuthSession>, StoreError> {
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }

    async fn remove_session(&self, id: &Uuid) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn tier_of(&self, address: &Address) -> Result<Option<Tier>, StoreError> {
        Ok(self.tiers.get(address).map(|entry| *entry.value()))
    }

    async fn set_tier(&self, address: &Address, tier: Tier) -> Result<(), StoreError> {
        self.tiers.insert(*address, tier);
        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let before = (self.nonces.len(), self.codes.len(), self.sessions.len());

        self.nonces.retain(|_, nonce| !nonce.is_expired(now));
        self.codes.retain(|_, code| !code.is_expired(now));
        self.sessions.retain(|_, session| !session.is_expired(now));

        Ok(SweepReport {
            nonces: before.0.saturating_sub(self.nonces.len()),
            codes: before.1.saturating_sub(self.codes.len()),
            sessions: before.2.saturating_sub(self.sessions.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::context::FlowContext;
    use chrono::Duration;
    use std::sync::Arc;

    fn address() -> Address {
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap()
    }

    fn nonce(value: &str, now: DateTime<Utc>) -> Nonce {
        Nonce {
            value: value.to_string(),
            address: address(),
            context: FlowContext::Web,
            issued_at: now,
            expires_at: now + Duration::minutes(10),
            consumed: false,
        }
    }

    #[tokio::test]
    async fn test_put_nonce_last_write_wins() {
        let store = MemoryStore::new();
        let now = Utc::now();
        assert!(store.put_nonce(nonce("first", now)).await.unwrap().is_none());
        let replaced = store.put_nonce(nonce("second", now)).await.unwrap();
        assert_eq!(replaced.map(|n| n.value), Some("first".to_string()));
        assert_eq!(store.nonce_count(), 1);

        let key = NonceKey::new(&address(), &FlowContext::Web);
        assert_eq!(
            store.consume_nonce(&key, "first", now).await.unwrap(),
            Consume::NotFound
        );
    }

    #[tokio::test]
    async fn test_consume_nonce_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let record = nonce("n1", now);
        let key = record.key();
        store.put_nonce(record).await.unwrap();

        assert!(matches!(
            store.consume_nonce(&key, "n1", now).await.unwrap(),
            Consume::Consumed(_)
        ));
        assert_eq!(
            store.consume_nonce(&key, "n1", now).await.unwrap(),
            Consume::AlreadyConsumed
        );
    }

    #[tokio::test]
    async fn test_consume_expired_nonce() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let record = nonce("n1", now);
        let key = record.key();
        store.put_nonce(record).await.unwrap();
        assert_eq!(
            store
                .consume_nonce(&key, "n1", now + Duration::minutes(11))
                .await
                .unwrap(),
            Consume::Expired
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let record = nonce("race", now);
        let key = record.key();
        store.put_nonce(record).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store.consume_nonce(&key, "race", now).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Consume::Consumed(_) => winners += 1,
                Consume::AlreadyConsumed => {}
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_code_consume_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let state = crate::protocol::context::SessionState::new("s1s1s1s1s1s1s1s1").unwrap();
        store
            .put_code(ExchangeCode {
                code: "race-code".to_string(),
                address: address(),
                state,
                machine_id: None,
                session_id: Uuid::new_v4(),
                issued_at: now,
                expires_at: now + Duration::seconds(60),
                consumed: false,
            })
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.consume_code("race-code", now).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Consume::Consumed(_) => winners += 1,
                Consume::AlreadyConsumed => {}
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_sweep_drops_expired() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.put_nonce(nonce("n1", now)).await.unwrap();
        store
            .put_session(AuthSession::new(address(), Tier::Free, now, Duration::hours(1)))
            .await
            .unwrap();

        let report = store.sweep(now).await.unwrap();
        assert_eq!(report.total(), 0);

        let report = store.sweep(now + Duration::hours(2)).await.unwrap();
        assert_eq!(report.nonces, 1);
        assert_eq!(report.sessions, 1);
        assert_eq!(store.nonce_count(), 0);
    }

    #[tokio::test]
    async fn test_tiers() {
        let store = MemoryStore::new();
        assert_eq!(store.tier_of(&address()).await.unwrap(), None);
        store.set_tier(&address(), Tier::Pro).await.unwrap();
        assert_eq!(store.tier_of(&address()).await.unwrap(), Some(Tier::Pro));
    }
}
