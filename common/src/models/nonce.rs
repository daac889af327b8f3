// common/src/models/nonce.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::address::Address;
use crate::protocol::context::{FlowContext, MachineId, SessionState};

/// One outstanding sign-in challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce {
    pub value: String,
    pub address: Address,
    pub context: FlowContext,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl Nonce {
    pub fn key(&self) -> NonceKey {
        NonceKey::new(&self.address, &self.context)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Store key: one outstanding nonce per address for web flows, one per
/// (address, machine, state) for desktop flows. Fields are kept apart so no
/// two distinct pairings share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NonceKey {
    Web(Address),
    Desktop {
        address: Address,
        machine_id: MachineId,
        state: SessionState,
    },
}

impl NonceKey {
    pub fn new(address: &Address, context: &FlowContext) -> Self {
        match context {
            FlowContext::Web => NonceKey::Web(*address),
            FlowContext::Desktop { state, machine_id } => NonceKey::Desktop {
                address: *address,
                machine_id: machine_id.clone(),
                state: state.clone(),
            },
        }
    }
}
