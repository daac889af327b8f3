// common/src/models/code.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::address::Address;
use crate::protocol::context::{MachineId, SessionState};

/// Single-use handoff code carried by the `sneradar://auth` deep link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeCode {
    pub code: String,
    pub address: Address,
    pub state: SessionState,
    /// Absent when the code was re-issued from an existing web session.
    pub machine_id: Option<MachineId>,
    pub session_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl ExchangeCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
